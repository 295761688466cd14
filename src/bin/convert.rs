use std::io::{self, Read};

fn main() {
    let mut html = String::new();
    io::stdin().read_to_string(&mut html).expect("read stdin");
    let env = html2wikitext::Env::new();
    let mut doc = html2wikitext::from_html(&env, &html).expect("parse html");
    let wikitext = html2wikitext::serialize(&env, &mut doc).expect("serialize");
    print!("{wikitext}");
}
