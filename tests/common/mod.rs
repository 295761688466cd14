// Shared test helpers for html2wikitext.

use html2wikitext::{from_html, serialize, Env};

/// Parse and serialize with a default environment.
pub fn roundtrip(html: &str) -> String {
    let env = Env::new();
    let mut doc = from_html(&env, html).expect("parse");
    serialize(&env, &mut doc).expect("serialize")
}
