// Synchronous wikitext token scanner.
//
// The escape oracle needs to know whether a text fragment would re-tokenize
// as markup. This scanner recognizes exactly the constructs that matter for
// that decision and emits one token per construct; everything else is plain
// text and produces nothing. It accumulates all tokens before returning —
// the oracle's decision needs the full list.
//
// Wiki constructs reuse HTML-ish token names where one exists (`table`,
// `tr`, `td`, `i`, `b`); purely wiki-side constructs get reserved names
// (`listItem`, `wikilink`, `extlink`, `urllink`, `magiclink`).

use std::sync::LazyLock;

use regex::Regex;

use crate::config::SiteConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Tag(String),
    EndTag(String),
    SelfClosingTag(String),
    Comment(String),
}

impl Token {
    pub(crate) fn name(&self) -> Option<&str> {
        match self {
            Token::Tag(n) | Token::EndTag(n) | Token::SelfClosingTag(n) => Some(n),
            Token::Comment(_) => None,
        }
    }
}

static HEADING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(={1,6}).+?={1,6}[ \t]*$").unwrap());
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<(/?)([a-zA-Z][-a-zA-Z0-9]*)([^<>]*?)(/?)>").unwrap());
static RFC_PMID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:RFC|PMID)\s+[0-9]+").unwrap());
static ISBN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ISBN\s+(?:9[78][\- ]?)?(?:[0-9][\- ]?){9}[0-9Xx]").unwrap());
static URL_TAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s\[\]<>]+").unwrap());

/// Tokenize a text fragment. The caller prefixes `_` when the fragment does
/// not sit at the start of a wiki line, which suppresses line-start
/// constructs without further bookkeeping here.
pub(crate) fn tokenize(text: &str, config: &SiteConfig) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut at_line_start = true;
    let mut in_table = false;
    let mut wikilink_depth = 0usize;

    while i < bytes.len() {
        if at_line_start {
            at_line_start = false;
            let line_end = text[i..].find('\n').map_or(text.len(), |p| i + p);
            let line = &text[i..line_end];
            if HEADING_LINE.is_match(line) {
                let level = line.bytes().take_while(|&b| b == b'=').count().min(6);
                tokens.push(Token::Tag(format!("h{level}")));
                tokens.push(Token::EndTag(format!("h{level}")));
                i = line_end;
                continue;
            }
            match bytes[i] {
                b'*' | b'#' | b':' | b';' => {
                    tokens.push(Token::Tag("listItem".to_string()));
                    while i < bytes.len() && matches!(bytes[i], b'*' | b'#' | b':' | b';') {
                        i += 1;
                    }
                    continue;
                }
                b'-' if line.starts_with("----") => {
                    tokens.push(Token::SelfClosingTag("hr".to_string()));
                    while i < bytes.len() && bytes[i] == b'-' {
                        i += 1;
                    }
                    continue;
                }
                b'{' if line.starts_with("{|") => {
                    tokens.push(Token::Tag("table".to_string()));
                    in_table = true;
                    i += 2;
                    continue;
                }
                b'|' if in_table => {
                    if line.starts_with("|}") {
                        tokens.push(Token::EndTag("table".to_string()));
                        in_table = false;
                    } else if line.starts_with("|-") {
                        tokens.push(Token::Tag("tr".to_string()));
                    } else if line.starts_with("|+") {
                        tokens.push(Token::Tag("caption".to_string()));
                    } else {
                        tokens.push(Token::Tag("td".to_string()));
                    }
                    i += 2.min(bytes.len() - i);
                    continue;
                }
                b'!' if in_table => {
                    tokens.push(Token::Tag("th".to_string()));
                    i += 1;
                    continue;
                }
                _ => {}
            }
        }

        match bytes[i] {
            b'\n' => {
                at_line_start = true;
                i += 1;
            }
            b'<' => {
                let rest = &text[i..];
                if let Some(stripped) = rest.strip_prefix("<!--") {
                    match stripped.find("-->") {
                        Some(end) => {
                            tokens.push(Token::Comment(stripped[..end].to_string()));
                            i += 4 + end + 3;
                        }
                        None => {
                            // Unterminated comments swallow to end of input.
                            tokens.push(Token::Comment(stripped.to_string()));
                            i = bytes.len();
                        }
                    }
                } else if let Some(caps) = HTML_TAG.captures(rest) {
                    let close = !caps[1].is_empty();
                    let self_close = !caps[4].is_empty();
                    let mut name = caps[2].to_ascii_lowercase();
                    if name == "span" && caps[3].contains("mw:Entity") {
                        name = "entity-span".to_string();
                    }
                    tokens.push(if close {
                        Token::EndTag(name)
                    } else if self_close {
                        Token::SelfClosingTag(name)
                    } else {
                        Token::Tag(name)
                    });
                    i += caps[0].len();
                } else {
                    i += 1;
                }
            }
            b'\'' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'\'').count();
                if run >= 3 {
                    tokens.push(Token::Tag("b".to_string()));
                } else if run == 2 {
                    tokens.push(Token::Tag("i".to_string()));
                }
                i += run;
            }
            b'[' => {
                let rest = &text[i..];
                if rest.starts_with("[[") {
                    if rest[2..].contains("]]") {
                        tokens.push(Token::Tag("wikilink".to_string()));
                        wikilink_depth += 1;
                    }
                    i += 2;
                } else {
                    let inner = &rest[1..];
                    if config.starts_with_protocol(inner) && inner.contains(']') {
                        tokens.push(Token::Tag("extlink".to_string()));
                    }
                    i += 1;
                }
            }
            b']' => {
                if text[i..].starts_with("]]") && wikilink_depth > 0 {
                    tokens.push(Token::EndTag("wikilink".to_string()));
                    wikilink_depth -= 1;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            b if at_word_boundary(bytes, i) && (b == b'R' || b == b'P' || b == b'I') => {
                let rest = &text[i..];
                if let Some(m) = RFC_PMID.find(rest).or_else(|| ISBN.find(rest)) {
                    tokens.push(Token::SelfClosingTag("magiclink".to_string()));
                    i += m.end();
                } else {
                    i += 1;
                }
            }
            b if b.is_ascii_lowercase() && at_word_boundary(bytes, i) => {
                let rest = &text[i..];
                if config.starts_with_protocol(rest) && !rest.starts_with("//") {
                    let tail = URL_TAIL.find(rest).map_or(0, |m| m.end());
                    tokens.push(Token::SelfClosingTag("urllink".to_string()));
                    i += tail.max(1);
                } else {
                    i += 1;
                }
            }
            _ => {
                i += 1;
            }
        }
    }

    tokens
}

fn at_word_boundary(bytes: &[u8], i: usize) -> bool {
    i == 0 || !(bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<Token> {
        tokenize(text, &SiteConfig::default())
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert!(toks("just words, nothing else").is_empty());
        assert!(toks("_* not at line start? no: prefixed").is_empty());
    }

    #[test]
    fn line_start_constructs() {
        assert_eq!(toks("* item")[0], Token::Tag("listItem".to_string()));
        assert_eq!(toks("----")[0], Token::SelfClosingTag("hr".to_string()));
        assert_eq!(toks("{|\n|}")[0], Token::Tag("table".to_string()));
        assert_eq!(toks("=x=")[0], Token::Tag("h1".to_string()));
    }

    #[test]
    fn quote_runs() {
        assert_eq!(toks("a ''b'' c")[0], Token::Tag("i".to_string()));
        assert_eq!(toks("a '''b''' c")[0], Token::Tag("b".to_string()));
        assert!(toks("it's fine").is_empty());
    }

    #[test]
    fn links() {
        assert_eq!(toks("see [[Foo]] now")[0], Token::Tag("wikilink".to_string()));
        // An unclosed [[ is plain text.
        assert!(toks("see [[Foo now").is_empty());
        assert_eq!(
            toks("see [http://x.example y] now")[0],
            Token::Tag("extlink".to_string())
        );
        // No protocol: not an external link.
        assert!(toks("see [just brackets] now").is_empty());
        assert_eq!(
            toks("at http://x.example now")[0],
            Token::SelfClosingTag("urllink".to_string())
        );
    }

    #[test]
    fn magic_links() {
        assert_eq!(
            toks("per RFC 2616 rules")[0],
            Token::SelfClosingTag("magiclink".to_string())
        );
        assert_eq!(
            toks("ISBN 0-306-40615-2")[0],
            Token::SelfClosingTag("magiclink".to_string())
        );
        // Not at a word boundary.
        assert!(toks("xRFC 2616").is_empty());
    }

    #[test]
    fn html_tags_and_comments() {
        assert_eq!(toks("a <b>c</b>")[0], Token::Tag("b".to_string()));
        assert_eq!(toks("a <br/> b")[0], Token::SelfClosingTag("br".to_string()));
        assert_eq!(
            toks("a <!-- note --> b")[0],
            Token::Comment(" note ".to_string())
        );
        assert_eq!(
            toks(r#"<span typeof="mw:Entity">&</span>"#)[0],
            Token::Tag("entity-span".to_string())
        );
    }

    #[test]
    fn table_body_rows_only_inside_table() {
        // Outside a table, | and ! at line start are plain text.
        assert!(toks("| not a cell").is_empty());
        let inside = toks("{|\n|-\n| cell\n|}");
        assert!(inside.contains(&Token::Tag("tr".to_string())));
        assert!(inside.contains(&Token::Tag("td".to_string())));
    }
}
