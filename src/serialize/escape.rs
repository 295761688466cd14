// Escape oracle.
//
// Decides whether a text fragment, in its surrounding emitted context, must
// be wrapped in `<nowiki>…</nowiki>` to come back as plain text when the
// output is re-parsed. A single triggering substring wraps the whole
// fragment. The decision runs a sequence of short-circuits from cheap
// regex checks down to a full tokenization of the fragment.

use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use super::State;
use crate::config;
use crate::dom;
use crate::tokenizer::{self, Token};

/// Construct-specific escape predicate, pushed by the handler that owns the
/// construct and consulted before the generic checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EscapeContext {
    Heading,
    ListItem,
    TableCell,
    TableHeader,
    Link,
    Quote,
}

impl EscapeContext {
    fn requires_escape(self, state: &State, text: &str) -> bool {
        match self {
            // A `=` at either edge could close or extend the heading.
            EscapeContext::Heading => text.starts_with('=') || text.ends_with('='),
            // Right after the bullets, list-item chars would deepen the list.
            EscapeContext::ListItem => {
                text.starts_with(['#', '*', ':', ';'])
                    && state
                        .curr_line
                        .text
                        .chars()
                        .all(|c| matches!(c, '#' | '*' | ':' | ';' | ' '))
            }
            // A pipe splits the cell; a leading `-`/`+` merges into row syntax.
            EscapeContext::TableCell => {
                text.contains('|') || text.starts_with('-') || text.starts_with('+')
            }
            EscapeContext::TableHeader => text.contains('|') || text.contains("!!"),
            EscapeContext::Link => {
                text.starts_with('|') || text.contains("[[") || text.contains("]]")
            }
            EscapeContext::Quote => text.starts_with('\'') || text.ends_with('\''),
        }
    }
}

static FAST_TRIGGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[<>\[\]+|'!=#*:;~{}-]|RFC|ISBN|PMID|^[ \t]+[^\s]").unwrap());
static BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\{|\{\{|\}\}\}|\}\}").unwrap());
static NL_THEN_CHAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\n.").unwrap());
static TILDES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~{3,5}").unwrap());
static MAGIC_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"RFC|ISBN|PMID").unwrap());
static TRAILING_EQ: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)=$").unwrap());
static SOL_LEAD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ #*:;=]").unwrap());
static SOL_UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[<\[\]>|'!]").unwrap());
// Only a space opens an indent-pre; a leading tab does not.
static INDENT_PRE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^ +[^\s]").unwrap());
static HEADING_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^=+[^=]+=+$").unwrap());
static OPEN_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*$").unwrap());
static CLOSES_BRACKET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\[]*\]").unwrap());

/// Wrap a fragment in nowiki, keeping any trailing newline run outside the
/// wrapper so separator handling still sees it.
pub(crate) fn wrap_in_nowiki(text: &str) -> String {
    let head = text.trim_end_matches('\n');
    let suffix = &text[head.len()..];
    format!("<nowiki>{head}</nowiki>{suffix}")
}

/// Escape a detached content string under an explicit construct context,
/// off the start of a line. Used for link content and captions that were
/// flattened to a string instead of walked as nodes.
pub(crate) fn escape_wikitext_in_context(
    state: &mut State,
    text: &str,
    ctx: EscapeContext,
    node: &Handle,
) -> String {
    state.wte_handlers.push(ctx);
    let saved_sol = state.on_sol;
    state.on_sol = false;
    let out = escape_wikitext(state, text, node);
    state.on_sol = saved_sol;
    state.wte_handlers.pop();
    out
}

/// Decide whether `text` must be nowiki-wrapped, and return the emitted
/// form either way.
pub(crate) fn escape_wikitext(state: &mut State, text: &str, node: &Handle) -> String {
    // Nothing in the fragment can re-tokenize as markup.
    if !FAST_TRIGGER.is_match(text) {
        return text.to_string();
    }

    if let Some(&ctx) = state.wte_handlers.last() {
        if ctx.requires_escape(state, text) {
            return wrap_in_nowiki(text);
        }
    }

    if BRACES.is_match(text) {
        return wrap_in_nowiki(text);
    }

    let sol = state.on_sol && !state.in_indent_pre && !state.in_php_block;
    let has_magic = MAGIC_WORD.is_match(text);
    let has_newlines = NL_THEN_CHAR.is_match(text);
    let has_tildes = TILDES.is_match(text);

    if !has_magic && !has_newlines && !has_tildes {
        if !sol
            && !text.contains("''")
            && !text.contains('<')
            && !text.contains('>')
            && !text.contains('[')
            && !text.contains(']')
            && !TRAILING_EQ.is_match(text)
        {
            return text.to_string();
        }
        if sol
            && !SOL_LEAD.is_match(text)
            && !SOL_UNSAFE_CHARS.is_match(text)
            && !text.contains("----")
        {
            return text.to_string();
        }
    }

    if sol && INDENT_PRE_LINE.is_match(text) {
        return wrap_in_nowiki(text);
    }

    // Literal nowiki tags in content can never be emitted raw.
    let text = text
        .replace("<nowiki>", "&lt;nowiki&gt;")
        .replace("</nowiki>", "&lt;/nowiki&gt;");

    let mut probe = String::with_capacity(text.len() + 1);
    if !sol {
        // Suppress line-start constructs for the first line.
        probe.push('_');
    }
    probe.push_str(&text);
    if state.in_indent_pre || state.in_php_block {
        probe = probe.replace('\n', "\n_");
    }
    let tokens = tokenizer::tokenize(&probe, &state.env.conf);
    if tokens.iter().any(is_significant) {
        return wrap_in_nowiki(&text);
    }
    if has_tildes {
        return wrap_in_nowiki(&text);
    }

    if sol && HEADING_SHAPE.is_match(&text) {
        return wrap_in_nowiki(&text);
    }

    if closes_open_line_construct(state, &text, node) {
        return wrap_in_nowiki(&text);
    }

    text
}

/// Check the fragment against unbalanced constructs opened earlier on the
/// current output line: an open heading `=` or an open `[`.
fn closes_open_line_construct(state: &mut State, text: &str, node: &Handle) -> bool {
    if !state.curr_line.processed {
        state.curr_line.processed = true;
        let first_is_heading_ish = state
            .curr_line
            .first_node
            .as_ref()
            .is_some_and(|n| dom::is_text(n) || dom::is_heading(n));
        state.curr_line.has_open_heading_char =
            state.curr_line.text.starts_with('=') && first_is_heading_ish;
        state.curr_line.has_open_brackets = OPEN_BRACKET.is_match(&state.curr_line.text);
    }

    if state.curr_line.has_open_heading_char
        && dom::next_sibling(node).is_none()
        && text.ends_with('=')
    {
        return true;
    }

    if state.curr_line.has_open_brackets && CLOSES_BRACKET.is_match(text) {
        let combined = format!("{}{}", state.curr_line.text, text);
        if has_link_tokens(&combined, state) {
            return true;
        }
    }

    false
}

fn has_link_tokens(text: &str, state: &State) -> bool {
    tokenizer::tokenize(text, &state.env.conf)
        .iter()
        .any(|t| matches!(t.name(), Some("wikilink" | "extlink")))
}

/// Tokens that survive the ignore list force a wrap. Ignored: raw HTML tags
/// outside the wikitext whitelist, entity spans, heading tags, bare end
/// tags of void elements, and bare-URL / invalid external-link
/// self-closers.
fn is_significant(token: &Token) -> bool {
    match token {
        Token::Comment(_) => true,
        Token::SelfClosingTag(name) => match name.as_str() {
            "urllink" | "extlink" => false,
            "hr" | "magiclink" => true,
            other => config::is_wikitext_html_tag(other),
        },
        Token::Tag(name) => is_significant_tag(name),
        Token::EndTag(name) => !config::is_void_element(name) && is_significant_tag(name),
    }
}

fn is_significant_tag(name: &str) -> bool {
    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "entity-span" => false,
        "listItem" | "wikilink" | "extlink" | "magiclink" => true,
        other => config::is_wikitext_html_tag(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_trailing_newlines_outside() {
        assert_eq!(wrap_in_nowiki("*x"), "<nowiki>*x</nowiki>");
        assert_eq!(wrap_in_nowiki("*x\n\n"), "<nowiki>*x</nowiki>\n\n");
    }

    #[test]
    fn significance_filter() {
        assert!(is_significant(&Token::Tag("b".into())));
        assert!(is_significant(&Token::Tag("wikilink".into())));
        assert!(is_significant(&Token::Comment("x".into())));
        assert!(!is_significant(&Token::Tag("h2".into())));
        assert!(!is_significant(&Token::Tag("blink".into())));
        assert!(!is_significant(&Token::EndTag("br".into())));
        assert!(!is_significant(&Token::SelfClosingTag("urllink".into())));
        assert!(is_significant(&Token::SelfClosingTag("magiclink".into())));
    }
}
