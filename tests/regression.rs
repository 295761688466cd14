// Regression tests — every bug found becomes a test case here.
// Never delete a test from this file.

mod common;

use common::roundtrip;
use pretty_assertions::assert_eq;

/// Template braces in plain text must never survive unescaped; re-parsing
/// would expand them.
#[test]
fn brace_pairs_are_escaped() {
    assert_eq!(roundtrip("<p>{{x}}</p>"), "<nowiki>{{x}}</nowiki>");
}

/// A list bullet at the start of a line re-tokenizes as a list.
#[test]
fn list_char_at_line_start_is_escaped() {
    assert_eq!(
        roundtrip("<p>* not a list</p>"),
        "<nowiki>* not a list</nowiki>"
    );
}

/// Text starting with a bullet right after a real bullet would deepen the
/// list on re-parse.
#[test]
fn bullet_text_inside_list_item_is_escaped() {
    assert_eq!(
        roundtrip("<ul><li>*x</li></ul>"),
        "*<nowiki>*x</nowiki>"
    );
}

/// Four dashes at the start of a line re-tokenize as a horizontal rule.
#[test]
fn dashes_at_line_start_are_escaped() {
    assert_eq!(roundtrip("<p>----</p>"), "<nowiki>----</nowiki>");
}

/// Signature tildes are expanded by the pre-save transform anywhere.
#[test]
fn signature_tildes_are_escaped() {
    assert_eq!(roundtrip("<p>sig ~~~~</p>"), "<nowiki>sig ~~~~</nowiki>");
}

/// `=x=` on its own line re-parses as a heading.
#[test]
fn heading_shaped_text_is_escaped() {
    assert_eq!(roundtrip("<p>=x=</p>"), "<nowiki>=x=</nowiki>");
}

/// Literal text that looks like a whitelisted HTML tag must be escaped; an
/// unknown tag renders literally and must not be.
#[test]
fn html_tags_escape_only_when_wikitext_significant() {
    assert_eq!(
        roundtrip("<p>x &lt;b&gt;y&lt;/b&gt;</p>"),
        "<nowiki>x <b>y</b></nowiki>"
    );
    assert_eq!(roundtrip("<p>x &lt;blink&gt;y</p>"), "x <blink>y");
}

/// Wikilink brackets in plain text re-tokenize as a link.
#[test]
fn wikilink_brackets_are_escaped() {
    assert_eq!(
        roundtrip("<p>[[not a link]]</p>"),
        "<nowiki>[[not a link]]</nowiki>"
    );
}

/// Magic links (RFC/ISBN/PMID) auto-link on re-parse.
#[test]
fn magic_links_are_escaped() {
    assert_eq!(
        roundtrip("<p>see RFC 2616</p>"),
        "<nowiki>see RFC 2616</nowiki>"
    );
    assert_eq!(
        roundtrip("<p>ISBN 0-306-40615-2</p>"),
        "<nowiki>ISBN 0-306-40615-2</nowiki>"
    );
}

/// Bare URLs are left alone: the auto-link round-trips the visible text.
#[test]
fn bare_urls_are_not_escaped() {
    assert_eq!(
        roundtrip("<p>at http://example.com now</p>"),
        "at http://example.com now"
    );
}

/// A leading space would open an indent-pre block.
#[test]
fn leading_space_is_escaped() {
    assert_eq!(roundtrip("<p> x</p>"), "<nowiki> x</nowiki>");
}

/// A pipe inside a table cell splits the cell.
#[test]
fn pipe_inside_table_cell_is_escaped() {
    assert_eq!(
        roundtrip("<table><tbody><tr><td>a|b</td></tr></tbody></table>"),
        "{|\n|<nowiki>a|b</nowiki>\n|}"
    );
}

/// Link content containing closing brackets would end the link early.
#[test]
fn brackets_in_link_content_are_escaped() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink" href="./Foo">a]]b</a>"#),
        "[[Foo|<nowiki>a]]b</nowiki>]]"
    );
}

/// Literal nowiki tags in content are entity-escaped before anything else.
#[test]
fn literal_nowiki_tags_are_neutralized() {
    let out = roundtrip("<p>a &lt;nowiki&gt;b&lt;/nowiki&gt; *c</p>");
    assert!(out.contains("&lt;nowiki&gt;"), "got: {out}");
    assert!(out.contains("&lt;/nowiki&gt;"), "got: {out}");
}

/// Comment terminators inside emitted comment bodies must be defused.
#[test]
fn comment_close_in_body_is_escaped() {
    assert_eq!(
        roundtrip("<p>a<!--x--&gt;y-->b</p>"),
        "a<!--x--&gt;y-->b"
    );
}

/// Quote characters at the edges of bold/italic content merge with the
/// markers on re-parse.
#[test]
fn quote_edges_are_escaped() {
    assert_eq!(
        roundtrip("<p><i>'quoted'</i></p>"),
        "''<nowiki>'quoted'</nowiki>''"
    );
}

/// Equals at the end of a heading-opened line must not close the heading.
#[test]
fn trailing_equals_inside_heading_is_escaped() {
    assert_eq!(
        roundtrip("<h2>a=</h2>"),
        "==<nowiki>a=</nowiki>=="
    );
}
