// End-to-end serialization tests for html2wikitext.

mod common;

use common::roundtrip;
use pretty_assertions::assert_eq;

#[test]
fn empty_input() {
    assert_eq!(roundtrip(""), "");
}

#[test]
fn plain_paragraph() {
    assert_eq!(roundtrip("<p>hello</p>"), "hello");
}

#[test]
fn two_paragraphs_get_a_blank_line() {
    assert_eq!(roundtrip("<p>foo</p><p>bar</p>"), "foo\n\nbar");
}

#[test]
fn text_before_paragraph_gets_a_blank_line() {
    assert_eq!(roundtrip("x<p>y</p>"), "x\n\ny");
}

#[test]
fn headings() {
    assert_eq!(roundtrip("<h2>Title</h2>"), "==Title==");
    assert_eq!(roundtrip("<h1>a</h1><h3>b</h3>"), "=a=\n===b===");
}

#[test]
fn empty_heading_keeps_a_nowiki_placeholder() {
    assert_eq!(roundtrip("<h1></h1>"), "=<nowiki/>=");
}

#[test]
fn heading_content_that_looks_like_a_heading_is_escaped() {
    assert_eq!(roundtrip("<h2>=x=</h2>"), "==<nowiki>=x=</nowiki>==");
}

#[test]
fn nested_lists() {
    assert_eq!(
        roundtrip("<ul><li>a</li><li>b<ul><li>c</li></ul></li></ul>"),
        "*a\n*b\n**c"
    );
}

#[test]
fn ordered_list() {
    assert_eq!(roundtrip("<ol><li>one</li><li>two</li></ol>"), "#one\n#two");
}

#[test]
fn definition_list() {
    assert_eq!(roundtrip("<dl><dt>t</dt><dd>d</dd></dl>"), ";t\n:d");
}

#[test]
fn single_line_definition_uses_row_syntax() {
    assert_eq!(
        roundtrip(r#"<dl><dt>t</dt><dd data-parsoid='{"stx":"row"}'>d</dd></dl>"#),
        ";t:d"
    );
}

#[test]
fn adjacent_lists_of_same_kind_stay_separate() {
    assert_eq!(
        roundtrip("<ul><li>a</li></ul><ul><li>b</li></ul>"),
        "*a\n\n*b"
    );
}

#[test]
fn paragraph_inside_list_item_stays_inline() {
    assert_eq!(roundtrip("<ul><li><p>x</p></li></ul>"), "*x");
}

#[test]
fn simple_wikilink() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink" href="./Foo">Foo</a>"#),
        "[[Foo]]"
    );
}

#[test]
fn wikilink_tail_is_absorbed() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink" href="./Foo" data-parsoid='{"tail":"s"}'>Foos</a>"#),
        "[[Foo]]s"
    );
}

#[test]
fn piped_wikilink() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink" href="./Foo">bar</a>"#),
        "[[Foo|bar]]"
    );
}

#[test]
fn empty_wikilink_content_blocks_the_pipe_trick() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink" href="./T"></a>"#),
        "[[T|<nowiki/>]]"
    );
}

#[test]
fn category_link() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink/Category" href="./Category:Foo"></a>"#),
        "[[Category:Foo]]"
    );
}

#[test]
fn category_link_with_sort_key() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:WikiLink/Category" href="./Category:Foo#Bar"></a>"#),
        "[[Category:Foo|Bar]]"
    );
}

#[test]
fn external_link_with_text() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:ExtLink" href="http://example.com">text</a>"#),
        "[http://example.com text]"
    );
}

#[test]
fn bare_url_link() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:ExtLink/URL" href="http://x.example">http://x.example</a>"#),
        "http://x.example"
    );
}

#[test]
fn numbered_external_link() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:ExtLink/Numbered" href="http://x.example">[1]</a>"#),
        "[http://x.example]"
    );
}

#[test]
fn magic_link_emits_its_text() {
    assert_eq!(
        roundtrip(r#"<a rel="mw:ExtLink/RFC" href="//tools.ietf.org/html/rfc2616">RFC 2616</a>"#),
        "RFC 2616"
    );
}

#[test]
fn template_reconstruction() {
    let html = r##"<p><span typeof="mw:Transclusion" about="#mwt1"
        data-mw='{"parts":[{"template":{"target":{"wt":"tpl"},"params":{"a":{"wt":"1"}}}}]}'>1</span></p>"##;
    assert_eq!(roundtrip(html), "{{tpl|a=1}}");
}

#[test]
fn template_positional_parameters() {
    let html = r#"<span typeof="mw:Transclusion"
        data-mw='{"parts":[{"template":{"target":{"wt":"t"},"params":{"1":{"wt":"x"},"2":{"wt":"y"}}}}]}'>xy</span>"#;
    assert_eq!(roundtrip(html), "{{t|x|y}}");
}

#[test]
fn template_siblings_are_suppressed() {
    let html = r##"<span typeof="mw:Transclusion" about="#mwt1"
        data-mw='{"parts":[{"template":{"target":{"wt":"t"},"params":{}}}]}'>a</span><span about="#mwt1">b</span>"##;
    assert_eq!(roundtrip(html), "{{t}}");
}

#[test]
fn extension_reconstruction_from_data_mw() {
    let html = r##"<div typeof="mw:Extension/ref" about="#mwt2"
        data-mw='{"name":"ref","body":{"extsrc":"content"}}'>x</div>"##;
    assert_eq!(roundtrip(html), "<ref>content</ref>");
}

#[test]
fn basic_table() {
    assert_eq!(
        roundtrip("<table><tbody><tr><td>a</td><td>b</td></tr></tbody></table>"),
        "{|\n|a\n|b\n|}"
    );
}

#[test]
fn table_with_attributes() {
    assert_eq!(
        roundtrip(r#"<table class="wikitable"><tbody><tr><td>a</td></tr></tbody></table>"#),
        "{| class=\"wikitable\"\n|a\n|}"
    );
}

#[test]
fn table_row_syntax_cells_share_a_line() {
    assert_eq!(
        roundtrip(
            r#"<table><tbody><tr><td>a</td><td data-parsoid='{"stx_v":"row"}'>b</td></tr></tbody></table>"#
        ),
        "{|\n|a||b\n|}"
    );
}

#[test]
fn second_table_row_gets_a_divider() {
    assert_eq!(
        roundtrip(
            "<table><tbody><tr><td>a</td></tr><tr><td>b</td></tr></tbody></table>"
        ),
        "{|\n|a\n|-\n|b\n|}"
    );
}

#[test]
fn table_header_and_caption() {
    assert_eq!(
        roundtrip(
            "<table><caption>cap</caption><tbody><tr><th>h</th></tr></tbody></table>"
        ),
        "{|\n|+cap\n!h\n|}"
    );
}

#[test]
fn br_inside_paragraph_becomes_a_paragraph_break() {
    assert_eq!(roundtrip("<p>a<br>b</p>"), "a\n\nb");
}

#[test]
fn br_in_html_syntax_stays_literal() {
    assert_eq!(
        roundtrip(r#"<p>a<br data-parsoid='{"stx":"html"}'>b</p>"#),
        "a<br>b"
    );
}

#[test]
fn horizontal_rule_with_extra_dashes() {
    assert_eq!(roundtrip("<hr>"), "----");
    assert_eq!(
        roundtrip(r#"<hr data-parsoid='{"extra_dashes":2}'>"#),
        "------"
    );
}

#[test]
fn quotes() {
    assert_eq!(roundtrip("<p><i>a</i></p>"), "''a''");
    assert_eq!(roundtrip("<p><b>a</b></p>"), "'''a'''");
}

#[test]
fn adjacent_quotes_are_disambiguated() {
    assert_eq!(
        roundtrip("<p><b>x</b><i>y</i></p>"),
        "'''x'''<nowiki/>''y''"
    );
}

#[test]
fn indent_pre() {
    assert_eq!(roundtrip("<pre>code here</pre>"), " code here");
    assert_eq!(roundtrip("<pre>a\nb</pre>"), " a\n b");
}

#[test]
fn html_pre_keeps_its_tags() {
    assert_eq!(
        roundtrip(r#"<pre data-parsoid='{"stx":"html"}'>x *y*</pre>"#),
        "<pre>x *y*</pre>"
    );
}

#[test]
fn generic_html_element() {
    assert_eq!(
        roundtrip(r#"<div data-parsoid='{"stx":"html"}' class="x">y</div>"#),
        "<div class=\"x\">y</div>"
    );
}

#[test]
fn nowiki_span() {
    assert_eq!(
        roundtrip(r#"<span typeof="mw:Nowiki">*x*</span>"#),
        "<nowiki>*x*</nowiki>"
    );
}

#[test]
fn entity_span_prefers_recorded_source() {
    assert_eq!(
        roundtrip(
            r#"<p><span typeof="mw:Entity" data-parsoid='{"src":"&amp;amp;","srcContent":"&amp;"}'>&amp;</span></p>"#
        ),
        "&amp;"
    );
}

#[test]
fn page_property_meta() {
    assert_eq!(roundtrip(r#"<meta property="mw:PageProp/notoc">"#), "__NOTOC__");
    assert_eq!(
        roundtrip(r#"<meta property="mw:PageProp/categorydefaultsort" content="Doe, John">"#),
        "{{DEFAULTSORT:Doe, John}}"
    );
}

#[test]
fn inclusion_control_metas() {
    assert_eq!(
        roundtrip(r#"<meta typeof="mw:Includes/IncludeOnly">"#),
        "<includeonly>"
    );
    assert_eq!(
        roundtrip(r#"<meta typeof="mw:Includes/IncludeOnly/End">"#),
        "</includeonly>"
    );
}

#[test]
fn figure_with_options_and_caption() {
    let html = r#"<figure typeof="mw:Image/Thumb"
        data-parsoid='{"optionList":[{"ck":"thumbnail","ak":"thumb"},{"ck":"width","ak":"220px"},{"ck":"caption","ak":""}]}'><a href="./File:X.jpg"><img resource="./File:X.jpg" width="220"></a><figcaption>A cap</figcaption></figure>"#;
    assert_eq!(roundtrip(html), "[[File:X.jpg|thumb|220px|A cap]]");
}

#[test]
fn heading_with_a_link() {
    assert_eq!(
        roundtrip(r#"<h2><a rel="mw:WikiLink" href="./Foo">Foo</a></h2>"#),
        "==[[Foo]]=="
    );
}

#[test]
fn inline_comment_is_preserved() {
    assert_eq!(roundtrip("<p>a<!--x-->b</p>"), "a<!--x-->b");
}
