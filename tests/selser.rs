// Selective serialization tests: untouched trees reproduce the original
// source byte for byte, and edits only disturb their own neighborhood.

use html2wikitext::{from_html, serialize_selser, Env};
use pretty_assertions::assert_eq;

#[test]
fn untouched_tree_is_byte_stable() {
    let src = "foo\n\nbar\n";
    let html = r#"<html><body data-parsoid='{"dsr":[0,9,0,0]}'><p data-parsoid='{"dsr":[0,3,0,0]}'>foo</p><p data-parsoid='{"dsr":[5,8,0,0]}'>bar</p></body></html>"#;
    let env = Env::new().with_page_src(src);
    let mut doc = from_html(&env, html).unwrap();
    assert_eq!(serialize_selser(&env, &mut doc).unwrap(), src);
}

#[test]
fn modified_node_reserializes_but_neighbors_reuse_source() {
    let src = "foo\n\nbar\n";
    let html = r#"<html><body data-parsoid='{"dsr":[0,9,0,0]}'><p data-parsoid='{"dsr":[0,3,0,0]}'>foo</p><p data-parsoid='{"dsr":[5,8,0,0]}'>baz</p></body></html>"#;
    let env = Env::new().with_page_src(src);
    let mut doc = from_html(&env, html).unwrap();
    let second = {
        let kids: Vec<_> = doc
            .body()
            .children
            .borrow()
            .iter()
            .cloned()
            .collect();
        kids.into_iter()
            .filter(|c| matches!(c.data, markup5ever_rcdom::NodeData::Element { .. }))
            .nth(1)
            .unwrap()
    };
    doc.mark_modified(&second);
    assert_eq!(serialize_selser(&env, &mut doc).unwrap(), "foo\n\nbaz\n");
}

#[test]
fn inserted_node_between_unmodified_neighbors() {
    let src = "foo\n\nbar";
    let html = r#"<html><body data-parsoid='{"dsr":[0,8,0,0]}'><p data-parsoid='{"dsr":[0,3,0,0]}'>foo</p><p>new</p><p data-parsoid='{"dsr":[5,8,0,0]}'>bar</p></body></html>"#;
    let env = Env::new().with_page_src(src);
    let mut doc = from_html(&env, html).unwrap();
    let inserted = {
        let kids: Vec<_> = doc
            .body()
            .children
            .borrow()
            .iter()
            .cloned()
            .collect();
        kids.into_iter()
            .filter(|c| matches!(c.data, markup5ever_rcdom::NodeData::Element { .. }))
            .nth(1)
            .unwrap()
    };
    doc.mark_inserted(&inserted);
    assert_eq!(
        serialize_selser(&env, &mut doc).unwrap(),
        "foo\n\nnew\n\nbar"
    );
}

#[test]
fn source_reuse_covers_markup_the_serializer_would_normalize() {
    // The source spells the heading with extra whitespace; byte-stable
    // reuse keeps it.
    let src = "==  spaced  ==\n";
    let html = r#"<html><body data-parsoid='{"dsr":[0,15,0,0]}'><h2 data-parsoid='{"dsr":[0,14,2,2]}'>  spaced  </h2></body></html>"#;
    let env = Env::new().with_page_src(src);
    let mut doc = from_html(&env, html).unwrap();
    assert_eq!(serialize_selser(&env, &mut doc).unwrap(), src);
}
