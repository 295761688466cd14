// Small DOM-utility layer over markup5ever_rcdom.
//
// rcdom exposes parent links and child lists but no sibling navigation and
// no attribute map, so the helpers the serializer needs live here. Nodes are
// identified by `Rc` pointer, which is also the key of the metadata side
// table.

use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

/// Identity key for a DOM node. Stable for the lifetime of the tree.
pub(crate) type NodeKey = usize;

pub(crate) fn node_key(handle: &Handle) -> NodeKey {
    Rc::as_ptr(handle) as *const u8 as usize
}

pub(crate) fn same_node(a: &Handle, b: &Handle) -> bool {
    Rc::ptr_eq(a, b)
}

pub(crate) fn is_element(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Element { .. })
}

pub(crate) fn is_text(handle: &Handle) -> bool {
    matches!(handle.data, NodeData::Text { .. })
}

/// Tag name of an element node, lowercase.
pub(crate) fn tag_name(handle: &Handle) -> Option<&str> {
    if let NodeData::Element { ref name, .. } = handle.data {
        Some(name.local.as_ref())
    } else {
        None
    }
}

pub(crate) fn is_element_named(handle: &Handle, name: &str) -> bool {
    tag_name(handle) == Some(name)
}

/// Display name for diagnostics: the tag name, `#text`, or `#comment`.
pub(crate) fn node_name(handle: &Handle) -> String {
    match &handle.data {
        NodeData::Element { name, .. } => name.local.as_ref().to_string(),
        NodeData::Text { .. } => "#text".to_string(),
        NodeData::Comment { .. } => "#comment".to_string(),
        NodeData::Document => "#document".to_string(),
        _ => "#other".to_string(),
    }
}

/// Get the value of an attribute on an element node.
pub(crate) fn get_attr(handle: &Handle, name: &str) -> Option<String> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        for attr in attrs.borrow().iter() {
            if attr.name.local.as_ref() == name {
                return Some(attr.value.to_string());
            }
        }
    }
    None
}

pub(crate) fn has_attr(handle: &Handle, name: &str) -> bool {
    get_attr(handle, name).is_some()
}

/// All attributes as (name, value) pairs, in document order.
pub(crate) fn attributes(handle: &Handle) -> Vec<(String, String)> {
    if let NodeData::Element { ref attrs, .. } = handle.data {
        attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.as_ref().to_string(), a.value.to_string()))
            .collect()
    } else {
        Vec::new()
    }
}

/// Text of a text node.
pub(crate) fn text_value(handle: &Handle) -> Option<String> {
    if let NodeData::Text { ref contents } = handle.data {
        Some(contents.borrow().to_string())
    } else {
        None
    }
}

/// Concatenated text of all descendant text nodes.
pub(crate) fn text_content(handle: &Handle) -> String {
    let mut out = String::new();
    collect_text(handle, &mut out);
    out
}

fn collect_text(handle: &Handle, out: &mut String) {
    if let NodeData::Text { ref contents } = handle.data {
        out.push_str(&contents.borrow());
    }
    for child in handle.children.borrow().iter() {
        collect_text(child, out);
    }
}

pub(crate) fn parent(handle: &Handle) -> Option<Handle> {
    let stored = handle.parent.take();
    let result = stored.as_ref().and_then(|weak| weak.upgrade());
    handle.parent.set(stored);
    result
}

/// Snapshot of the child list. Handlers may mutate the tree elsewhere, so
/// iteration works on a clone.
pub(crate) fn children(handle: &Handle) -> Vec<Handle> {
    handle.children.borrow().iter().cloned().collect()
}

pub(crate) fn last_child(handle: &Handle) -> Option<Handle> {
    handle.children.borrow().last().cloned()
}

fn index_in_parent(handle: &Handle) -> Option<(Handle, usize)> {
    let parent = parent(handle)?;
    let idx = parent
        .children
        .borrow()
        .iter()
        .position(|c| Rc::ptr_eq(c, handle))?;
    Some((parent, idx))
}

pub(crate) fn prev_sibling(handle: &Handle) -> Option<Handle> {
    let (parent, idx) = index_in_parent(handle)?;
    if idx == 0 {
        None
    } else {
        parent.children.borrow().get(idx - 1).cloned()
    }
}

pub(crate) fn next_sibling(handle: &Handle) -> Option<Handle> {
    let (parent, idx) = index_in_parent(handle)?;
    let siblings = parent.children.borrow();
    siblings.get(idx + 1).cloned()
}

/// Previous sibling, skipping whitespace-only text and comments.
pub(crate) fn prev_non_sep_sibling(handle: &Handle) -> Option<Handle> {
    let mut cur = prev_sibling(handle);
    while let Some(node) = cur {
        if !is_separator_node(&node) {
            return Some(node);
        }
        cur = prev_sibling(&node);
    }
    None
}

/// Next sibling, skipping whitespace-only text and comments.
pub(crate) fn next_non_sep_sibling(handle: &Handle) -> Option<Handle> {
    let mut cur = next_sibling(handle);
    while let Some(node) = cur {
        if !is_separator_node(&node) {
            return Some(node);
        }
        cur = next_sibling(&node);
    }
    None
}

/// First child that is not whitespace-only text or a comment.
pub(crate) fn first_non_sep_child(handle: &Handle) -> Option<Handle> {
    children(handle).into_iter().find(|c| !is_separator_node(c))
}

/// Whitespace-only text nodes and comments are separator material, not
/// content.
pub(crate) fn is_separator_node(handle: &Handle) -> bool {
    match &handle.data {
        NodeData::Text { contents } => contents.borrow().chars().all(char::is_whitespace),
        NodeData::Comment { .. } => true,
        _ => false,
    }
}

/// Detach a node from its parent's child list.
pub(crate) fn detach(handle: &Handle) {
    if let Some(parent) = parent(handle) {
        parent
            .children
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, handle));
        handle.parent.set(None);
    }
}

/// Whitespace-separated entries of the `typeof` attribute.
pub(crate) fn type_ofs(handle: &Handle) -> Vec<String> {
    get_attr(handle, "typeof")
        .map(|t| t.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Does `typeof` contain the exact marker?
pub(crate) fn has_type_of(handle: &Handle, marker: &str) -> bool {
    type_ofs(handle).iter().any(|t| t == marker)
}

/// Does `typeof` contain a marker with the given prefix (e.g.
/// `mw:Extension/`)?
pub(crate) fn has_type_of_prefix(handle: &Handle, prefix: &str) -> bool {
    type_ofs(handle).iter().any(|t| t.starts_with(prefix))
}

pub(crate) fn is_list(handle: &Handle) -> bool {
    matches!(tag_name(handle), Some("ul" | "ol" | "dl"))
}

pub(crate) fn is_list_item(handle: &Handle) -> bool {
    matches!(tag_name(handle), Some("li" | "dt" | "dd"))
}

pub(crate) fn is_heading(handle: &Handle) -> bool {
    matches!(
        tag_name(handle),
        Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6")
    )
}

/// Find the `<body>` element under a document node.
pub(crate) fn find_body(handle: &Handle) -> Option<Handle> {
    if is_element_named(handle, "body") {
        return Some(handle.clone());
    }
    for child in handle.children.borrow().iter() {
        if let Some(body) = find_body(child) {
            return Some(body);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use html5ever::parse_document;
    use html5ever::tendril::TendrilSink;
    use markup5ever_rcdom::RcDom;

    fn parse(html: &str) -> Handle {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .one(html.as_bytes());
        let body = find_body(&dom.document).expect("body");
        std::mem::forget(dom);
        body
    }

    #[test]
    fn sibling_navigation() {
        let body = parse("<p>a</p><p>b</p>");
        let kids = children(&body);
        assert_eq!(kids.len(), 2);
        assert!(same_node(&next_sibling(&kids[0]).unwrap(), &kids[1]));
        assert!(same_node(&prev_sibling(&kids[1]).unwrap(), &kids[0]));
        assert!(prev_sibling(&kids[0]).is_none());
    }

    #[test]
    fn typeof_markers_split_on_whitespace() {
        let body = parse(r#"<span typeof="mw:Transclusion mw:Extension/ref">x</span>"#);
        let span = first_non_sep_child(&body).unwrap();
        assert!(has_type_of(&span, "mw:Transclusion"));
        assert!(has_type_of_prefix(&span, "mw:Extension/"));
        assert!(!has_type_of(&span, "mw:Entity"));
    }

    #[test]
    fn detach_removes_from_parent() {
        let body = parse("<p>a</p>");
        let p = first_non_sep_child(&body).unwrap();
        detach(&p);
        assert!(children(&body).is_empty());
        assert!(parent(&p).is_none());
    }
}
