// Pre-serialization passes.
//
// Two sweeps run before the serializer sees the tree: marker metas left
// behind by the parser are stripped (edit mode only) and `data-parsoid` is
// finalized; and `<meta property="mw:objectAttr…">` records are collected
// into the templated-attribute map the attribute emitter consults. Both
// passes are idempotent.

use std::collections::HashMap;
use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use crate::dom;
use crate::metadata::MetadataTable;

/// Original wiki source of template-generated attributes, per `about` group.
#[derive(Debug, Clone, Default)]
pub struct TplAttrs {
    /// Full key-value pair sources, keyed by attribute name.
    pub kvs: HashMap<String, String>,
    /// Key-only sources.
    pub ks: HashMap<String, String>,
    /// Value-only sources.
    pub vs: HashMap<String, String>,
}

static MARKER_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^mw:(?:StartTag|EndTag|TSRMarker|Extension/ref/Marker)").unwrap()
});
static OBJECT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^mw:objectAttr(Key|Val)?#(.+)$").unwrap());

/// Run the cleanup passes over the tree rooted at `body`.
pub(crate) fn cleanup(body: &Handle, meta: &mut MetadataTable, edit_mode: bool) {
    if edit_mode {
        strip_marker_metas(body, meta);
    }
    finalize_data_parsoid(body, meta);
}

fn strip_marker_metas(node: &Handle, meta: &mut MetadataTable) {
    for child in dom::children(node) {
        if is_marker_meta(&child) {
            dom::detach(&child);
            meta.remove(&child);
        } else {
            strip_marker_metas(&child, meta);
        }
    }
}

fn is_marker_meta(node: &Handle) -> bool {
    if !dom::is_element_named(node, "meta") {
        return false;
    }
    let type_ofs = dom::type_ofs(node);
    // The transclusion marker dominates any co-located marker type.
    if type_ofs.iter().any(|t| t == "mw:Transclusion") {
        return false;
    }
    if type_ofs.iter().any(|t| t == "mw:Placeholder/StrippedTag") {
        return true;
    }
    !dom::has_attr(node, "property") && type_ofs.iter().any(|t| MARKER_META.is_match(t))
}

fn finalize_data_parsoid(node: &Handle, meta: &mut MetadataTable) {
    for child in dom::children(node) {
        if !dom::is_element(&child) {
            continue;
        }
        let encapsulated = dom::has_type_of(&child, "mw:Transclusion")
            || dom::has_type_of_prefix(&child, "mw:Extension/");
        {
            let has_mw = meta.mw(&child).is_some();
            let dp = meta.dp_mut(&child);
            if child.children.borrow().is_empty()
                && dp.auto_inserted_start()
                && dp.auto_inserted_end()
            {
                dom::detach(&child);
                meta.remove(&child);
                continue;
            }
            dp.tag_id = None;
            if encapsulated {
                let reconstructable =
                    (dp.dsr.is_some_and(|d| d.is_complete()) && has_mw) || dp.tsr.is_none();
                if reconstructable {
                    dp.src = None;
                }
            }
            dp.tsr = None;
            if dp.fostered() && !encapsulated {
                if let Some(dsr) = dp.dsr {
                    dp.dsr = Some(dsr.collapsed_to_end());
                }
            }
        }
        finalize_data_parsoid(&child, meta);
    }
}

/// Sweep the tree for `mw:objectAttr` metas and record the original wiki
/// source of template-generated attribute keys and values. The metas stay
/// in the tree; the meta handler skips them during serialization.
pub(crate) fn collect_templated_attributes(body: &Handle) -> HashMap<String, TplAttrs> {
    let mut map = HashMap::new();
    collect_node(body, &mut map);
    map
}

fn collect_node(node: &Handle, map: &mut HashMap<String, TplAttrs>) {
    if dom::is_element_named(node, "meta") {
        if let (Some(property), Some(about)) =
            (dom::get_attr(node, "property"), dom::get_attr(node, "about"))
        {
            if let Some(caps) = OBJECT_ATTR.captures(&property) {
                let key = caps[2].to_string();
                let src = dom::get_attr(node, "content").unwrap_or_default();
                let entry = map.entry(about).or_default();
                match caps.get(1).map(|m| m.as_str()) {
                    None => {
                        entry.kvs.insert(key, src);
                    }
                    Some("Key") => {
                        entry.ks.insert(key, src);
                    }
                    Some("Val") => {
                        entry.vs.insert(key, src);
                    }
                    Some(_) => {}
                }
            }
        }
    }
    for child in dom::children(node) {
        collect_node(&child, map);
    }
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
        let body = dom::find_body(&dom.document).expect("body");
        std::mem::forget(dom);
        body
    }

    #[test]
    fn strips_marker_metas_in_edit_mode() {
        let body = parse(
            r#"<meta typeof="mw:StartTag"><meta typeof="mw:EndTag" property="mw:x"><p>a</p>"#,
        );
        let mut meta = MetadataTable::collect(&body);
        cleanup(&body, &mut meta, true);
        let kids: Vec<_> = dom::children(&body)
            .iter()
            .filter(|c| dom::is_element(c))
            .cloned()
            .collect();
        // The property-bearing meta and the paragraph survive.
        assert_eq!(kids.len(), 2);
        assert!(dom::is_element_named(&kids[0], "meta"));
    }

    #[test]
    fn transclusion_marker_survives_stripping() {
        let body = parse(r#"<meta typeof="mw:EndTag mw:Transclusion">"#);
        let mut meta = MetadataTable::collect(&body);
        cleanup(&body, &mut meta, true);
        assert_eq!(
            dom::children(&body)
                .iter()
                .filter(|c| dom::is_element(c))
                .count(),
            1
        );
    }

    #[test]
    fn drops_empty_auto_inserted_elements() {
        let body = parse(
            r#"<b data-parsoid='{"autoInsertedStart":true,"autoInsertedEnd":true}'></b><p>x</p>"#,
        );
        let mut meta = MetadataTable::collect(&body);
        cleanup(&body, &mut meta, false);
        let elements: Vec<_> = dom::children(&body)
            .into_iter()
            .filter(dom::is_element)
            .collect();
        assert_eq!(elements.len(), 1);
        assert!(dom::is_element_named(&elements[0], "p"));
    }

    #[test]
    fn fostered_dsr_collapses() {
        let body = parse(r#"<p data-parsoid='{"dsr":[4,9,0,0],"fostered":true}'>x</p>"#);
        let mut meta = MetadataTable::collect(&body);
        cleanup(&body, &mut meta, false);
        let p = dom::first_non_sep_child(&body).unwrap();
        let dsr = meta.dp(&p).dsr.unwrap();
        assert_eq!(dsr.start, Some(9));
        assert_eq!(dsr.end, Some(9));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let body = parse(
            r#"<span typeof="mw:Transclusion" data-parsoid='{"dsr":[0,9,null,null],"src":"{{x}}"}'>x</span>"#,
        );
        let mut meta = MetadataTable::collect(&body);
        cleanup(&body, &mut meta, true);
        let span = dom::first_non_sep_child(&body).unwrap();
        let after_once = meta.dp(&span).clone();
        cleanup(&body, &mut meta, true);
        let after_twice = meta.dp(&span).clone();
        assert_eq!(after_once.src, after_twice.src);
        assert_eq!(after_once.dsr, after_twice.dsr);
        assert_eq!(after_once.tsr, after_twice.tsr);
    }

    #[test]
    fn collects_templated_attribute_sources() {
        let body = parse(
            r##"<meta property="mw:objectAttr#class" about="#mwt1" content="class={{C}}">
               <meta property="mw:objectAttrVal#style" about="#mwt1" content="{{S}}">"##,
        );
        let map = collect_templated_attributes(&body);
        let entry = map.get("#mwt1").unwrap();
        assert_eq!(entry.kvs.get("class").map(String::as_str), Some("class={{C}}"));
        assert_eq!(entry.vs.get("style").map(String::as_str), Some("{{S}}"));
        assert!(entry.ks.is_empty());
    }
}
