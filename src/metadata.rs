// Typed round-trip metadata.
//
// Every element produced by the paired parser carries a `data-parsoid` JSON
// attribute (source ranges, original syntax hints, auto-insertion flags) and
// template roots carry `data-mw` (the invocation). Both are decoded once,
// up front, into the records below and held in a side table keyed by node
// identity, so no handler ever re-parses a JSON string attribute.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use markup5ever_rcdom::Handle;
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::warn;

use crate::dom::{self, NodeKey};

/// Document-source range: byte offsets of an element's original wiki source
/// and the widths of its opening and closing markup. Unknown components are
/// `None`; there is no NaN-style sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dsr {
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub open_width: Option<u32>,
    pub close_width: Option<u32>,
}

impl Dsr {
    /// Both offsets known and ordered.
    pub fn is_valid(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s <= e)
    }

    /// All four components known.
    pub fn is_complete(&self) -> bool {
        self.is_valid() && self.open_width.is_some() && self.close_width.is_some()
    }

    /// Zero-width range anchored at the end offset. Used to neutralize
    /// fostered content so source slicing cannot duplicate it.
    pub fn collapsed_to_end(&self) -> Dsr {
        Dsr {
            start: self.end,
            end: self.end,
            open_width: Some(0),
            close_width: Some(0),
        }
    }
}

// JSON form is an array of up to four numbers, any of which may be null or
// negative (both mean "unknown").
impl<'de> Deserialize<'de> for Dsr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DsrVisitor;

        impl<'de> Visitor<'de> for DsrVisitor {
            type Value = Dsr;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of source offsets")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Dsr, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut parts = [None; 4];
                for slot in parts.iter_mut() {
                    match seq.next_element::<Option<i64>>()? {
                        Some(value) => {
                            *slot = value.and_then(|v| u32::try_from(v).ok());
                        }
                        None => break,
                    }
                }
                // Drain any extra elements so trailing data is not an error.
                while seq.next_element::<serde_json::Value>()?.is_some() {}
                Ok(Dsr {
                    start: parts[0],
                    end: parts[1],
                    open_width: parts[2],
                    close_width: parts[3],
                })
            }
        }

        deserializer.deserialize_seq(DsrVisitor)
    }
}

/// Which syntactic form an element originally had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Html,
    Piped,
    Row,
    Other,
}

impl<'de> Deserialize<'de> for Syntax {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "html" => Syntax::Html,
            "piped" => Syntax::Piped,
            "row" => Syntax::Row,
            _ => Syntax::Other,
        })
    }
}

/// One entry of an image's option list: canonical key plus the source
/// spelling of the option.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageOption {
    #[serde(default)]
    pub ck: String,
    #[serde(default)]
    pub ak: String,
}

/// Decoded `data-parsoid`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataParsoid {
    pub dsr: Option<Dsr>,
    pub stx: Option<Syntax>,
    #[serde(rename = "stx_v")]
    pub stx_v: Option<Syntax>,
    pub auto_inserted_start: Option<bool>,
    pub auto_inserted_end: Option<bool>,
    pub src: Option<String>,
    pub start_tag_src: Option<String>,
    pub end_tag_src: Option<String>,
    pub attr_sep_src: Option<String>,
    pub magic_src: Option<String>,
    #[serde(rename = "strippedNL")]
    pub stripped_nl: Option<bool>,
    pub fostered: Option<bool>,
    pub tsr: Option<(Option<u32>, Option<u32>)>,
    pub tag_id: Option<u32>,
    pub self_close: Option<bool>,
    #[serde(rename = "extra_dashes")]
    pub extra_dashes: Option<u32>,
    pub option_list: Option<Vec<ImageOption>>,
    pub opt_names: Option<HashMap<String, String>>,
    pub tail: Option<String>,
    pub prefix: Option<String>,
    pub pipetrick: Option<bool>,
    pub src_content: Option<String>,
    /// Sanitizer-accepted attribute values, keyed by attribute name.
    pub a: Option<HashMap<String, Option<String>>>,
    /// Original source attribute values, keyed by attribute name.
    pub sa: Option<HashMap<String, String>>,
}

impl DataParsoid {
    pub fn stx_is(&self, syntax: Syntax) -> bool {
        self.stx == Some(syntax)
    }

    pub fn auto_inserted_start(&self) -> bool {
        self.auto_inserted_start.unwrap_or(false)
    }

    pub fn auto_inserted_end(&self) -> bool {
        self.auto_inserted_end.unwrap_or(false)
    }

    pub fn fostered(&self) -> bool {
        self.fostered.unwrap_or(false)
    }
}

/// Decoded `data-mw`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataMw {
    pub parts: Option<Vec<TemplatePart>>,
    /// Extension tag name.
    pub name: Option<String>,
    /// Extension tag attributes, in source order.
    pub attrs: Option<IndexMap<String, String>>,
    pub body: Option<ExtBody>,
}

/// One part of a transclusion: a template invocation or interleaved text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplatePart {
    Template(TemplateWrapper),
    Literal(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateWrapper {
    pub template: TemplateInvocation,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateInvocation {
    pub target: TemplateTarget,
    /// Parameters in source order; positional parameters are keyed by their
    /// index rendered as a string.
    pub params: IndexMap<String, TemplateParam>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateTarget {
    pub wt: Option<String>,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateParam {
    pub wt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtBody {
    pub extsrc: Option<String>,
}

/// Per-node edit annotation, attached by the caller's diff pass. A node
/// with no mark is unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMark {
    Inserted,
    Modified,
}

static EMPTY_DP: LazyLock<DataParsoid> = LazyLock::new(DataParsoid::default);

/// Side table of decoded metadata, keyed by node identity.
#[derive(Debug, Default)]
pub struct MetadataTable {
    dp: HashMap<NodeKey, DataParsoid>,
    mw: HashMap<NodeKey, DataMw>,
    diff: HashMap<NodeKey, DiffMark>,
}

impl MetadataTable {
    /// Decode `data-parsoid` and `data-mw` attributes for every element
    /// under `root`. Malformed JSON is logged and skipped.
    pub fn collect(root: &Handle) -> Self {
        let mut table = MetadataTable::default();
        table.collect_node(root);
        table
    }

    fn collect_node(&mut self, node: &Handle) {
        if dom::is_element(node) {
            if let Some(json) = dom::get_attr(node, "data-parsoid") {
                match serde_json::from_str::<DataParsoid>(&json) {
                    Ok(dp) => {
                        self.dp.insert(dom::node_key(node), dp);
                    }
                    Err(err) => {
                        warn!(node = %dom::node_name(node), %err, "unreadable data-parsoid");
                    }
                }
            }
            if let Some(json) = dom::get_attr(node, "data-mw") {
                match serde_json::from_str::<DataMw>(&json) {
                    Ok(mw) => {
                        self.mw.insert(dom::node_key(node), mw);
                    }
                    Err(err) => {
                        warn!(node = %dom::node_name(node), %err, "unreadable data-mw");
                    }
                }
            }
        }
        for child in dom::children(node) {
            self.collect_node(&child);
        }
    }

    /// The node's `data-parsoid`, or an empty record.
    pub fn dp(&self, node: &Handle) -> &DataParsoid {
        self.dp.get(&dom::node_key(node)).unwrap_or(&EMPTY_DP)
    }

    pub(crate) fn dp_mut(&mut self, node: &Handle) -> &mut DataParsoid {
        self.dp.entry(dom::node_key(node)).or_default()
    }

    pub fn mw(&self, node: &Handle) -> Option<&DataMw> {
        self.mw.get(&dom::node_key(node))
    }

    pub fn diff_mark(&self, node: &Handle) -> Option<DiffMark> {
        self.diff.get(&dom::node_key(node)).copied()
    }

    /// Attach a diff mark. Consulted only by the selective serializer.
    pub fn set_diff_mark(&mut self, node: &Handle, mark: DiffMark) {
        self.diff.insert(dom::node_key(node), mark);
    }

    pub(crate) fn remove(&mut self, node: &Handle) {
        let key = dom::node_key(node);
        self.dp.remove(&key);
        self.mw.remove(&key);
        self.diff.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsr_from_array_with_nulls() {
        let dsr: Dsr = serde_json::from_str("[0,12,null,2]").unwrap();
        assert_eq!(dsr.start, Some(0));
        assert_eq!(dsr.end, Some(12));
        assert_eq!(dsr.open_width, None);
        assert_eq!(dsr.close_width, Some(2));
        assert!(dsr.is_valid());
        assert!(!dsr.is_complete());
    }

    #[test]
    fn dsr_rejects_negative_offsets() {
        let dsr: Dsr = serde_json::from_str("[-1,5]").unwrap();
        assert_eq!(dsr.start, None);
        assert!(!dsr.is_valid());
    }

    #[test]
    fn data_parsoid_field_names() {
        let dp: DataParsoid = serde_json::from_str(
            r#"{"dsr":[0,5,1,1],"stx":"html","autoInsertedStart":true,
                "startTagSrc":"{|","strippedNL":true,"extra_dashes":2,
                "stx_v":"row","tagId":7}"#,
        )
        .unwrap();
        assert!(dp.stx_is(Syntax::Html));
        assert!(dp.auto_inserted_start());
        assert_eq!(dp.start_tag_src.as_deref(), Some("{|"));
        assert_eq!(dp.stripped_nl, Some(true));
        assert_eq!(dp.extra_dashes, Some(2));
        assert_eq!(dp.stx_v, Some(Syntax::Row));
        assert_eq!(dp.tag_id, Some(7));
    }

    #[test]
    fn data_mw_template_params_keep_order() {
        let mw: DataMw = serde_json::from_str(
            r#"{"parts":[{"template":{"target":{"wt":"tpl"},
                "params":{"b":{"wt":"2"},"a":{"wt":"1"}}}}]}"#,
        )
        .unwrap();
        let parts = mw.parts.unwrap();
        match &parts[0] {
            TemplatePart::Template(t) => {
                let keys: Vec<_> = t.template.params.keys().cloned().collect();
                assert_eq!(keys, ["b", "a"]);
            }
            TemplatePart::Literal(_) => panic!("expected template part"),
        }
    }
}
