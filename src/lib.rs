// html2wikitext — HTML to wikitext serializer.
//
// Architecture:
//   annotated HTML string → html5ever parse → DOM + metadata side table
//   → cleanup pre-pass → single-pass serializer → wikitext
//
// The input tree is the kind a bidirectional wiki↔HTML converter produces:
// every element carries a `data-parsoid` record (source ranges, original
// syntax hints) and template roots carry `data-mw`. The serializer aims for
// output that re-parses to an equivalent tree; with selective serialization
// and an untouched tree, the output is the original source byte for byte.

mod config;
mod dom;
mod error;
mod metadata;
mod prepass;
mod serialize;
mod tokenizer;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, RcDom};

pub use config::SiteConfig;
pub use error::SerializeError;
pub use metadata::{
    DataMw, DataParsoid, DiffMark, Dsr, ExtBody, ImageOption, MetadataTable, Syntax,
    TemplateInvocation, TemplateParam, TemplatePart, TemplateTarget, TemplateWrapper,
};

/// Serialization environment: the original page source, mode flags, and the
/// wiki configuration.
#[derive(Debug, Default)]
pub struct Env {
    /// Original wiki source of the page; required for selective
    /// serialization, used opportunistically elsewhere.
    pub page_src: Option<String>,
    /// Enables the marker-meta cleanup pass meant for edited trees.
    pub edit_mode: bool,
    /// Round-trip test mode: template roots emit their recorded source
    /// verbatim instead of reconstructing from `data-mw`.
    pub rt_testing: bool,
    /// Emit a trace event per chunk.
    pub trace: bool,
    /// Site configuration (localized option names, protocols, …).
    pub conf: SiteConfig,
}

impl Env {
    /// Create an environment with default (English-wiki) configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the original page source.
    pub fn with_page_src(mut self, src: impl Into<String>) -> Self {
        self.page_src = Some(src.into());
        self
    }

    /// Enable or disable edit-mode cleanup.
    pub fn with_edit_mode(mut self, edit_mode: bool) -> Self {
        self.edit_mode = edit_mode;
        self
    }

    /// Enable or disable round-trip test mode.
    pub fn with_rt_testing(mut self, rt_testing: bool) -> Self {
        self.rt_testing = rt_testing;
        self
    }

    /// Replace the site configuration.
    pub fn with_conf(mut self, conf: SiteConfig) -> Self {
        self.conf = conf;
        self
    }
}

/// A parsed document plus its decoded round-trip metadata.
pub struct Document {
    // Kept alive for the lifetime of `body`: `RcDom`'s `Node` has a custom
    // `Drop` that recursively clears descendants' child lists to break
    // reference cycles, so dropping the parse root would empty `body` too.
    _dom: RcDom,
    body: Handle,
    meta: MetadataTable,
}

impl Document {
    /// The `<body>` element the serializer starts from.
    pub fn body(&self) -> &Handle {
        &self.body
    }

    /// Decoded metadata, for callers that want to inspect it.
    pub fn metadata(&self) -> &MetadataTable {
        &self.meta
    }

    /// Mark a node as newly inserted by an edit. Selective serialization
    /// will not reuse source for it.
    pub fn mark_inserted(&mut self, node: &Handle) {
        self.meta.set_diff_mark(node, DiffMark::Inserted);
    }

    /// Mark a node as modified by an edit.
    pub fn mark_modified(&mut self, node: &Handle) {
        self.meta.set_diff_mark(node, DiffMark::Modified);
    }
}

/// Parse an annotated HTML string into a [`Document`].
///
/// # Examples
///
/// ```
/// let env = html2wikitext::Env::new();
/// let mut doc = html2wikitext::from_html(&env, "<p>Hello, world!</p>").unwrap();
/// let wikitext = html2wikitext::serialize(&env, &mut doc).unwrap();
/// assert_eq!(wikitext, "Hello, world!");
/// ```
pub fn from_html(_env: &Env, html: &str) -> Result<Document, SerializeError> {
    let dom = parse_html(html);
    let body = dom::find_body(&dom.document).ok_or(SerializeError::MissingBody)?;
    let meta = MetadataTable::collect(&body);
    Ok(Document {
        _dom: dom,
        body,
        meta,
    })
}

fn parse_html(html: &str) -> RcDom {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };
    parse_document(RcDom::default(), opts)
        .from_utf8()
        .one(html.as_bytes())
}

/// Serialize a document to wikitext.
///
/// # Examples
///
/// ```
/// let env = html2wikitext::Env::new();
/// let mut doc = html2wikitext::from_html(&env, "<p>foo</p><p>bar</p>").unwrap();
/// assert_eq!(html2wikitext::serialize(&env, &mut doc).unwrap(), "foo\n\nbar");
/// ```
pub fn serialize(env: &Env, doc: &mut Document) -> Result<String, SerializeError> {
    prepass::cleanup(&doc.body, &mut doc.meta, env.edit_mode);
    let tpl_attrs = prepass::collect_templated_attributes(&doc.body);
    serialize::run(env, &doc.body, &doc.meta, tpl_attrs, None, false)
}

/// Serialize a document, pushing each chunk into `sink` as it is emitted.
pub fn serialize_with_sink(
    env: &Env,
    doc: &mut Document,
    mut sink: impl FnMut(&str),
) -> Result<(), SerializeError> {
    prepass::cleanup(&doc.body, &mut doc.meta, env.edit_mode);
    let tpl_attrs = prepass::collect_templated_attributes(&doc.body);
    serialize::run(env, &doc.body, &doc.meta, tpl_attrs, Some(&mut sink), false).map(|_| ())
}

/// Serialize selectively: subtrees without diff marks are emitted as
/// verbatim slices of `env.page_src`. With no diff marks at all, the output
/// equals the original source byte for byte.
pub fn serialize_selser(env: &Env, doc: &mut Document) -> Result<String, SerializeError> {
    prepass::cleanup(&doc.body, &mut doc.meta, env.edit_mode);
    let tpl_attrs = prepass::collect_templated_attributes(&doc.body);
    serialize::run(env, &doc.body, &doc.meta, tpl_attrs, None, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_empty_body() {
        let env = Env::new();
        let mut doc = from_html(&env, "").unwrap();
        assert_eq!(serialize(&env, &mut doc).unwrap(), "");
    }

    #[test]
    fn missing_page_source_is_an_error_for_selser() {
        let env = Env::new();
        let mut doc = from_html(&env, "<p>x</p>").unwrap();
        assert!(matches!(
            serialize_selser(&env, &mut doc),
            Err(SerializeError::MissingPageSource)
        ));
    }

    #[test]
    fn env_builder() {
        let env = Env::new()
            .with_page_src("foo")
            .with_edit_mode(true)
            .with_rt_testing(true);
        assert_eq!(env.page_src.as_deref(), Some("foo"));
        assert!(env.edit_mode);
        assert!(env.rt_testing);
    }

    #[test]
    fn sink_receives_all_chunks() {
        let env = Env::new();
        let mut doc = from_html(&env, "<p>foo</p><p>bar</p>").unwrap();
        let mut out = String::new();
        serialize_with_sink(&env, &mut doc, |chunk| out.push_str(chunk)).unwrap();
        assert_eq!(out, "foo\n\nbar");
    }
}
