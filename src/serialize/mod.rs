// DOM → wikitext serializer core.
//
// Single depth-first pass. For every node the driver merges the separator
// constraints owed between it and its predecessor, flushes the pending
// separator on the next emission, and then either reuses original source
// (selective serialization) or dispatches to the tag handler. Handlers
// recurse through `serialize_children`.

pub(crate) mod attributes;
pub(crate) mod escape;
pub(crate) mod handlers;
pub(crate) mod links;
pub(crate) mod selser;
pub(crate) mod separators;

use std::collections::HashMap;
use std::sync::LazyLock;

use markup5ever_rcdom::{Handle, NodeData};
use regex::Regex;
use tracing::{error, trace};

use crate::dom;
use crate::error::SerializeError;
use crate::metadata::MetadataTable;
use crate::prepass::TplAttrs;
use crate::Env;
use escape::EscapeContext;
use separators::{Constraints, SepSpec, Separator};

/// Cumulative text of the current output line, consulted by the escape
/// oracle to detect constructs straddling chunk boundaries.
#[derive(Default)]
pub(crate) struct CurrLine {
    pub text: String,
    pub first_node: Option<Handle>,
    pub processed: bool,
    pub has_open_heading_char: bool,
    pub has_open_brackets: bool,
}

impl CurrLine {
    fn reset(&mut self) {
        *self = CurrLine::default();
    }
}

pub(crate) struct State<'e> {
    pub env: &'e Env,
    pub meta: &'e MetadataTable,
    pub tpl_attrs: HashMap<String, TplAttrs>,

    out: String,
    sink: Option<&'e mut dyn FnMut(&str)>,
    captures: Vec<String>,

    pub sep: Separator,
    pub on_sol: bool,
    pub at_start_of_output: bool,
    pub escape_text: bool,
    pub in_indent_pre: bool,
    pub in_php_block: bool,
    pub in_html_pre: bool,
    pub in_no_wiki: bool,
    pub rt_testing: bool,
    pub selser_mode: bool,
    pub wte_handlers: Vec<EscapeContext>,
    pub curr_line: CurrLine,

    pub prev_node_unmodified: bool,
    pub curr_node_unmodified: bool,
    pub in_modified_content: bool,
    pub active_template_id: Option<String>,
}

impl<'e> State<'e> {
    fn new(
        env: &'e Env,
        meta: &'e MetadataTable,
        tpl_attrs: HashMap<String, TplAttrs>,
        sink: Option<&'e mut dyn FnMut(&str)>,
        selser_mode: bool,
    ) -> Self {
        State {
            env,
            meta,
            tpl_attrs,
            out: String::new(),
            sink,
            captures: Vec::new(),
            sep: Separator::default(),
            on_sol: true,
            at_start_of_output: true,
            escape_text: true,
            in_indent_pre: false,
            in_php_block: false,
            in_html_pre: false,
            in_no_wiki: false,
            rt_testing: env.rt_testing,
            selser_mode,
            wte_handlers: Vec::new(),
            curr_line: CurrLine::default(),
            prev_node_unmodified: false,
            curr_node_unmodified: false,
            in_modified_content: false,
            active_template_id: None,
        }
    }

    fn write(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if let Some(buf) = self.captures.last_mut() {
            buf.push_str(chunk);
        } else if let Some(sink) = self.sink.as_mut() {
            sink(chunk);
        } else {
            self.out.push_str(chunk);
        }
    }

    /// Emit a chunk of markup on behalf of `node`, flushing the pending
    /// separator first.
    pub(crate) fn emit(&mut self, chunk: &str, node: &Handle) {
        if chunk.is_empty() {
            return;
        }
        let after = self
            .sep
            .last_source_node
            .as_ref()
            .map(|n| dom::node_name(n));
        let sep = self.flush_separator(Some(node));
        if self.env.trace {
            trace!(
                node = %dom::node_name(node),
                after = %after.unwrap_or_default(),
                sep = %sep,
                chunk = %chunk,
                "emit"
            );
        }
        self.write(&sep);
        self.note_emitted(&sep, node);
        self.write(chunk);
        self.note_emitted(chunk, node);
    }

    fn note_emitted(&mut self, chunk: &str, node: &Handle) {
        if chunk.is_empty() {
            return;
        }
        self.at_start_of_output = false;
        match chunk.rfind('\n') {
            Some(pos) => {
                self.curr_line.reset();
                let tail = &chunk[pos + 1..];
                self.curr_line.text.push_str(tail);
                if !tail.is_empty() {
                    self.curr_line.first_node = Some(node.clone());
                }
                self.on_sol = tail.is_empty();
            }
            None => {
                if self.curr_line.text.is_empty() && self.curr_line.first_node.is_none() {
                    self.curr_line.first_node = Some(node.clone());
                }
                self.curr_line.text.push_str(chunk);
                self.curr_line.processed = false;
                self.on_sol = false;
            }
        }
    }

    /// Merge the constraint pair for an adjacent `(a, b)` topology hop into
    /// the pending separator, and extend the source gap the separator could
    /// be recovered from.
    pub(crate) fn update_constraints(
        &mut self,
        a: &Handle,
        a_spec: SepSpec,
        a_end: Option<u32>,
        b_spec: SepSpec,
        b_start: Option<u32>,
    ) {
        let fresh = self.sep.constraints.is_none();
        self.sep.constraints = Some(separators::merge_pair(self.sep.constraints, a_spec, b_spec));
        if fresh {
            self.sep.gap_left = a_end;
        }
        self.sep.gap_right = b_start;
        self.sep.last_source_node = Some(a.clone());
    }

    fn source_gap(&self) -> Option<String> {
        let src = self.env.page_src.as_ref()?;
        let left = self.sep.gap_left? as usize;
        let right = self.sep.gap_right? as usize;
        if left <= right {
            src.get(left..right).map(str::to_string)
        } else {
            None
        }
    }

    /// Materialize and clear the pending separator.
    fn flush_separator(&mut self, next: Option<&Handle>) -> String {
        let cons = self.sep.constraints.take().unwrap_or(Constraints {
            min: None,
            max: 2,
            a: SepSpec::NONE,
            b: SepSpec::NONE,
        });
        let gap = self.source_gap();
        let accumulated = self.sep.src.take();
        self.sep.gap_left = None;
        self.sep.gap_right = None;
        self.sep.last_source_node = None;

        // Between two unmodified nodes the original bytes are authoritative.
        if self.selser_mode
            && self.prev_node_unmodified
            && self.curr_node_unmodified
        {
            if let Some(gap) = &gap {
                if separators::is_valid_separator(gap) {
                    return gap.clone();
                }
            }
        }

        let candidate = match (&gap, &accumulated) {
            (Some(g), _) if separators::is_valid_separator(g) => g.clone(),
            (_, Some(src)) => src.clone(),
            _ => String::new(),
        };
        let next_tag = next.and_then(|n| dom::tag_name(n).map(str::to_string));
        separators::make_separator(
            &candidate,
            &cons,
            self.at_start_of_output,
            next_tag.as_deref(),
        )
    }

    /// Flush whatever separator is still pending at the end of the run.
    /// Nothing follows, so minimum requirements no longer apply; original
    /// trailing whitespace is preserved where the source provides it.
    fn flush_trailing(&mut self) {
        let mut cons = self.sep.constraints.take().unwrap_or(Constraints {
            min: None,
            max: 2,
            a: SepSpec::NONE,
            b: SepSpec::NONE,
        });
        cons.min = None;
        self.sep.constraints = Some(cons);
        self.curr_node_unmodified = self.prev_node_unmodified;
        let sep = self.flush_separator(None);
        self.write(&sep);
    }

    /// Serialize into a scratch buffer. The pending separator and line
    /// bookkeeping are saved and restored, so the surrounding run observes
    /// no side effects.
    pub(crate) fn capture<F>(&mut self, f: F) -> Result<String, SerializeError>
    where
        F: FnOnce(&mut State<'e>) -> Result<(), SerializeError>,
    {
        let saved_sep = std::mem::take(&mut self.sep);
        let saved_line = std::mem::take(&mut self.curr_line);
        let saved_sol = self.on_sol;
        let saved_start = self.at_start_of_output;
        self.captures.push(String::new());

        let result = f(self);

        let captured = self.captures.pop().unwrap_or_default();
        self.sep = saved_sep;
        self.curr_line = saved_line;
        self.on_sol = saved_sol;
        self.at_start_of_output = saved_start;
        result.map(|_| captured)
    }

    /// Is the node (or the subtree it sits in) touched by an edit? Only
    /// meaningful in selser mode; round-trip runs treat everything as
    /// pristine.
    pub(crate) fn node_modified(&self, node: &Handle) -> bool {
        self.in_modified_content
            || (self.selser_mode && self.meta.diff_mark(node).is_some())
    }
}

static PRE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</pre").unwrap());

/// Serialize the children of `node`, optionally under a construct-specific
/// escape predicate. The predicate stack is restored on every exit path.
pub(crate) fn serialize_children(
    state: &mut State,
    node: &Handle,
    wte: Option<EscapeContext>,
) -> Result<(), SerializeError> {
    let depth = state.wte_handlers.len();
    if let Some(ctx) = wte {
        state.wte_handlers.push(ctx);
    }
    let result = serialize_children_inner(state, node);
    state.wte_handlers.truncate(depth);
    result
}

fn serialize_children_inner(state: &mut State, parent: &Handle) -> Result<(), SerializeError> {
    let mut prev: Option<Handle> = None;
    for child in dom::children(parent) {
        let contributed = serialize_node(state, &child, parent, prev.as_ref())?;
        if contributed {
            prev = Some(child);
        }
    }
    if let Some(last) = prev {
        // Closing hop: last child against its parent.
        let a_spec = handlers::sep_after(state, &last, parent);
        let b_spec = handlers::sep_last_child(state, parent, &last);
        let a_end = handlers::dsr_end(state, &last);
        let b_start = handlers::dsr_inner_end(state, parent);
        state.update_constraints(&last, a_spec, a_end, b_spec, b_start);
    }
    Ok(())
}

/// Serialize one node. Returns whether the node contributed content (false
/// when it was folded into the pending separator).
fn serialize_node(
    state: &mut State,
    node: &Handle,
    parent: &Handle,
    prev: Option<&Handle>,
) -> Result<bool, SerializeError> {
    match &node.data {
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            serialize_text_node(state, node, parent, prev, &text)
        }
        NodeData::Comment { contents } => {
            let body = contents.to_string();
            serialize_comment_node(state, node, parent, prev, &body)
        }
        NodeData::Element { .. } => serialize_element_node(state, node, parent, prev),
        _ => Ok(false),
    }
}

fn serialize_text_node(
    state: &mut State,
    node: &Handle,
    parent: &Handle,
    prev: Option<&Handle>,
    text: &str,
) -> Result<bool, SerializeError> {
    if text.is_empty() {
        return Ok(false);
    }
    let in_pre = state.in_html_pre || state.in_indent_pre;
    if !in_pre && text.chars().all(char::is_whitespace) {
        state.sep.push_src(text);
        return Ok(false);
    }

    // A leading newline run belongs to the separator, not the text.
    let (lead, rest) = if in_pre {
        ("", text)
    } else {
        let body_start = text.len() - text.trim_start_matches('\n').len();
        text.split_at(body_start)
    };
    if !lead.is_empty() {
        state.sep.push_src(lead);
    }

    update_incoming_constraints(state, node, parent, prev);

    // The escape decision depends on the line position *after* the pending
    // separator, so flush it before consulting the oracle.
    let sep = state.flush_separator(Some(node));
    state.write(&sep);
    state.note_emitted(&sep, node);

    let chunk = if state.in_no_wiki {
        rest.replace("</nowiki>", "&lt;/nowiki&gt;")
    } else if state.in_html_pre || !state.escape_text {
        PRE_CLOSE.replace_all(rest, "&lt;/pre").to_string()
    } else {
        escape::escape_wikitext(state, rest, node)
    };
    state.emit(&chunk, node);
    // Free-standing text has no source range; it interrupts any verbatim
    // reuse chain on both sides.
    state.prev_node_unmodified = false;
    state.curr_node_unmodified = false;
    Ok(true)
}

fn serialize_comment_node(
    state: &mut State,
    node: &Handle,
    parent: &Handle,
    prev: Option<&Handle>,
    body: &str,
) -> Result<bool, SerializeError> {
    // Comments flanked by elements (or sitting at an edge) are separator
    // material and get reconciled with the surrounding constraints.
    let prev_ok = dom::prev_sibling(node).map_or(true, |p| dom::is_element(&p));
    let next_ok = dom::next_sibling(node).map_or(true, |n| dom::is_element(&n));
    if prev_ok && next_ok && !state.in_html_pre {
        state.sep.push_src(&format!("<!--{body}-->"));
        return Ok(false);
    }

    update_incoming_constraints(state, node, parent, prev);
    let escaped = body.replace("-->", "--&gt;");
    state.emit(&format!("<!--{escaped}-->"), node);
    state.prev_node_unmodified = false;
    state.curr_node_unmodified = false;
    Ok(true)
}

fn serialize_element_node(
    state: &mut State,
    node: &Handle,
    parent: &Handle,
    prev: Option<&Handle>,
) -> Result<bool, SerializeError> {
    if dom::has_type_of(node, "mw:DiffMarker") {
        state.curr_node_unmodified = false;
        return Ok(false);
    }

    // Template-sibling suppression ends at the first node outside the group.
    if let Some(active) = state.active_template_id.clone() {
        if dom::get_attr(node, "about").as_deref() == Some(active.as_str()) {
            return Ok(false);
        }
        state.active_template_id = None;
    }

    update_incoming_constraints(state, node, parent, prev);

    state.curr_node_unmodified = false;
    if selser::try_source_reuse(state, node) {
        state.prev_node_unmodified = state.curr_node_unmodified;
        return Ok(true);
    }

    let kind = handlers::handler_for(state, node);
    let modified = state.node_modified(node);
    let saved_modified = state.in_modified_content;
    if modified {
        state.in_modified_content = true;
    }
    let result = handlers::handle(kind, state, node);
    state.in_modified_content = saved_modified;

    if let Err(err) = result {
        error!(node = %dom::node_name(node), %err, "tag handler failed");
        return Err(err);
    }
    state.prev_node_unmodified = state.curr_node_unmodified;
    Ok(true)
}

/// Merge the constraint pair between a node and its predecessor (previous
/// content sibling, or the parent when the node opens the child list).
fn update_incoming_constraints(
    state: &mut State,
    node: &Handle,
    parent: &Handle,
    prev: Option<&Handle>,
) {
    match prev {
        Some(prev) => {
            let a_spec = handlers::sep_after(state, prev, node);
            let b_spec = handlers::sep_before(state, node, prev);
            let a_end = handlers::dsr_end(state, prev);
            let b_start = handlers::dsr_start(state, node);
            state.update_constraints(prev, a_spec, a_end, b_spec, b_start);
        }
        None => {
            let a_spec = handlers::sep_first_child(state, parent, node);
            let b_spec = handlers::sep_before(state, node, parent);
            let a_end = handlers::dsr_inner_start(state, parent);
            let b_start = handlers::dsr_start(state, node);
            state.update_constraints(parent, a_spec, a_end, b_spec, b_start);
        }
    }
}

/// Run a full serialization of `body`.
pub(crate) fn run<'e>(
    env: &'e Env,
    body: &Handle,
    meta: &'e MetadataTable,
    tpl_attrs: HashMap<String, TplAttrs>,
    sink: Option<&'e mut dyn FnMut(&str)>,
    selser_mode: bool,
) -> Result<String, SerializeError> {
    if selser_mode && env.page_src.is_none() {
        return Err(SerializeError::MissingPageSource);
    }
    let mut state = State::new(env, meta, tpl_attrs, sink, selser_mode);
    serialize_children(&mut state, body, None)?;
    state.flush_trailing();
    Ok(state.out)
}
