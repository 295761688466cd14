// Tag handlers and handler dispatch.
//
// One handler per tag identity, plus the provenance-driven handlers
// (template, extension, placeholder, entity) that take precedence over tag
// names, and the generic HTML fallback for anything that originated in
// HTML syntax. Separator constraints live next to the handlers as the
// `sep_*` functions the driver consults while hopping the tree.

use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;
use tracing::{trace, warn};

use super::escape::EscapeContext;
use super::separators::SepSpec;
use super::{attributes, links, serialize_children, State};
use crate::config;
use crate::dom;
use crate::error::SerializeError;
use crate::metadata::{DataMw, Syntax, TemplatePart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerKind {
    Heading(u8),
    Paragraph,
    List,
    ListItem,
    Table,
    TableRow,
    TableCell,
    TableHeaderCell,
    TableCaption,
    PassThrough,
    Quote,
    LineBreak,
    HorizontalRule,
    Pre,
    Meta,
    NowikiSpan,
    Figure,
    Anchor,
    GenericHtml,
    Template,
    Placeholder,
    Entity,
}

/// Handler dispatch: provenance markers first, then HTML syntax, then the
/// tag name.
pub(crate) fn handler_for(state: &State, node: &Handle) -> HandlerKind {
    if dom::has_type_of(node, "mw:Transclusion")
        || dom::has_type_of(node, "mw:Param")
        || dom::has_type_of_prefix(node, "mw:Extension/")
    {
        return HandlerKind::Template;
    }
    if dom::has_type_of_prefix(node, "mw:Placeholder") {
        return HandlerKind::Placeholder;
    }
    if dom::has_type_of(node, "mw:Entity") {
        return HandlerKind::Entity;
    }
    if dom::has_type_of_prefix(node, "mw:Image") {
        return HandlerKind::Figure;
    }
    // `<pre stx=html>` has its own handler (stripped-newline restoration),
    // so it must win over the generic HTML-syntax fallback.
    if dom::is_element_named(node, "pre") && state.meta.dp(node).stx_is(Syntax::Html) {
        return HandlerKind::Pre;
    }
    if in_html_syntax(state, node) {
        return HandlerKind::GenericHtml;
    }
    match dom::tag_name(node).unwrap_or("") {
        "h1" => HandlerKind::Heading(1),
        "h2" => HandlerKind::Heading(2),
        "h3" => HandlerKind::Heading(3),
        "h4" => HandlerKind::Heading(4),
        "h5" => HandlerKind::Heading(5),
        "h6" => HandlerKind::Heading(6),
        "p" => HandlerKind::Paragraph,
        "ul" | "ol" | "dl" => HandlerKind::List,
        "li" | "dt" | "dd" => HandlerKind::ListItem,
        "table" => HandlerKind::Table,
        "tbody" | "thead" | "tfoot" | "body" => HandlerKind::PassThrough,
        "tr" => HandlerKind::TableRow,
        "td" => HandlerKind::TableCell,
        "th" => HandlerKind::TableHeaderCell,
        "caption" => HandlerKind::TableCaption,
        "b" | "i" => HandlerKind::Quote,
        "br" => HandlerKind::LineBreak,
        "hr" => HandlerKind::HorizontalRule,
        "pre" => HandlerKind::Pre,
        "meta" => HandlerKind::Meta,
        "span" if dom::has_type_of(node, "mw:Nowiki") => HandlerKind::NowikiSpan,
        "figure" => HandlerKind::Figure,
        "a" | "link" => HandlerKind::Anchor,
        _ => HandlerKind::GenericHtml,
    }
}

/// Did this element (or any ancestor) originate in HTML syntax?
fn in_html_syntax(state: &State, node: &Handle) -> bool {
    let mut cur = Some(node.clone());
    while let Some(n) = cur {
        if !dom::is_element(&n) || dom::is_element_named(&n, "body") {
            return false;
        }
        if state.meta.dp(&n).stx_is(Syntax::Html) {
            return true;
        }
        cur = dom::parent(&n);
    }
    false
}

pub(crate) fn handle(
    kind: HandlerKind,
    state: &mut State,
    node: &Handle,
) -> Result<(), SerializeError> {
    match kind {
        HandlerKind::Heading(level) => heading(state, node, level),
        HandlerKind::Paragraph => serialize_children(state, node, None),
        HandlerKind::List => serialize_children(state, node, None),
        HandlerKind::ListItem => list_item(state, node),
        HandlerKind::Table => table(state, node),
        HandlerKind::TableRow => table_row(state, node),
        HandlerKind::TableCell => table_cell(state, node, false),
        HandlerKind::TableHeaderCell => table_cell(state, node, true),
        HandlerKind::TableCaption => table_caption(state, node),
        HandlerKind::PassThrough => serialize_children(state, node, None),
        HandlerKind::Quote => quote(state, node),
        HandlerKind::LineBreak => line_break(state, node),
        HandlerKind::HorizontalRule => horizontal_rule(state, node),
        HandlerKind::Pre => pre(state, node),
        HandlerKind::Meta => meta(state, node),
        HandlerKind::NowikiSpan => nowiki_span(state, node),
        HandlerKind::Figure => links::figure(state, node),
        HandlerKind::Anchor => links::anchor(state, node),
        HandlerKind::GenericHtml => generic_html(state, node),
        HandlerKind::Template => template(state, node),
        HandlerKind::Placeholder => placeholder(state, node),
        HandlerKind::Entity => entity(state, node),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn heading(state: &mut State, node: &Handle, level: u8) -> Result<(), SerializeError> {
    let marker = "=".repeat(level as usize);
    state.emit(&marker, node);
    if dom::first_non_sep_child(node).is_some() {
        serialize_children(state, node, Some(EscapeContext::Heading))?;
    } else {
        // An empty heading would collapse to a bare `==` rule of equals.
        state.emit("<nowiki/>", node);
    }
    state.emit(&marker, node);
    Ok(())
}

fn list_item(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node);
    if dom::is_element_named(node, "dd") && dp.stx_is(Syntax::Row) {
        // Single-line `;term:def` form.
        state.emit(":", node);
    } else {
        let first = dom::first_non_sep_child(node);
        let nested_list_first = first.as_ref().is_some_and(dom::is_list);
        if !nested_list_first {
            let bullets = list_bullets(state, node);
            state.emit(&bullets, node);
        }
    }
    serialize_children(state, node, Some(EscapeContext::ListItem))
}

/// Bullet prefix for a list item: the list-type characters of every
/// non-HTML list ancestor, innermost last.
fn list_bullets(state: &State, node: &Handle) -> String {
    let mut bullets = String::new();
    let mut cur = Some(node.clone());
    while let Some(n) = cur {
        if !dom::is_element(&n) || dom::is_element_named(&n, "body") {
            break;
        }
        if !(dom::is_list(&n) || dom::is_list_item(&n)) || state.meta.dp(&n).stx_is(Syntax::Html) {
            break;
        }
        let c = match dom::tag_name(&n) {
            Some("ul") => "*",
            Some("ol") => "#",
            Some("dt") => ";",
            Some("dd") => ":",
            _ => "",
        };
        bullets.insert_str(0, c);
        cur = dom::parent(&n);
    }
    bullets
}

fn table(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    let attrs = attributes::serialize_attributes(state, node);
    let start = dp.start_tag_src.as_deref().unwrap_or("{|");
    if attrs.is_empty() {
        state.emit(start, node);
    } else {
        state.emit(&format!("{start} {attrs}"), node);
    }
    serialize_children(state, node, None)?;
    state.emit(dp.end_tag_src.as_deref().unwrap_or("|}"), node);
    Ok(())
}

fn table_row(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    let mut prev = dom::prev_sibling(node);
    let mut has_prev_row = false;
    while let Some(p) = prev {
        if dom::is_element_named(&p, "tr") {
            has_prev_row = true;
            break;
        }
        prev = dom::prev_sibling(&p);
    }
    if has_prev_row || dp.start_tag_src.is_some() {
        let start = dp.start_tag_src.as_deref().unwrap_or("|-");
        let attrs = attributes::serialize_attributes(state, node);
        if attrs.is_empty() {
            state.emit(start, node);
        } else {
            state.emit(&format!("{start} {attrs}"), node);
        }
    }
    serialize_children(state, node, None)
}

fn table_cell(state: &mut State, node: &Handle, header: bool) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    let row_syntax = dp.stx_v == Some(Syntax::Row);
    let default = match (header, row_syntax) {
        (true, true) => "!!",
        (true, false) => "!",
        (false, true) => "||",
        (false, false) => "|",
    };
    let start = dp.start_tag_src.as_deref().unwrap_or(default);
    let attrs = attributes::serialize_attributes(state, node);
    if attrs.is_empty() {
        state.emit(start, node);
    } else {
        let sep = dp.attr_sep_src.as_deref().unwrap_or("|");
        state.emit(&format!("{start}{attrs}{sep}"), node);
    }
    let ctx = if header {
        EscapeContext::TableHeader
    } else {
        EscapeContext::TableCell
    };
    serialize_children(state, node, Some(ctx))
}

fn table_caption(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    let start = dp.start_tag_src.as_deref().unwrap_or("|+");
    let attrs = attributes::serialize_attributes(state, node);
    if attrs.is_empty() {
        state.emit(start, node);
    } else {
        let sep = dp.attr_sep_src.as_deref().unwrap_or("|");
        state.emit(&format!("{start}{attrs}{sep}"), node);
    }
    serialize_children(state, node, Some(EscapeContext::TableCell))
}

fn quote(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let marker = if dom::is_element_named(node, "b") {
        "'''"
    } else {
        "''"
    };
    if prev_ends_in_quote(node) {
        // `''x''''y''` is ambiguous; the empty nowiki splits the runs.
        state.emit("<nowiki/>", node);
    }
    state.emit(marker, node);
    serialize_children(state, node, Some(EscapeContext::Quote))?;
    state.emit(marker, node);
    Ok(())
}

/// Does the previous sibling's rightmost descendant chain end in a quote
/// element?
fn prev_ends_in_quote(node: &Handle) -> bool {
    let mut cur = dom::prev_sibling(node);
    while let Some(n) = cur {
        if matches!(dom::tag_name(&n), Some("b" | "i")) {
            return true;
        }
        if dom::is_element(&n) {
            cur = dom::last_child(&n);
        } else {
            return false;
        }
    }
    false
}

fn line_break(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node);
    let parent_is_p = dom::parent(node)
        .is_some_and(|p| dom::is_element_named(&p, "p"));
    if dp.stx_is(Syntax::Html) || !parent_is_p {
        state.emit("<br>", node);
    }
    // Otherwise nothing: the after-side constraint synthesizes the blank
    // line that re-parses into the break.
    Ok(())
}

fn horizontal_rule(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let extra = state.meta.dp(node).extra_dashes.unwrap_or(0) as usize;
    state.emit(&"-".repeat(4 + extra), node);
    Ok(())
}

fn pre(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    if dp.stx_is(Syntax::Html) {
        let attrs = attributes::serialize_attributes(state, node);
        if attrs.is_empty() {
            state.emit("<pre>", node);
        } else {
            state.emit(&format!("<pre {attrs}>"), node);
        }
        // The parser eats the newline right after `<pre>`; put it back.
        if dp.stripped_nl == Some(true) {
            state.emit("\n", node);
        }
        let saved = (state.in_html_pre, state.escape_text);
        state.in_html_pre = true;
        state.escape_text = false;
        let result = serialize_children(state, node, None);
        state.in_html_pre = saved.0;
        state.escape_text = saved.1;
        result?;
        state.emit("</pre>", node);
    } else {
        let saved = state.in_indent_pre;
        state.in_indent_pre = true;
        let content = state.capture(|st| serialize_children(st, node, None));
        state.in_indent_pre = saved;
        let indented = indent_pre_content(&content?);
        state.emit(&indented, node);
    }
    Ok(())
}

/// Prefix every line of an indent-pre body with a space, without breaking
/// multi-line comments apart.
fn indent_pre_content(content: &str) -> String {
    static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
    let spans: Vec<(usize, usize)> = COMMENT
        .find_iter(content)
        .map(|m| (m.start(), m.end()))
        .collect();
    let in_comment = |i: usize| spans.iter().any(|&(s, e)| i >= s && i < e);

    let mut out = String::with_capacity(content.len() + 8);
    out.push(' ');
    for (i, ch) in content.char_indices() {
        out.push(ch);
        if ch == '\n' && i + 1 < content.len() && !in_comment(i) {
            out.push(' ');
        }
    }
    out
}

fn meta(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let property = dom::get_attr(node, "property").unwrap_or_default();
    if property.starts_with("mw:objectAttr") {
        // Collected by the pre-pass; nothing to emit here.
        return Ok(());
    }
    let type_ofs = dom::type_ofs(node);
    let dp = state.meta.dp(node).clone();

    if type_ofs.iter().any(|t| t == "mw:tag") {
        let content = dom::get_attr(node, "content").unwrap_or_default();
        state.emit(&format!("<{content}>"), node);
        if content == "nowiki" {
            state.in_no_wiki = true;
        } else if content == "/nowiki" {
            state.in_no_wiki = false;
        }
        return Ok(());
    }

    if let Some(includes) = type_ofs
        .iter()
        .find_map(|t| t.strip_prefix("mw:Includes/"))
    {
        if let Some(src) = dp.src {
            state.emit(&src, node);
        } else {
            let (kind, end) = match includes.strip_suffix("/End") {
                Some(kind) => (kind, true),
                None => (includes, false),
            };
            let tag = kind.to_ascii_lowercase();
            let slash = if end { "/" } else { "" };
            state.emit(&format!("<{slash}{tag}>"), node);
        }
        return Ok(());
    }

    if type_ofs
        .iter()
        .any(|t| t == "mw:DiffMarker" || t == "mw:Separator")
    {
        return Ok(());
    }

    if let Some(name) = property.strip_prefix("mw:PageProp/") {
        let name = name.to_ascii_lowercase();
        if let Some(src) = dp.magic_src {
            state.emit(&src, node);
        } else if let Some(expanded) = state.env.conf.replace_interpolated_magic_word(
            &name,
            &dom::get_attr(node, "content").unwrap_or_default(),
        ) {
            state.emit(&expanded, node);
        } else {
            state.emit(&format!("__{}__", name.to_ascii_uppercase()), node);
        }
        return Ok(());
    }

    trace!(node = %dom::node_name(node), "ignoring unrecognized meta");
    Ok(())
}

fn nowiki_span(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    state.emit("<nowiki>", node);
    for child in dom::children(node) {
        if dom::is_element(&child) && dom::has_type_of(&child, "mw:Entity") {
            entity(state, &child)?;
        } else if let Some(text) = dom::text_value(&child) {
            state.emit(&text.replace("</nowiki>", "&lt;/nowiki&gt;"), &child);
        } else {
            let text = dom::text_content(&child);
            state.emit(&text.replace("</nowiki>", "&lt;/nowiki&gt;"), &child);
        }
    }
    state.emit("</nowiki>", node);
    Ok(())
}

fn template(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    if let Some(about) = dom::get_attr(node, "about") {
        state.active_template_id = Some(about);
    }
    let src = node_src(state, node);
    let is_extension = dom::has_type_of_prefix(node, "mw:Extension/");
    let reconstructed = if is_extension {
        state.meta.mw(node).and_then(reconstruct_extension)
    } else {
        state.meta.mw(node).and_then(reconstruct_template)
    };

    if is_extension {
        if let Some(src) = src {
            state.emit(&src, node);
        } else if let Some(src) = reconstructed {
            state.emit(&src, node);
        } else {
            warn!(node = %dom::node_name(node), "extension without source or data-mw");
        }
        return Ok(());
    }

    if state.rt_testing {
        if let Some(src) = &src {
            state.emit(src, node);
            return Ok(());
        }
    }
    if let Some(src) = reconstructed {
        state.emit(&src, node);
    } else if let Some(src) = src {
        state.emit(&src, node);
    } else {
        warn!(node = %dom::node_name(node), "transclusion without data-mw or source");
    }
    Ok(())
}

/// Recorded source of a node: the `src` field when present, otherwise a
/// slice of the page source by source range (the cleanup pass drops `src`
/// exactly when it is recoverable this way).
fn node_src(state: &State, node: &Handle) -> Option<String> {
    let dp = state.meta.dp(node);
    if let Some(src) = &dp.src {
        return Some(src.clone());
    }
    let dsr = dp.dsr?;
    let (start, end) = (dsr.start? as usize, dsr.end? as usize);
    state
        .env
        .page_src
        .as_deref()
        .and_then(|src| src.get(start..end))
        .map(str::to_string)
}

/// `{{ target | name=value | … }}`; positional parameters (numeric keys)
/// emit the value alone.
fn reconstruct_template(mw: &DataMw) -> Option<String> {
    let parts = mw.parts.as_ref()?;
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(text) => out.push_str(text),
            TemplatePart::Template(wrapper) => {
                let invocation = &wrapper.template;
                let target = invocation.target.wt.as_deref()?;
                out.push_str("{{");
                out.push_str(target);
                for (name, param) in &invocation.params {
                    let value = param.wt.as_deref().unwrap_or("");
                    out.push('|');
                    if !name.bytes().all(|b| b.is_ascii_digit()) {
                        out.push_str(name);
                        out.push('=');
                    }
                    out.push_str(value);
                }
                out.push_str("}}");
            }
        }
    }
    Some(out)
}

/// `<name attr="v">body</name>` from the extension's data-mw record.
fn reconstruct_extension(mw: &DataMw) -> Option<String> {
    let name = mw.name.as_deref()?;
    let mut out = format!("<{name}");
    if let Some(attrs) = &mw.attrs {
        for (k, v) in attrs {
            out.push_str(&format!(
                " {k}=\"{}\"",
                html_escape::encode_double_quoted_attribute(v)
            ));
        }
    }
    match mw.body.as_ref().and_then(|b| b.extsrc.as_deref()) {
        Some(body) => {
            out.push('>');
            out.push_str(body);
            out.push_str(&format!("</{name}>"));
        }
        None => out.push_str("/>"),
    }
    Some(out)
}

fn placeholder(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    match dp.src {
        Some(src) if !src.is_empty() && src.bytes().all(|b| b == b'\n') => {
            // Newline-only placeholders are separator material.
            state.sep.push_src(&src);
        }
        Some(src) => state.emit(&src, node),
        None => trace!(node = %dom::node_name(node), "placeholder without source"),
    }
    Ok(())
}

fn entity(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    let content = dom::text_content(node);
    match (dp.src, dp.src_content) {
        (Some(src), Some(src_content)) if src_content == content => state.emit(&src, node),
        (Some(src), None) => state.emit(&src, node),
        _ => state.emit(&content, node),
    }
    Ok(())
}

fn generic_html(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let name = dom::tag_name(node).unwrap_or("span").to_string();
    let dp = state.meta.dp(node).clone();
    let void = config::is_void_element(&name);
    let self_close = dp.self_close.unwrap_or(false);

    if !dp.auto_inserted_start() {
        let attrs = attributes::serialize_attributes(state, node);
        let mut open = format!("<{name}");
        if !attrs.is_empty() {
            open.push(' ');
            open.push_str(&attrs);
        }
        open.push_str(if self_close { "/>" } else { ">" });
        state.emit(&open, node);
    }
    if void || self_close {
        return Ok(());
    }

    let saved_php = state.in_php_block;
    if config::is_block_scope_tag(&name) {
        state.in_php_block = true;
    }
    let saved_pre = (state.in_html_pre, state.escape_text);
    if name == "pre" {
        state.in_html_pre = true;
        state.escape_text = false;
    }
    let result = serialize_children(state, node, None);
    state.in_php_block = saved_php;
    state.in_html_pre = saved_pre.0;
    state.escape_text = saved_pre.1;
    result?;

    if !dp.auto_inserted_end() {
        state.emit(&format!("</{name}>"), node);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Separator constraints
// ---------------------------------------------------------------------------

fn is_parent_of(other: &Handle, node: &Handle) -> bool {
    dom::parent(node).is_some_and(|p| dom::same_node(&p, other))
}

pub(crate) fn sep_before(state: &State, node: &Handle, other: &Handle) -> SepSpec {
    if !dom::is_element(node) {
        return SepSpec::NONE;
    }
    match dom::tag_name(node).unwrap_or("") {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => SepSpec::of(1, 2),
        "p" => p_before(state, node, other),
        "ul" | "ol" | "dl" => {
            let in_list_item = dom::parent(node).is_some_and(|p| dom::is_list_item(&p));
            if dom::is_text(other) && in_list_item {
                SepSpec::of(1, 1)
            } else {
                SepSpec::of(1, 2)
            }
        }
        "dd" if state.meta.dp(node).stx_is(Syntax::Row) => SepSpec::of(0, 0),
        "li" | "dt" | "dd" => SepSpec::of(1, 2),
        "table" | "tr" | "caption" => SepSpec::of(1, 2),
        "td" | "th" => {
            if state.meta.dp(node).stx_v == Some(Syntax::Row) {
                SepSpec {
                    min: Some(0),
                    max: Some(2),
                }
            } else {
                SepSpec::of(1, 2)
            }
        }
        "pre" | "hr" | "figure" => SepSpec::of(1, 2),
        _ => SepSpec::NONE,
    }
}

pub(crate) fn sep_after(state: &State, node: &Handle, other: &Handle) -> SepSpec {
    if !dom::is_element(node) {
        return SepSpec::NONE;
    }
    let other_is_parent = is_parent_of(other, node);
    match dom::tag_name(node).unwrap_or("") {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => SepSpec::of(1, 2),
        "p" => p_after(state, node, other, other_is_parent),
        "ul" | "ol" | "dl" | "li" | "dd" if !other_is_parent => wt_list_eol(state, node, other),
        "dt" if !other_is_parent => {
            if dom::is_element_named(other, "dd") && state.meta.dp(other).stx_is(Syntax::Row) {
                SepSpec::of(0, 0)
            } else {
                wt_list_eol(state, node, other)
            }
        }
        "table" | "hr" | "figure" => SepSpec::of(1, 2),
        "br" => {
            let dp = state.meta.dp(node);
            let parent_is_p =
                dom::parent(node).is_some_and(|p| dom::is_element_named(&p, "p"));
            if parent_is_p && !dp.stx_is(Syntax::Html) {
                SepSpec::of(2, 2)
            } else {
                SepSpec::NONE
            }
        }
        _ => SepSpec::NONE,
    }
}

fn p_before(_state: &State, node: &Handle, other: &Handle) -> SepSpec {
    if is_parent_of(other, node) {
        return match dom::tag_name(other).unwrap_or("") {
            "li" | "dt" | "dd" => SepSpec::of(0, 0),
            "td" | "body" => SepSpec {
                min: Some(0),
                max: Some(1),
            },
            _ => SepSpec::NONE,
        };
    }
    if dom::is_element_named(other, "p") || dom::is_text(other) {
        SepSpec::of(2, 2)
    } else {
        SepSpec::of(1, 2)
    }
}

fn p_after(_state: &State, node: &Handle, other: &Handle, other_is_parent: bool) -> SepSpec {
    if other_is_parent {
        return SepSpec::NONE;
    }
    let ends_with_br = dom::last_child(node)
        .is_some_and(|last| dom::is_element_named(&last, "br"));
    if dom::is_element_named(other, "p") && !ends_with_br {
        SepSpec::of(2, 2)
    } else {
        SepSpec::NONE
    }
}

/// Newlines owed after a list or list item, looking at what follows.
fn wt_list_eol(state: &State, node: &Handle, other: &Handle) -> SepSpec {
    if !dom::is_element(other) {
        return SepSpec::of(1, 2);
    }
    let other_dp = state.meta.dp(other);
    if other_dp.stx_is(Syntax::Html) || other_dp.src.is_some() {
        return SepSpec {
            min: Some(0),
            max: Some(2),
        };
    }
    if dom::is_list(node) && dom::is_list(other) && dom::tag_name(node) == dom::tag_name(other) {
        return SepSpec::of(2, 2);
    }
    if dom::is_list(other) || dom::is_list_item(other) {
        return SepSpec::of(1, 1);
    }
    SepSpec::of(1, 2)
}

pub(crate) fn sep_first_child(_state: &State, parent: &Handle, _child: &Handle) -> SepSpec {
    match dom::tag_name(parent).unwrap_or("") {
        "table" => SepSpec::of(1, 2),
        _ => SepSpec::NONE,
    }
}

pub(crate) fn sep_last_child(_state: &State, parent: &Handle, _child: &Handle) -> SepSpec {
    match dom::tag_name(parent).unwrap_or("") {
        "table" => SepSpec::of(1, 2),
        _ => SepSpec::NONE,
    }
}

// ---------------------------------------------------------------------------
// DSR helpers for separator source recovery
// ---------------------------------------------------------------------------

pub(crate) fn dsr_start(state: &State, node: &Handle) -> Option<u32> {
    if !dom::is_element(node) {
        return None;
    }
    let dsr = state.meta.dp(node).dsr?;
    if dsr.is_valid() {
        dsr.start
    } else {
        None
    }
}

pub(crate) fn dsr_end(state: &State, node: &Handle) -> Option<u32> {
    if !dom::is_element(node) {
        return None;
    }
    let dsr = state.meta.dp(node).dsr?;
    if dsr.is_valid() {
        dsr.end
    } else {
        None
    }
}

/// Offset just inside the opening markup of an element.
pub(crate) fn dsr_inner_start(state: &State, node: &Handle) -> Option<u32> {
    if !dom::is_element(node) {
        return None;
    }
    let dsr = state.meta.dp(node).dsr?;
    if dsr.is_valid() {
        Some(dsr.start? + dsr.open_width?)
    } else {
        None
    }
}

/// Offset just inside the closing markup of an element.
pub(crate) fn dsr_inner_end(state: &State, node: &Handle) -> Option<u32> {
    if !dom::is_element(node) {
        return None;
    }
    let dsr = state.meta.dp(node).dsr?;
    if dsr.is_valid() {
        dsr.end?.checked_sub(dsr.close_width?)
    } else {
        None
    }
}
