// Selective serialization.
//
// An element whose subtree is untouched by the edit and whose source range
// is known round-trips as a verbatim slice of the original page. Leading
// and trailing separator runs are peeled off the slice next to modified
// neighbors so the separator engine can reconcile them with the synthetic
// output on that side.

use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;
use tracing::{error, warn};

use super::State;
use crate::dom;
use crate::metadata::Syntax;

static LEADING_SEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s:(?:\s|<!--.*?-->)+)").unwrap());

/// Try to emit `node` as a verbatim slice of the original source. Returns
/// true when the node was handled (including the emit-nothing error path
/// for a backwards source range).
pub(crate) fn try_source_reuse(state: &mut State, node: &Handle) -> bool {
    if !state.selser_mode || state.meta.diff_mark(node).is_some() {
        return false;
    }
    let dp = state.meta.dp(node);
    let Some(dsr) = dp.dsr else {
        return false;
    };
    let (Some(start), Some(end)) = (dsr.start, dsr.end) else {
        return false;
    };
    if start > end {
        error!(
            node = %dom::node_name(node),
            start, end, "backwards source range, emitting nothing"
        );
        return true;
    }
    let env = state.env;
    let Some(src) = env.page_src.as_deref() else {
        return false;
    };
    let Some(slice) = src.get(start as usize..end as usize) else {
        warn!(
            node = %dom::node_name(node),
            start, end, "source range outside the page source"
        );
        return false;
    };

    let is_indent_pre = dom::is_element_named(node, "pre")
        && !state.meta.dp(node).stx_is(Syntax::Html);

    // Peel separator runs off the edges that border modified content, so
    // the separator engine owns them.
    let mut body = slice;
    let prev_marked = dom::prev_non_sep_sibling(node)
        .is_some_and(|p| state.meta.diff_mark(&p).is_some());
    if prev_marked && !is_indent_pre {
        if let Some(m) = LEADING_SEP.find(body) {
            state.sep.push_src(m.as_str());
            body = &body[m.end()..];
        }
    }
    let next_marked = dom::next_non_sep_sibling(node)
        .is_some_and(|n| state.meta.diff_mark(&n).is_some());
    let (body, trailing) = if next_marked && !is_indent_pre {
        split_trailing_separator(body)
    } else {
        (body, "")
    };

    state.curr_node_unmodified = true;
    let body = body.to_string();
    let trailing = trailing.to_string();
    state.emit(&body, node);
    if !trailing.is_empty() {
        state.sep.push_src(&trailing);
    }

    if dom::has_type_of(node, "mw:Transclusion")
        || dom::has_type_of_prefix(node, "mw:Extension/")
    {
        if let Some(about) = dom::get_attr(node, "about") {
            state.active_template_id = Some(about);
        }
    }
    true
}

/// Split the trailing run of whitespace and comments off a source slice.
fn split_trailing_separator(s: &str) -> (&str, &str) {
    let mut end = s.len();
    loop {
        let trimmed = s[..end].trim_end();
        if trimmed.len() < end {
            end = trimmed.len();
            continue;
        }
        if s[..end].ends_with("-->") {
            if let Some(open) = s[..end].rfind("<!--") {
                if !s[open + 4..end - 3].contains("-->") {
                    end = open;
                    continue;
                }
            }
        }
        break;
    }
    (&s[..end], &s[end..])
}
