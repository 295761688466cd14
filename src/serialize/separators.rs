// Separator engine.
//
// Between any two adjacent nodes the serializer owes exactly one separator:
// a run of whitespace and comments satisfying the newline constraints both
// sides declared. Constraints accumulate across topology hops (last child →
// parent → next sibling → first child) until the next emission flushes
// them; the flush reconstructs the separator from accumulated source when
// possible and synthesizes newlines otherwise.

use std::sync::LazyLock;

use markup5ever_rcdom::Handle;
use regex::Regex;
use tracing::warn;

/// One side's newline requirements for a separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SepSpec {
    pub min: Option<u8>,
    pub max: Option<u8>,
}

impl SepSpec {
    pub(crate) const NONE: SepSpec = SepSpec { min: None, max: None };

    pub(crate) const fn of(min: u8, max: u8) -> SepSpec {
        SepSpec {
            min: Some(min),
            max: Some(max),
        }
    }
}

/// Merged constraints for the pending separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Constraints {
    pub min: Option<u8>,
    pub max: u8,
    /// The left-hand side of the first merged pair; consulted by the
    /// start-of-output adjustment.
    pub a: SepSpec,
    /// The right-hand side of the last merged pair.
    pub b: SepSpec,
}

/// Pending separator between the last emitted node and the next one.
#[derive(Default)]
pub(crate) struct Separator {
    pub constraints: Option<Constraints>,
    /// Whitespace/comments accumulated from separator-only DOM nodes.
    pub src: Option<String>,
    pub last_source_node: Option<Handle>,
    /// Source offsets bracketing the gap between the two nodes, when both
    /// sides have usable DSR. Left is the end of the emitted side, right
    /// the start of the upcoming side.
    pub gap_left: Option<u32>,
    pub gap_right: Option<u32>,
}

impl Separator {
    pub(crate) fn push_src(&mut self, text: &str) {
        self.src.get_or_insert_with(String::new).push_str(text);
    }
}

/// Merge a new `(after-ish, before-ish)` constraint pair into the pending
/// constraints. `min` takes the larger requirement, `max` the smaller
/// allowance; on conflict the newer side wins.
pub(crate) fn merge_pair(existing: Option<Constraints>, a: SepSpec, b: SepSpec) -> Constraints {
    let pair = combine(a, b);
    let Some(prev) = existing else {
        return pair;
    };
    let min = opt_max(prev.min, pair.min);
    let max = prev.max.min(pair.max);
    let mut merged = Constraints {
        min,
        max,
        a: prev.a,
        b: pair.b,
    };
    if let Some(m) = merged.min {
        if m > merged.max {
            warn!(
                min = m,
                max = merged.max,
                "conflicting separator constraints, newer side wins"
            );
            merged.max = pair.max;
            merged.min = Some(pair.min.unwrap_or(0).min(pair.max));
        }
    }
    merged
}

fn combine(a: SepSpec, b: SepSpec) -> Constraints {
    let min = opt_max(a.min, b.min);
    let max = a.max.unwrap_or(2).min(b.max.unwrap_or(2));
    let mut cons = Constraints { min, max, a, b };
    if let Some(m) = cons.min {
        if m > cons.max {
            warn!(
                min = m,
                max = cons.max,
                "conflicting separator constraints, newer side wins"
            );
            let max = b.max.unwrap_or(2);
            cons.min = Some(b.min.unwrap_or(0).min(max));
            cons.max = max;
        }
    }
    cons
}

fn opt_max(a: Option<u8>, b: Option<u8>) -> Option<u8> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

static SEP_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s:\s|<!--.*?-->)*$").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// A separator is a run of whitespace and complete comments, nothing else.
pub(crate) fn is_valid_separator(s: &str) -> bool {
    SEP_GRAMMAR.is_match(s)
}

/// Elements before which trailing line-start whitespace is harmless (the
/// PHP parser cannot open an indent-pre in front of them).
fn is_pre_safe(tag: Option<&str>) -> bool {
    matches!(
        tag,
        Some("br" | "table" | "tbody" | "caption" | "tr" | "td" | "th")
    )
}

/// Newlines that count toward separator constraints: newlines inside
/// comment bodies never count, and a line holding a comment is absorbed
/// together with its terminating newline by the wiki parser, so that
/// newline does not count either.
pub(crate) fn count_newlines(sep: &str) -> usize {
    let bytes = sep.as_bytes();
    let mut i = 0;
    let mut count = 0;
    let mut line_has_comment = false;
    while i < bytes.len() {
        if sep[i..].starts_with("<!--") {
            line_has_comment = true;
            i = match sep[i..].find("-->") {
                Some(end) => i + end + 3,
                None => bytes.len(),
            };
        } else if bytes[i] == b'\n' {
            if !line_has_comment {
                count += 1;
            }
            line_has_comment = false;
            i += 1;
        } else {
            i += 1;
        }
    }
    count
}

/// Materialize the pending separator: start from the candidate source run,
/// then pad or trim newlines to fit the constraints.
pub(crate) fn make_separator(
    src: &str,
    cons: &Constraints,
    at_start_of_output: bool,
    next_tag: Option<&str>,
) -> String {
    let mut sep = src.to_string();
    let mut required = cons.min.unwrap_or(0) as usize;
    if at_start_of_output && cons.a.min.is_none() && required > 0 {
        required -= 1;
    }

    let mut count = count_newlines(&sep);
    while count < required {
        sep.push('\n');
        count += 1;
    }
    if count > cons.max as usize {
        sep = trim_newlines(&sep, count - cons.max as usize);
    }

    // A separator ending in `\n` + spaces would hand the next line a leading
    // space and open an indent-pre.
    if required > 0 && !is_pre_safe(next_tag) && sep.contains('\n') {
        let trimmed = sep.trim_end_matches([' ', '\t']);
        if trimmed.ends_with('\n') {
            sep.truncate(trimmed.len());
        }
    }

    sep
}

/// Remove `excess` newline characters, right to left, skipping newlines
/// inside comment bodies.
fn trim_newlines(sep: &str, excess: usize) -> String {
    let comment_spans: Vec<(usize, usize)> = COMMENT
        .find_iter(sep)
        .map(|m| (m.start(), m.end()))
        .collect();
    let in_comment =
        |i: usize| comment_spans.iter().any(|&(start, end)| i >= start && i < end);

    let mut drop: Vec<usize> = sep
        .char_indices()
        .filter(|&(i, c)| c == '\n' && !in_comment(i))
        .map(|(i, _)| i)
        .collect();
    let keep_from = drop.len().saturating_sub(excess);
    drop.drain(..keep_from);

    sep.char_indices()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, c)| c)
        .collect()
}
