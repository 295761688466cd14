// Link and figure serialization.
//
// Anchors carry their link kind on `rel`; the round-trip fields on
// data-parsoid (tail, prefix, pipetrick, piped syntax) decide between the
// simple and piped wikilink forms. Figures walk their recorded option list
// and re-emit each image option from source where it is untouched.

use markup5ever_rcdom::Handle;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::warn;

use super::attributes::attribute_shadow_info;
use super::escape::EscapeContext;
use super::handlers::{self, HandlerKind};
use super::{serialize_children, State};
use crate::dom;
use crate::error::SerializeError;
use crate::metadata::Syntax;

/// Characters re-encoded in a modified external-link target; anything else
/// would terminate or corrupt the bracketed form.
const EXTLINK_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'[')
    .add(b']')
    .add(b'<')
    .add(b'>')
    .add(b'"');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Wiki,
    Category,
    Language,
    Interwiki,
    Ext,
    ExtUrl,
    ExtNumbered,
    ExtMagic,
    Image,
}

fn link_kind(rel: &str) -> Option<LinkKind> {
    for marker in rel.split_whitespace() {
        let kind = match marker {
            "mw:WikiLink" => Some(LinkKind::Wiki),
            "mw:WikiLink/Category" => Some(LinkKind::Category),
            "mw:WikiLink/Language" => Some(LinkKind::Language),
            "mw:WikiLink/Interwiki" => Some(LinkKind::Interwiki),
            "mw:ExtLink" => Some(LinkKind::Ext),
            "mw:ExtLink/URL" => Some(LinkKind::ExtUrl),
            "mw:ExtLink/Numbered" => Some(LinkKind::ExtNumbered),
            "mw:ExtLink/ISBN" | "mw:ExtLink/RFC" | "mw:ExtLink/PMID" => Some(LinkKind::ExtMagic),
            "mw:Image" => Some(LinkKind::Image),
            _ => None,
        };
        if kind.is_some() {
            return kind;
        }
    }
    None
}

/// Round-trip data shared by the wikilink and external-link paths.
struct LinkTarget {
    /// The string to emit as the target.
    value: String,
    /// Decoded display form, for content comparison.
    display: String,
    modified: bool,
}

fn link_target(state: &State, node: &Handle, attr: &str) -> LinkTarget {
    let raw = dom::get_attr(node, attr).unwrap_or_default();
    let dp = state.meta.dp(node);

    // A templated target is immutable; its recorded source wins.
    let templated = dom::get_attr(node, "about")
        .and_then(|a| state.tpl_attrs.get(&a).cloned())
        .and_then(|t| t.vs.get(attr).cloned());
    if let Some(src) = templated {
        let display = decode_target(&src);
        return LinkTarget {
            value: src,
            display,
            modified: false,
        };
    }

    let shadow = attribute_shadow_info(dp, attr, &raw);
    if shadow.fromsrc {
        let display = decode_target(&shadow.value);
        return LinkTarget {
            value: shadow.value,
            display,
            modified: shadow.modified,
        };
    }
    let display = decode_target(&shadow.value);
    LinkTarget {
        value: display.clone(),
        display,
        modified: shadow.modified,
    }
}

/// `./Foo_bar%27s` → `Foo bar's`.
fn decode_target(raw: &str) -> String {
    let stripped = raw.strip_prefix("./").unwrap_or(raw);
    let decoded = percent_decode_str(stripped).decode_utf8_lossy();
    decoded.replace('_', " ")
}

/// Content string when every child is a text node. An empty element yields
/// an empty string.
fn all_text_content(node: &Handle) -> Option<String> {
    if dom::children(node).iter().all(dom::is_text) {
        Some(dom::text_content(node))
    } else {
        None
    }
}

pub(crate) fn anchor(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let rel = dom::get_attr(node, "rel").unwrap_or_default();
    match link_kind(&rel) {
        Some(LinkKind::Category) => category_link(state, node),
        Some(LinkKind::Wiki | LinkKind::Language | LinkKind::Interwiki) => wikilink(state, node),
        Some(LinkKind::Image) => figure(state, node),
        Some(
            kind @ (LinkKind::Ext | LinkKind::ExtUrl | LinkKind::ExtNumbered | LinkKind::ExtMagic),
        ) => external_link(state, node, kind),
        None => {
            let href = dom::get_attr(node, "href").unwrap_or_default();
            if state.env.conf.starts_with_protocol(&href) {
                // Unknown anchors with an external target keep the
                // bracketed external form.
                external_link(state, node, LinkKind::Ext)
            } else {
                handlers::handle(HandlerKind::GenericHtml, state, node)
            }
        }
    }
}

fn category_link(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let target = link_target(state, node, "href");
    let (page, fragment_sort) = match target.display.split_once('#') {
        Some((page, sort)) => (page.to_string(), Some(sort.to_string())),
        None => (target.display.clone(), None),
    };

    // Templated sort keys are immutable: emit from recorded source only.
    let templated_sort = dom::get_attr(node, "about")
        .and_then(|a| state.tpl_attrs.get(&a).cloned())
        .and_then(|t| t.vs.get("mw:sortKey").cloned());

    let sort = templated_sort.or(fragment_sort);
    match sort {
        Some(sort) if !sort.is_empty() => {
            state.emit(&format!("[[{page}|{sort}]]"), node);
        }
        _ => state.emit(&format!("[[{page}]]"), node),
    }
    Ok(())
}

fn wikilink(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let dp = state.meta.dp(node).clone();
    let target = link_target(state, node, "href");
    let tail = dp.tail.clone().unwrap_or_default();
    let prefix = dp.prefix.clone().unwrap_or_default();
    let unmodified = !state.node_modified(node);
    let content_text = all_text_content(node);

    // Pipe trick: `[[Foo (bar)|]]` survives as long as nothing changed.
    if dp.pipetrick.unwrap_or(false) && unmodified {
        state.emit(&format!("{prefix}[[{}|]]{tail}", target.value), node);
        return Ok(());
    }

    let keep_piped = dp.stx_is(Syntax::Piped) && unmodified;
    if !keep_piped {
        if let Some(text) = &content_text {
            // `[[Foo]]s` absorbs a matching tail back into the link.
            let base = if !tail.is_empty() && text.ends_with(tail.as_str()) {
                &text[..text.len() - tail.len()]
            } else if tail.is_empty() {
                text.as_str()
            } else {
                ""
            };
            if !base.is_empty() && titles_match(state, base, &target.display) {
                state.emit(&format!("{prefix}[[{}]]{tail}", target.value), node);
                return Ok(());
            }
        }
    }

    // Piped form.
    let content = match content_text {
        Some(text) if !text.is_empty() => {
            super::escape::escape_wikitext_in_context(state, &text, EscapeContext::Link, node)
        }
        _ => state.capture(|st| {
            st.on_sol = false;
            serialize_children(st, node, Some(EscapeContext::Link))
        })?,
    };
    // An empty pipe would invite the pre-save pipe trick.
    let content = if content.is_empty() {
        "<nowiki/>".to_string()
    } else {
        content
    };
    state.emit(
        &format!("{prefix}[[{}|{content}]]{tail}", target.value),
        node,
    );
    Ok(())
}

fn titles_match(state: &State, a: &str, b: &str) -> bool {
    let conf = &state.env.conf;
    conf.normalize_title(a) == conf.normalize_title(b)
}

fn external_link(state: &mut State, node: &Handle, kind: LinkKind) -> Result<(), SerializeError> {
    let target = link_target(state, node, "href");
    let url = if target.modified {
        utf8_percent_encode(&target.value, EXTLINK_SET).to_string()
    } else {
        target.value.clone()
    };
    let content_text = all_text_content(node);

    match kind {
        LinkKind::ExtUrl => {
            match &content_text {
                // The text still is the URL: bare autolink form.
                Some(text) if text == &url || text == &target.value => state.emit(&url, node),
                Some(text) if !text.is_empty() => {
                    state.emit(&format!("[{url} {text}]"), node);
                }
                _ => state.emit(&url, node),
            }
            Ok(())
        }
        LinkKind::ExtNumbered => {
            state.emit(&format!("[{url}]"), node);
            Ok(())
        }
        LinkKind::ExtMagic => {
            // `RFC 123` / `ISBN …`: the visible text is the whole link.
            state.emit(&dom::text_content(node), node);
            Ok(())
        }
        _ => {
            let content = match content_text {
                Some(text) if !text.is_empty() => super::escape::escape_wikitext_in_context(
                    state,
                    &text,
                    EscapeContext::Link,
                    node,
                ),
                Some(_) => String::new(),
                None => state.capture(|st| {
                    st.on_sol = false;
                    serialize_children(st, node, Some(EscapeContext::Link))
                })?,
            };
            if content.is_empty() {
                state.emit(&format!("[{url}]"), node);
            } else {
                state.emit(&format!("[{url} {content}]"), node);
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Figures and inline images
// ---------------------------------------------------------------------------

fn find_img(node: &Handle) -> Option<Handle> {
    if dom::is_element_named(node, "img") {
        return Some(node.clone());
    }
    for child in dom::children(node) {
        if let Some(img) = find_img(&child) {
            return Some(img);
        }
    }
    None
}

fn find_caption(node: &Handle) -> Option<Handle> {
    dom::children(node)
        .into_iter()
        .find(|c| dom::is_element_named(c, "figcaption"))
}

pub(crate) fn figure(state: &mut State, node: &Handle) -> Result<(), SerializeError> {
    let Some(img) = find_img(node) else {
        warn!(node = %dom::node_name(node), "image without an <img>, emitting nothing");
        return Ok(());
    };
    let resource = dom::get_attr(&img, "resource")
        .or_else(|| dom::get_attr(&img, "src"))
        .unwrap_or_default();
    let target = decode_target(&resource);
    let caption = find_caption(node);
    let dp = state.meta.dp(node).clone();
    let img_dp = state.meta.dp(&img).clone();

    let width = dom::get_attr(&img, "width");
    let height = dom::get_attr(&img, "height");
    let size_modified = width
        .as_deref()
        .map(|w| attribute_shadow_info(&img_dp, "width", w).modified)
        .unwrap_or(false)
        || height
            .as_deref()
            .map(|h| attribute_shadow_info(&img_dp, "height", h).modified)
            .unwrap_or(false);

    let mut opts: Vec<String> = Vec::new();
    let mut caption_emitted = false;
    let mut size_emitted = false;

    for opt in dp.option_list.clone().unwrap_or_default() {
        match opt.ck.as_str() {
            "width" | "height" => {
                if size_emitted {
                    continue;
                }
                size_emitted = true;
                if size_modified {
                    opts.push(joint_size(width.as_deref(), height.as_deref()));
                } else if !opt.ak.is_empty() {
                    opts.push(opt.ak.clone());
                } else {
                    opts.push(joint_size(width.as_deref(), height.as_deref()));
                }
            }
            "caption" => {
                caption_emitted = true;
                if let Some(caption) = &caption {
                    opts.push(serialize_caption(state, caption)?);
                } else if !opt.ak.is_empty() {
                    opts.push(opt.ak.clone());
                }
            }
            "alt" | "link" => {
                let live = match opt.ck.as_str() {
                    "alt" => dom::get_attr(&img, "alt").unwrap_or_default(),
                    _ => dom::parent(&img)
                        .and_then(|a| dom::get_attr(&a, "href"))
                        .map(|h| decode_target(&h))
                        .unwrap_or_default(),
                };
                let recorded = opt.ak.split_once('=').map(|(_, v)| v).unwrap_or("");
                if recorded == live && !opt.ak.is_empty() {
                    opts.push(opt.ak.clone());
                } else if let Some(expanded) =
                    state.env.conf.prefix_image_option(&opt.ck, &live)
                {
                    opts.push(expanded);
                }
            }
            ck => {
                if !opt.ak.is_empty()
                    && (state.env.conf.simple_image_option(ck).is_some()
                        || state.env.conf.prefix_image_options.contains_key(ck))
                {
                    opts.push(opt.ak.clone());
                } else if let Some(localized) = state.env.conf.simple_image_option(ck) {
                    opts.push(localized.to_string());
                } else {
                    warn!(option = ck, "unrecognized image option, skipping");
                }
            }
        }
    }

    if !caption_emitted {
        if let Some(caption) = &caption {
            let text = serialize_caption(state, caption)?;
            if !text.is_empty() {
                opts.push(text);
            }
        }
    }

    let mut out = format!("[[{target}");
    for opt in &opts {
        out.push('|');
        out.push_str(opt);
    }
    out.push_str("]]");
    state.emit(&out, node);
    Ok(())
}

fn serialize_caption(state: &mut State, caption: &Handle) -> Result<String, SerializeError> {
    state.capture(|st| {
        st.on_sol = false;
        serialize_children(st, caption, Some(EscapeContext::Link))
    })
}

fn joint_size(width: Option<&str>, height: Option<&str>) -> String {
    match (width, height) {
        (Some(w), Some(h)) => format!("{w}x{h}px"),
        (Some(w), None) => format!("{w}px"),
        (None, Some(h)) => format!("x{h}px"),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_decoding() {
        assert_eq!(decode_target("./Foo_bar"), "Foo bar");
        assert_eq!(decode_target("./Foo%27s_law"), "Foo's law");
        assert_eq!(decode_target("Plain"), "Plain");
    }

    #[test]
    fn rel_parsing() {
        assert_eq!(link_kind("mw:WikiLink"), Some(LinkKind::Wiki));
        assert_eq!(link_kind("mw:WikiLink/Category"), Some(LinkKind::Category));
        assert_eq!(link_kind("mw:ExtLink/RFC"), Some(LinkKind::ExtMagic));
        assert_eq!(link_kind("nofollow"), None);
    }

    #[test]
    fn joint_size_forms() {
        assert_eq!(joint_size(Some("200"), Some("100")), "200x100px");
        assert_eq!(joint_size(Some("200"), None), "200px");
        assert_eq!(joint_size(None, Some("100")), "x100px");
    }
}
