// Attribute emitter.
//
// Serializes element attributes back to wiki attribute syntax. Values that
// came out of a template are re-emitted from their recorded wiki source;
// everything else goes through the shadow record so the original,
// unsanitized spelling wins over the sanitizer's output.

use markup5ever_rcdom::Handle;

use super::State;
use crate::dom;
use crate::metadata::DataParsoid;

/// The original value of an attribute, as the source had it.
pub(crate) struct ShadowInfo {
    pub value: String,
    pub modified: bool,
    pub fromsrc: bool,
}

/// Compare the live attribute value against the sanitizer-accepted value
/// recorded in `dp.a`; when they agree, the source spelling in `dp.sa` is
/// authoritative.
pub(crate) fn attribute_shadow_info(dp: &DataParsoid, name: &str, current: &str) -> ShadowInfo {
    let accepted = dp.a.as_ref().and_then(|a| a.get(name));
    match accepted {
        None => ShadowInfo {
            value: current.to_string(),
            modified: false,
            fromsrc: false,
        },
        Some(accepted) => {
            if accepted.as_deref() == Some(current) {
                match dp.sa.as_ref().and_then(|sa| sa.get(name)) {
                    Some(source) => ShadowInfo {
                        value: source.clone(),
                        modified: false,
                        fromsrc: true,
                    },
                    None => ShadowInfo {
                        value: current.to_string(),
                        modified: false,
                        fromsrc: false,
                    },
                }
            } else {
                ShadowInfo {
                    value: current.to_string(),
                    modified: true,
                    fromsrc: false,
                }
            }
        }
    }
}

/// Attributes the serializer owns; never emitted back.
fn is_reserved_attribute(name: &str) -> bool {
    name == "about"
        || name == "typeof"
        || name == "data-mw"
        || name == "ve-changed"
        || name.starts_with("data-parsoid")
}

/// Serialize the attributes of `node` to wiki attribute syntax, space
/// separated, without a leading space.
pub(crate) fn serialize_attributes(state: &State, node: &Handle) -> String {
    let dp = state.meta.dp(node);
    let about = dom::get_attr(node, "about");
    let tpl = about.as_deref().and_then(|a| state.tpl_attrs.get(a));
    let expanded = dom::has_type_of_prefix(node, "mw:ExpandedAttrs");

    let mut parts: Vec<String> = Vec::new();
    let mut live_names: Vec<String> = Vec::new();

    for (name, value) in dom::attributes(node) {
        if is_reserved_attribute(&name) {
            continue;
        }
        live_names.push(name.clone());

        if expanded {
            if let Some(src) = tpl.and_then(|t| t.kvs.get(&name)) {
                parts.push(src.clone());
                continue;
            }
        }

        let templated_key = tpl.and_then(|t| t.ks.get(&name));
        let templated_val = tpl.and_then(|t| t.vs.get(&name));
        if templated_key.is_some() || templated_val.is_some() {
            let k = templated_key.cloned().unwrap_or_else(|| name.clone());
            match templated_val {
                Some(v) => parts.push(format!("{k}=\"{v}\"")),
                None if value.is_empty() => parts.push(k),
                None => parts.push(format!(
                    "{k}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(&value)
                )),
            }
            continue;
        }

        let shadow = attribute_shadow_info(dp, &name, &value);
        if shadow.value.is_empty() {
            parts.push(name);
            continue;
        }
        let emitted = if shadow.fromsrc {
            shadow.value
        } else {
            html_escape::encode_double_quoted_attribute(&shadow.value).to_string()
        };
        parts.push(format!("{name}=\"{emitted}\""));
    }

    // Reinstate attributes the HTML sanitizer dropped: anything recorded in
    // `dp.a` but absent from the live attribute list.
    if let Some(a) = dp.a.as_ref() {
        let mut dropped: Vec<&String> = a
            .keys()
            .filter(|k| !live_names.iter().any(|n| n == *k) && !is_reserved_attribute(k))
            .collect();
        dropped.sort();
        for name in dropped {
            if let Some(source) = dp.sa.as_ref().and_then(|sa| sa.get(name)) {
                if source.is_empty() {
                    parts.push(name.clone());
                } else {
                    parts.push(format!("{name}=\"{source}\""));
                }
            }
        }
    }

    parts.join(" ")
}
