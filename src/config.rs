// Wiki configuration consumed by the serializer.
//
// The serializer needs a small slice of site configuration: localized image
// option names, interpolated magic words (page properties), the URL protocol
// list used to recognize external links, and the sets of HTML tags that are
// meaningful in wikitext. The defaults match an English-language wiki;
// callers localize by replacing the tables.

use std::collections::HashMap;

/// Site configuration for one wiki.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// URL protocols recognized as external-link prefixes.
    pub protocols: Vec<String>,
    /// Localized spellings of valueless image options, keyed by canonical
    /// option name (`thumbnail` → `thumb`, `framed` → `frame`, …).
    pub simple_image_options: HashMap<String, String>,
    /// Localized `name=$1` patterns for image options that take a value
    /// (`link` → `link=$1`, `alt` → `alt=$1`, …).
    pub prefix_image_options: HashMap<String, String>,
    /// `NAME:$1` patterns for interpolated magic words, keyed by the
    /// page-property name carried on `<meta property="mw:PageProp/…">`.
    pub interpolated_magic_words: HashMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let simple = [
            ("thumbnail", "thumb"),
            ("framed", "frame"),
            ("frameless", "frameless"),
            ("border", "border"),
            ("left", "left"),
            ("right", "right"),
            ("center", "center"),
            ("none", "none"),
            ("baseline", "baseline"),
            ("sub", "sub"),
            ("super", "super"),
            ("top", "top"),
            ("text_top", "text-top"),
            ("middle", "middle"),
            ("bottom", "bottom"),
            ("text_bottom", "text-bottom"),
        ];
        let prefix = [
            ("link", "link=$1"),
            ("alt", "alt=$1"),
            ("page", "page=$1"),
            ("lang", "lang=$1"),
            ("upright", "upright=$1"),
            ("class", "class=$1"),
        ];
        let interpolated = [
            ("categorydefaultsort", "DEFAULTSORT:$1"),
            ("defaultsort", "DEFAULTSORT:$1"),
            ("displaytitle", "DISPLAYTITLE:$1"),
        ];
        Self {
            protocols: ["http://", "https://", "ftp://", "ftps://", "news://", "irc://", "mailto:", "//"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            simple_image_options: simple
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            prefix_image_options: prefix
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            interpolated_magic_words: interpolated
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl SiteConfig {
    /// Expand an interpolated magic word, e.g. `defaultsort` + `"Key"` →
    /// `{{DEFAULTSORT:Key}}`. Returns `None` for unknown names.
    pub fn replace_interpolated_magic_word(&self, name: &str, value: &str) -> Option<String> {
        self.interpolated_magic_words
            .get(name)
            .map(|pattern| format!("{{{{{}}}}}", pattern.replace("$1", value)))
    }

    /// Localized spelling of a valueless image option.
    pub fn simple_image_option(&self, canonical: &str) -> Option<&str> {
        self.simple_image_options.get(canonical).map(String::as_str)
    }

    /// Expand a valued image option, e.g. `alt` + `"text"` → `alt=text`.
    pub fn prefix_image_option(&self, canonical: &str, value: &str) -> Option<String> {
        self.prefix_image_options
            .get(canonical)
            .map(|pattern| pattern.replace("$1", value))
    }

    /// Canonical page title: underscores to spaces, first letter uppercased.
    pub fn normalize_title(&self, title: &str) -> String {
        let spaced = title.replace('_', " ");
        let trimmed = spaced.trim();
        let mut chars = trimmed.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Does `s` start with a recognized external-link protocol?
    pub(crate) fn starts_with_protocol(&self, s: &str) -> bool {
        self.protocols.iter().any(|p| {
            s.get(..p.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(p))
        })
    }
}

/// HTML tags that the wikitext parser treats as markup. A tag outside this
/// set renders literally, so text containing it needs no escaping.
pub(crate) fn is_wikitext_html_tag(name: &str) -> bool {
    matches!(
        name,
        "abbr" | "b" | "bdi" | "bdo" | "big" | "blockquote" | "br" | "caption" | "center"
            | "cite" | "code" | "data" | "dd" | "del" | "dfn" | "div" | "dl" | "dt" | "em"
            | "font" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "hr" | "i" | "ins" | "kbd"
            | "li" | "mark" | "ol" | "p" | "pre" | "q" | "rb" | "rp" | "rt" | "rtc" | "ruby"
            | "s" | "samp" | "small" | "span" | "strike" | "strong" | "sub" | "sup" | "table"
            | "td" | "th" | "time" | "tr" | "tt" | "u" | "ul" | "var" | "wbr" | "nowiki"
            | "includeonly" | "noinclude" | "onlyinclude"
    )
}

/// HTML void elements (no closing tag).
pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "param" | "source" | "track" | "wbr"
    )
}

/// Tags that open a PHP-parser block scope. Inside one of these, a line
/// start is not a wikitext start-of-line for single-line constructs.
pub(crate) fn is_block_scope_tag(name: &str) -> bool {
    matches!(
        name,
        "blockquote" | "caption" | "center" | "td" | "th" | "li" | "dd" | "dt" | "div" | "p"
    )
}
