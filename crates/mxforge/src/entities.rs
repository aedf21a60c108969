use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Escapes the five standard XML entities (`& < > " '`).
///
/// Used for every label, value and attribute the engine writes; apostrophes
/// become `&#39;` so the output is safe in both attribute quoting styles.
pub fn escape_xml(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Removes exactly one escaping level from the four common entities.
///
/// `&amp;` is handled last so `&amp;lt;` becomes `&lt;` and not `<`; applying
/// [`escape_xml`] afterwards therefore never compounds escaping across
/// repeated edits of the same cell.
pub fn unescape_once(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    let s = input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    Cow::Owned(s)
}

fn markup_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[a-zA-Z][^<>]*>").expect("valid regex"))
}

fn break_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"))
}

/// True when the text carries markup-like tags (`<b>`, `<br/>`, `<font …>`).
pub fn has_markup_tags(input: &str) -> bool {
    markup_tag_regex().is_match(input)
}

/// True when the text carries pre-escaped markup (`&lt;` equivalents).
pub fn has_escaped_markup(input: &str) -> bool {
    input.contains("&lt;")
}

/// Normalizes every line break and `<br>` spelling to the single `<br>` token
/// the renderer understands inside markup labels.
pub fn normalize_breaks(input: &str) -> String {
    let unified = break_tag_regex().replace_all(input, "<br>");
    unified.replace("\r\n", "<br>").replace(['\r', '\n'], "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_the_five_entities() {
        assert_eq!(
            escape_xml(r#"a<b & c>"d'"#),
            "a&lt;b &amp; c&gt;&quot;d&#39;"
        );
        assert!(matches!(escape_xml("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn unescape_once_removes_a_single_level() {
        assert_eq!(unescape_once("&lt;b&gt;hi&lt;/b&gt;"), "<b>hi</b>");
        // Double-escaped input loses exactly one level.
        assert_eq!(unescape_once("&amp;lt;b&amp;gt;"), "&lt;b&gt;");
        assert_eq!(unescape_once("tom &amp; jerry"), "tom & jerry");
    }

    #[test]
    fn escape_after_unescape_is_idempotent() {
        let stored = escape_xml(&unescape_once("<b>x & y</b>")).into_owned();
        let again = escape_xml(&unescape_once(&stored)).into_owned();
        assert_eq!(stored, again);
    }

    #[test]
    fn markup_probe_matches_tags_not_comparisons() {
        assert!(has_markup_tags("<b>bold</b>"));
        assert!(has_markup_tags("line<br/>break"));
        assert!(!has_markup_tags("3 < 4 and 5 > 4"));
    }

    #[test]
    fn break_normalization_unifies_spellings() {
        assert_eq!(normalize_breaks("a\nb\r\nc<BR/>d<br >e"), "a<br>b<br>c<br>d<br>e");
        assert_eq!(normalize_breaks("x<br/>y"), "x<br>y");
    }
}
