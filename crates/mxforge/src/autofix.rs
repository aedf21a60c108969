//! Auto-fix repair engine: an ordered registry of independent textual repair
//! rules plus a bounded last-resort "drop the offending block" loop.
//!
//! Each rule is a pure `fn(&str) -> Option<String>` returning `Some` only
//! when it changed something. Rules run once, in declared order; the order is
//! significant because later rules assume earlier normalizations (bare
//! ampersands are escaped before entity un-mangling, tags are re-cased before
//! foreign tags are stripped).

use crate::canonical::open_tag_stack;
use crate::dom::{QuickXmlCodec, XmlCodec, canonical_tag};
use crate::error::StructuralViolation;
use crate::validate::validate_cell_structure;
use regex::{Captures, NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Iteration cap for the drop-offending-block loop.
const MAX_DROP_ITERATIONS: usize = 10;

/// One named textual repair rule.
pub struct FixRule {
    name: &'static str,
    description: &'static str,
    apply: fn(&str) -> Option<String>,
}

impl FixRule {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Runs the rule; `Some` iff the text changed.
    pub fn apply(&self, text: &str) -> Option<String> {
        (self.apply)(text)
    }
}

/// The repair rules in their fixed execution order.
pub fn repair_rules() -> &'static [FixRule] {
    static RULES: &[FixRule] = &[
        FixRule {
            name: "unescape-quote-artifacts",
            description: "unescaped embedded quote artifacts",
            apply: unescape_quote_artifacts,
        },
        FixRule {
            name: "strip-code-fence",
            description: "stripped wrapping code fence",
            apply: strip_code_fence,
        },
        FixRule {
            name: "drop-leading-prose",
            description: "dropped prose before the document root",
            apply: drop_leading_prose,
        },
        FixRule {
            name: "dedup-structural-attrs",
            description: "removed duplicate structural attributes",
            apply: remove_duplicate_structural_attrs,
        },
        FixRule {
            name: "escape-bare-ampersands",
            description: "escaped bare ampersands",
            apply: escape_bare_ampersands,
        },
        FixRule {
            name: "unmangle-double-escapes",
            description: "unmangled double-escaped entities",
            apply: unmangle_double_escaped_entities,
        },
        FixRule {
            name: "quote-bare-attr-values",
            description: "quoted bare attribute values",
            apply: quote_bare_attr_values,
        },
        FixRule {
            name: "fix-self-closing-end-tags",
            description: "fixed malformed self-closing tags",
            apply: fix_self_closing_end_tags,
        },
        FixRule {
            name: "space-adjacent-attrs",
            description: "inserted missing spaces between attributes",
            apply: insert_missing_attr_spaces,
        },
        FixRule {
            name: "unquote-style-colors",
            description: "removed spurious quotes around style colors",
            apply: unquote_style_colors,
        },
        FixRule {
            name: "escape-lt-in-attrs",
            description: "escaped bare '<' inside attribute values",
            apply: escape_lt_in_attr_values,
        },
        FixRule {
            name: "drop-invalid-char-refs",
            description: "dropped invalid numeric character references",
            apply: drop_invalid_numeric_refs,
        },
        FixRule {
            name: "collapse-comment-hyphens",
            description: "collapsed double hyphens inside comments",
            apply: collapse_comment_hyphens,
        },
        FixRule {
            name: "normalize-tag-casing",
            description: "normalized mis-cased tag names",
            apply: normalize_tag_casing,
        },
        FixRule {
            name: "strip-foreign-tags",
            description: "stripped tags outside the dialect vocabulary",
            apply: strip_foreign_tags,
        },
        FixRule {
            name: "close-open-tags",
            description: "closed tags left open at end of document",
            apply: close_open_tags,
        },
        FixRule {
            name: "remove-excess-closing-tags",
            description: "removed excess closing tags",
            apply: remove_excess_closing_tags,
        },
        FixRule {
            name: "trim-trailing-content",
            description: "trimmed trailing content after the document end",
            apply: trim_trailing_content,
        },
        FixRule {
            name: "collapse-duplicate-cell-opens",
            description: "collapsed duplicated consecutive cell opens",
            apply: collapse_duplicate_cell_opens,
        },
        FixRule {
            name: "flatten-nested-cells",
            description: "flattened nested cell blocks",
            apply: flatten_nested_cells,
        },
        FixRule {
            name: "rename-duplicate-ids",
            description: "renamed duplicate cell ids",
            apply: rename_duplicate_ids,
        },
        FixRule {
            name: "synthesize-empty-ids",
            description: "synthesized ids for cells with empty ids",
            apply: synthesize_empty_ids,
        },
    ];
    RULES
}

/// Outcome of `validate_and_fix`: final validity, the remaining violation if
/// any, the repaired candidate iff any rule fired, and the ordered fix
/// descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixReport {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<StructuralViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_xml: Option<String>,
    #[serde(default)]
    pub applied_fixes: Vec<String>,
}

/// Validates once; if the document is invalid, runs the repair pipeline
/// exactly once and re-validates the candidate.
pub fn validate_and_fix(xml: &str) -> FixReport {
    if validate_cell_structure(xml).is_none() {
        return FixReport {
            valid: true,
            violation: None,
            fixed_xml: None,
            applied_fixes: Vec::new(),
        };
    }
    let (candidate, applied) = run_repair_pipeline(xml);
    let violation = validate_cell_structure(&candidate);
    FixReport {
        valid: violation.is_none(),
        violation,
        fixed_xml: (!applied.is_empty()).then_some(candidate),
        applied_fixes: applied,
    }
}

/// Runs every rule once in order, then the bounded drop-block loop. Never
/// fails; the caller re-validates the result.
pub fn run_repair_pipeline(xml: &str) -> (String, Vec<String>) {
    let mut text = xml.to_owned();
    let mut applied = Vec::new();
    for rule in repair_rules() {
        if let Some(fixed) = rule.apply(&text) {
            debug!(rule = rule.name, "repair rule fired");
            applied.push(rule.description.to_owned());
            text = fixed;
        }
    }
    let text = drop_offending_blocks(text, &mut applied);
    (text, applied)
}

/// While the document still fails to parse, deletes the cell block enclosing
/// the reported error position. Hard-capped; exceeding the cap leaves the
/// text as-is for the caller to report as still invalid.
fn drop_offending_blocks(mut text: String, applied: &mut Vec<String>) -> String {
    for _ in 0..MAX_DROP_ITERATIONS {
        let err = match QuickXmlCodec.parse(&text) {
            Ok(_) => return text,
            Err(err) => err,
        };
        let Some(shorter) = drop_block_at_line(&text, err.line) else {
            return text;
        };
        warn!(line = err.line, "dropping unparseable cell block");
        applied.push(format!(
            "dropped an unparseable cell block near line {}",
            err.line
        ));
        text = shorter;
    }
    text
}

/// Removes the cell block enclosing the given 1-based line, walking back to
/// the nearest cell-open tag and forward to its close or the next cell open.
fn drop_block_at_line(text: &str, line: usize) -> Option<String> {
    let offset = byte_offset_of_line(text, line);
    let start = text[..offset.min(text.len())].rfind("<mxCell")?;

    let after_open = &text[start..];
    let end = if let Some(gt) = after_open.find('>')
        && after_open[..gt + 1].ends_with("/>")
    {
        start + gt + 1
    } else if let Some(close) = after_open.find("</mxCell>") {
        start + close + "</mxCell>".len()
    } else if let Some(next_open) = after_open[1..].find("<mxCell") {
        start + 1 + next_open
    } else {
        text.len()
    };

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&text[end..]);
    Some(out)
}

/// Byte offset of the end of the given 1-based line.
fn byte_offset_of_line(text: &str, line: usize) -> usize {
    let mut remaining = line.max(1);
    for (idx, b) in text.bytes().enumerate() {
        if b == b'\n' {
            remaining -= 1;
            if remaining == 0 {
                return idx;
            }
        }
    }
    text.len()
}

fn changed(original: &str, candidate: String) -> Option<String> {
    (candidate != original).then_some(candidate)
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<(/?)([A-Za-z][A-Za-z0-9_]*)(?:"[^"]*"|'[^']*'|[^>])*>"#)
            .expect("valid regex")
    })
}

fn id_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bid="([^"]*)""#).expect("valid regex"))
}

fn tag_id(tag: &str) -> Option<&str> {
    id_attr_regex()
        .captures(tag)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

// rule 1
fn unescape_quote_artifacts(text: &str) -> Option<String> {
    if !text.contains(r#"=\""#) {
        return None;
    }
    changed(text, text.replace(r#"\""#, "\""))
}

// rule 2
fn strip_code_fence(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[a-zA-Z]*[ \t]*\n?(.*?)\n?\s*```\s*$").expect("valid regex")
    });
    let inner = re.captures(text)?.get(1)?.as_str().to_owned();
    changed(text, inner)
}

// rule 3
fn drop_leading_prose(text: &str) -> Option<String> {
    let idx = ["<mxfile", "<mxGraphModel", "<diagram", "<root", "<mxCell"]
        .iter()
        .filter_map(|tag| text.find(tag))
        .min()?;
    if idx == 0 {
        return None;
    }
    let prefix = text[..idx].trim();
    if prefix.is_empty() || (prefix.starts_with("<?xml") && prefix.ends_with("?>")) {
        return None;
    }
    Some(text[idx..].to_owned())
}

// rule 4
fn remove_duplicate_structural_attrs(text: &str) -> Option<String> {
    static ATTR_RE: OnceLock<Regex> = OnceLock::new();
    let attr_re = ATTR_RE.get_or_init(|| {
        Regex::new(r#"\s+(parent|source|target|vertex|edge|connectable)="[^"]*""#)
            .expect("valid regex")
    });
    let result = tag_regex().replace_all(text, |caps: &Captures| {
        let tag = &caps[0];
        let mut seen: Vec<String> = Vec::new();
        attr_re
            .replace_all(tag, |attr: &Captures| {
                let name = attr[1].to_owned();
                if seen.contains(&name) {
                    String::new()
                } else {
                    seen.push(name);
                    attr[0].to_owned()
                }
            })
            .into_owned()
    });
    changed(text, result.into_owned())
}

// rule 5
fn escape_bare_ampersands(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+)?(;)?").expect("valid regex")
    });
    let result = re.replace_all(text, |caps: &Captures| {
        let name = caps.get(1).map(|m| m.as_str());
        let terminated = caps.get(2).is_some();
        let recognized = terminated
            && name.is_some_and(|n| {
                n.starts_with('#') || matches!(n, "amp" | "lt" | "gt" | "quot" | "apos")
            });
        if recognized {
            caps[0].to_owned()
        } else {
            format!("&amp;{}", &caps[0][1..])
        }
    });
    changed(text, result.into_owned())
}

// rule 6
fn unmangle_double_escaped_entities(text: &str) -> Option<String> {
    let result = text
        .replace("&amp;lt;", "&lt;")
        .replace("&amp;gt;", "&gt;")
        .replace("&amp;quot;", "&quot;")
        .replace("&amp;apos;", "&apos;")
        .replace("&amp;#39;", "&#39;")
        .replace("&amp;amp;", "&amp;");
    changed(text, result)
}

// rule 7
fn quote_bare_attr_values(text: &str) -> Option<String> {
    let result = tag_regex().replace_all(text, |caps: &Captures| quote_bare_in_tag(&caps[0]));
    changed(text, result.into_owned())
}

/// Byte-level walk over one tag: values starting without a quote get one.
/// Multi-byte UTF-8 content never matches the ASCII tests and is copied
/// verbatim.
fn quote_bare_in_tag(tag: &str) -> String {
    let bytes = tag.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() + 4);
    let mut in_quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = in_quote {
            out.push(b);
            if b == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => {
                in_quote = Some(b);
                out.push(b);
                i += 1;
            }
            b'=' => {
                out.push(b'=');
                let next = bytes.get(i + 1).copied();
                let bare = next.is_some_and(|n| {
                    n != b'"' && n != b'\'' && n != b'>' && !n.is_ascii_whitespace()
                });
                if !bare {
                    i += 1;
                    continue;
                }
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>'
                {
                    end += 1;
                }
                // leave the '/' of a closing '/>' outside the value
                if end > start && bytes[end - 1] == b'/' && bytes.get(end) == Some(&b'>') {
                    end -= 1;
                }
                out.push(b'"');
                out.extend_from_slice(&bytes[start..end]);
                out.push(b'"');
                i = end;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| tag.to_owned())
}

// rule 8
fn fix_self_closing_end_tags(text: &str) -> Option<String> {
    static END_RE: OnceLock<Regex> = OnceLock::new();
    static SPACED_RE: OnceLock<Regex> = OnceLock::new();
    let end_re = END_RE.get_or_init(|| {
        Regex::new(r"</\s*([A-Za-z][A-Za-z0-9_]*)\s*/\s*>").expect("valid regex")
    });
    let spaced_re = SPACED_RE.get_or_init(|| Regex::new(r"/\s+>").expect("valid regex"));
    let step = end_re.replace_all(text, "</$1>");
    let result = spaced_re.replace_all(&step, "/>").into_owned();
    changed(text, result)
}

// rule 9
fn insert_missing_attr_spaces(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE
        .get_or_init(|| Regex::new(r#""([a-zA-Z][a-zA-Z0-9_-]*=")"#).expect("valid regex"));
    let result = re.replace_all(text, "\" $1");
    changed(text, result.into_owned())
}

// rule 10
fn unquote_style_colors(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"([a-zA-Z]*[Cc]olor)="(#[0-9a-fA-F]{3,8})""#).expect("valid regex")
    });
    let result = re.replace_all(text, "$1=$2");
    changed(text, result.into_owned())
}

// rule 11
fn escape_lt_in_attr_values(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re =
        RE.get_or_init(|| Regex::new(r#"="([^"<]*)<([^"]*)""#).expect("valid regex"));
    let mut current = text.to_owned();
    for _ in 0..16 {
        let next = re.replace_all(&current, "=\"$1&lt;$2\"").into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    changed(text, current)
}

// rule 12
fn drop_invalid_numeric_refs(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"&#(x?[0-9a-fA-F]*);").expect("valid regex"));
    let result = re.replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let resolved = match body.strip_prefix('x') {
            Some(hex) if !hex.is_empty() => u32::from_str_radix(hex, 16).ok(),
            Some(_) => None,
            None if body.chars().all(|c| c.is_ascii_digit()) && !body.is_empty() => {
                body.parse().ok()
            }
            None => None,
        };
        if resolved.and_then(char::from_u32).is_some() {
            caps[0].to_owned()
        } else {
            String::new()
        }
    });
    changed(text, result.into_owned())
}

// rule 13
fn collapse_comment_hyphens(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)<!--(.*?)-->").expect("valid regex"));
    let result = re.replace_all(text, |caps: &Captures| {
        let inner = &caps[1];
        if inner.contains("--") {
            format!("<!--{}-->", inner.replace("--", "-"))
        } else {
            caps[0].to_owned()
        }
    });
    changed(text, result.into_owned())
}

// rule 14
fn normalize_tag_casing(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re =
        RE.get_or_init(|| Regex::new(r"(</?)([A-Za-z][A-Za-z0-9_]*)").expect("valid regex"));
    let result = re.replace_all(text, |caps: &Captures| {
        let name = &caps[2];
        match canonical_tag(name) {
            Some(canonical) if canonical != name => format!("{}{}", &caps[1], canonical),
            _ => caps[0].to_owned(),
        }
    });
    changed(text, result.into_owned())
}

// rule 15
fn strip_foreign_tags(text: &str) -> Option<String> {
    let result = tag_regex().replace_all(text, |caps: &Captures| {
        if canonical_tag(&caps[2]).is_some() {
            caps[0].to_owned()
        } else {
            String::new()
        }
    });
    changed(text, result.into_owned())
}

// rule 16
fn close_open_tags(text: &str) -> Option<String> {
    let stack = open_tag_stack(text);
    if stack.is_empty() {
        return None;
    }
    let mut result = text.trim_end().to_owned();
    for (name, _) in stack.iter().rev() {
        result.push_str(&format!("</{name}>"));
    }
    Some(result)
}

// rule 17
fn remove_excess_closing_tags(text: &str) -> Option<String> {
    let mut opens: HashMap<String, usize> = HashMap::new();
    let mut close_spans: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
    for caps in tag_regex().captures_iter(text) {
        let m = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let tag = &caps[0];
        let name = caps[2].to_owned();
        if tag.starts_with("</") {
            close_spans.entry(name).or_default().push(m);
        } else if !tag.ends_with("/>") {
            *opens.entry(name).or_default() += 1;
        }
    }

    let mut remove: Vec<(usize, usize)> = Vec::new();
    for (name, spans) in &close_spans {
        let open_count = opens.get(name).copied().unwrap_or(0);
        if spans.len() > open_count {
            let excess = spans.len() - open_count;
            remove.extend(spans.iter().rev().take(excess));
        }
    }
    if remove.is_empty() {
        return None;
    }
    remove.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end) in remove {
        out.push_str(&text[last..start]);
        last = end;
    }
    out.push_str(&text[last..]);
    Some(out)
}

// rule 18
fn trim_trailing_content(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"</(?:mxfile|mxGraphModel|diagram|root|mxCell|object|Array)>")
            .expect("valid regex")
    });
    let last = re.find_iter(text).last()?;
    if text[last.end()..].trim().is_empty() {
        return None;
    }
    Some(text[..last.end()].to_owned())
}

// rule 19
fn collapse_duplicate_cell_opens(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(<mxCell(?:"[^"]*"|[^>])*>)\s*(<mxCell(?:"[^"]*"|[^>])*>)"#)
            .expect("valid regex")
    });
    let mut current = text.to_owned();
    for _ in 0..8 {
        let next = re
            .replace_all(&current, |caps: &Captures| {
                let first = &caps[1];
                let second = &caps[2];
                let both_open = !first.ends_with("/>") && !second.ends_with("/>");
                if both_open && tag_id(first).is_some() && tag_id(first) == tag_id(second) {
                    first.to_owned()
                } else {
                    caps[0].to_owned()
                }
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    changed(text, current)
}

// rule 20
fn flatten_nested_cells(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    let mut cell_open = false;
    let mut suppress = 0usize;
    for caps in tag_regex().captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        out.push_str(&text[last..m.start()]);
        last = m.end();
        let tag = m.as_str();
        if &caps[2] != "mxCell" {
            out.push_str(tag);
            continue;
        }
        if tag.starts_with("</") {
            if cell_open {
                cell_open = false;
                out.push_str(tag);
            } else if suppress > 0 {
                suppress -= 1; // the outer cell was already closed early
            } else {
                out.push_str(tag);
            }
        } else if tag.ends_with("/>") {
            if cell_open {
                out.push_str("</mxCell>");
                suppress += 1;
                cell_open = false;
            }
            out.push_str(tag);
        } else {
            if cell_open {
                out.push_str("</mxCell>");
                suppress += 1;
            }
            cell_open = true;
            out.push_str(tag);
        }
    }
    out.push_str(&text[last..]);
    changed(text, out)
}

// rule 21
fn rename_duplicate_ids(text: &str) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for caps in tag_regex().captures_iter(text) {
        if matches!(&caps[2], "mxCell" | "object")
            && let Some(id) = tag_id(&caps[0])
            && !id.is_empty()
        {
            *counts.entry(id.to_owned()).or_default() += 1;
        }
    }
    if !counts.values().any(|&n| n > 1) {
        return None;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let result = tag_regex().replace_all(text, |caps: &Captures| {
        let tag = &caps[0];
        if !matches!(&caps[2], "mxCell" | "object") {
            return tag.to_owned();
        }
        let Some(id) = tag_id(tag).map(str::to_owned) else {
            return tag.to_owned();
        };
        if id.is_empty() || counts.get(&id).copied().unwrap_or(0) < 2 {
            return tag.to_owned();
        }
        let n = seen.entry(id.clone()).and_modify(|c| *c += 1).or_insert(1);
        if *n == 1 {
            return tag.to_owned();
        }
        let replacement = format!("id=\"{id}-{n}\"");
        id_attr_regex()
            .replace(tag, NoExpand(&replacement))
            .into_owned()
    });
    changed(text, result.into_owned())
}

// rule 22
fn synthesize_empty_ids(text: &str) -> Option<String> {
    let mut counter = 0usize;
    let result = tag_regex().replace_all(text, |caps: &Captures| {
        let tag = &caps[0];
        if matches!(&caps[2], "mxCell" | "object") && tag.contains(r#"id="""#) {
            counter += 1;
            tag.replacen(r#"id="""#, &format!(r#"id="cell-{counter}""#), 1)
        } else {
            tag.to_owned()
        }
    });
    changed(text, result.into_owned())
}
