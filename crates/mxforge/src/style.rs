use indexmap::IndexMap;
use std::fmt;

/// Ordered view of an mxGraph style string.
///
/// A style string is a `;`-separated token list where each token is either a
/// bare word (`ellipse`, `group`) or a `key=value` pair. Token order matters
/// to the renderer, so entries keep insertion order and serialization always
/// ends with a trailing `;` when any token is present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleMap {
    entries: IndexMap<String, Option<String>>,
}

impl StyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a style string or fragment. Empty tokens are dropped, repeated
    /// keys keep the last value in the first occurrence's position.
    pub fn parse(style: &str) -> Self {
        let mut map = Self::new();
        map.extend_from(style);
        map
    }

    /// Appends every token of `fragment` to this map.
    pub fn extend_from(&mut self, fragment: &str) {
        for token in fragment.split(';') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => {
                    self.entries
                        .insert(key.trim().to_owned(), Some(value.trim().to_owned()));
                }
                None => {
                    self.entries.insert(token.to_owned(), None);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The leading token, which conventionally names the shape.
    pub fn first_token(&self) -> Option<&str> {
        self.entries.keys().next().map(String::as_str)
    }

    /// True when `token` is present, bare or with a value.
    pub fn has(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// The value of `key`, if present as `key=value`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key)?.as_deref()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok()
    }

    /// Interprets `1`/`true` as true and `0`/`false` as false.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_owned(), Some(value.into()));
    }

    pub fn set_flag(&mut self, token: &str) {
        self.entries.insert(token.to_owned(), None);
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.set(key, if value { "1" } else { "0" });
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl fmt::Display for StyleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            match value {
                Some(value) => write!(f, "{key}={value};")?,
                None => write!(f, "{key};")?,
            }
        }
        Ok(())
    }
}

/// Formats a coordinate the way draw.io writes them: integral values lose
/// their fractional part (`120` not `120.0`).
pub fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
