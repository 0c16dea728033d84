//! Raw property sets and the line-oriented property file format.
//!
//! The format is the conventional `key=value` property file:
//!
//! ```text
//! # comment
//! ! also a comment
//! truststore.type = keystore
//! truststore.keystorePath: /etc/grid/truststore.jks
//! long.value = first part \
//!              second part
//! unicode = caf\u00e9
//! ```
//!
//! Keys and values may use `\t`, `\n`, `\r`, `\f` and `\uXXXX` escapes; a
//! backslash followed by any other character yields that character, which is
//! how `=`, `:`, `#` or whitespace are embedded in keys.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{ConfigError, ConfigResult};

/// Placeholder path used in parse errors for in-memory sources.
const MEMORY_SOURCE: &str = "<memory>";

/// An ordered set of string properties, as loaded from one or more sources.
///
/// Keys are unique and compared exactly. The optional origin is the file the
/// set was loaded from; include paths are resolved relative to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: IndexMap<String, String>,
    origin: Option<PathBuf>,
}

impl Properties {
    /// Create an empty property set without an origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty property set loaded from `origin`.
    #[must_use]
    pub fn with_origin(origin: impl Into<PathBuf>) -> Self {
        Self {
            entries: IndexMap::new(),
            origin: Some(origin.into()),
        }
    }

    /// Read and parse a property file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file is missing, unreadable or not
    /// valid UTF-8, and [`ConfigError::Parse`] on malformed escapes.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ConfigError::io(path, e))?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ConfigError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.utf8_error()),
            )
        })?;

        let mut properties = Self::parse_with_origin(&content, Some(path))?;
        properties.origin = Some(path.to_path_buf());
        Ok(properties)
    }

    /// Parse property file content that has no backing file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed escapes.
    ///
    /// ```
    /// use keel_config::Properties;
    ///
    /// let props = Properties::parse("a = 1\n# comment\nb:2\n").unwrap();
    /// assert_eq!(props.get("a"), Some("1"));
    /// assert_eq!(props.get("b"), Some("2"));
    /// assert_eq!(props.len(), 2);
    /// ```
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Self::parse_with_origin(content, None)
    }

    fn parse_with_origin(content: &str, origin: Option<&Path>) -> ConfigResult<Self> {
        let source = origin.unwrap_or_else(|| Path::new(MEMORY_SOURCE));
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut properties = Self::new();

        for (line_no, logical) in logical_lines(content) {
            let (raw_key, raw_value) = split_key_value(&logical);
            let key = unescape(raw_key).map_err(|reason| ConfigError::parse(source, line_no, reason))?;
            let value =
                unescape(raw_value).map_err(|reason| ConfigError::parse(source, line_no, reason))?;
            properties.entries.insert(key, value);
        }

        Ok(properties)
    }

    /// The file this set was loaded from.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Set the file this set was loaded from.
    pub fn set_origin(&mut self, origin: impl Into<PathBuf>) {
        self.origin = Some(origin.into());
    }

    /// Get the value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether the set contains a key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a property, returning the previous value of the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a property, preserving the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Borrow the underlying ordered map.
    pub fn entries(&self) -> &IndexMap<String, String> {
        &self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            origin: None,
        }
    }
}

impl IntoIterator for Properties {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{000c}')
}

/// Join physical lines into logical lines, dropping blanks and comments.
///
/// Each logical line is paired with the 1-based number of its first
/// physical line.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut result = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, physical) in content.split('\n').enumerate() {
        let physical = physical.strip_suffix('\r').unwrap_or(physical);
        let trimmed = physical.trim_start_matches(is_blank);

        let (start, mut text) = match current.take() {
            Some((start, text)) => (start, text),
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                (idx + 1, String::new())
            }
        };

        let trailing = trimmed.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            text.push_str(&trimmed[..trimmed.len() - 1]);
            current = Some((start, text));
        } else {
            text.push_str(trimmed);
            result.push((start, text));
        }
    }

    if let Some(pending) = current {
        result.push(pending);
    }

    result
}

/// Split a logical line at the first unescaped separator.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    let mut separator = None;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                separator = Some(c);
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                separator = Some(c);
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let Some(separator) = separator else {
        return (key, "");
    };

    let mut rest = &line[key_end + separator.len_utf8()..];
    if is_blank(separator) {
        rest = rest.trim_start_matches(is_blank);
        if let Some(stripped) = rest.strip_prefix(&['=', ':'][..]) {
            rest = stripped;
        }
    }
    (key, rest.trim_start_matches(is_blank))
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000c}'),
            Some('u') => {
                let unit = read_code_unit(&mut chars)?;
                out.push(decode_code_unit(unit, &mut chars)?);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

fn read_code_unit(chars: &mut std::str::Chars<'_>) -> Result<u32, String> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("malformed \\uXXXX escape: \\u{digits}"));
    }
    u32::from_str_radix(&digits, 16).map_err(|_| format!("malformed \\uXXXX escape: \\u{digits}"))
}

fn decode_code_unit(unit: u32, chars: &mut std::str::Chars<'_>) -> Result<char, String> {
    if let Some(c) = char::from_u32(unit) {
        return Ok(c);
    }
    // High surrogate: must be followed by an escaped low surrogate.
    if (0xD800..0xDC00).contains(&unit) && chars.as_str().starts_with("\\u") {
        chars.next();
        chars.next();
        let low = read_code_unit(chars)?;
        if (0xDC00..0xE000).contains(&low) {
            let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
            if let Some(c) = char::from_u32(combined) {
                return Ok(c);
            }
        }
    }
    Err(format!("invalid unicode escape \\u{unit:04x}"))
}
