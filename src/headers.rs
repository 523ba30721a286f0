//! Header and cookie mappings.
//!
//! `Headers` keeps names lowercase and preserves insertion order. It is a
//! multi-entry mapping: `append` keeps duplicates (needed both to emit
//! several `set-cookie` lines and to detect conflicting `content-length`
//! headers), while `get` resolves to the last entry so plain duplicate
//! headers behave last-wins.

use std::slice;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers { entries: Vec::new() }
    }

    /// Value of the last entry with this name, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces every entry of this name with a single one.
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        let name = name.as_ref().to_ascii_lowercase();
        self.entries.retain(|(k, _)| *k != name);
        self.entries.push((name, value.into()));
    }

    /// Adds an entry, keeping any existing ones with the same name.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        self.entries
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> slice::Iter<'_, (String, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a (String, String);
    type IntoIter = slice::Iter<'a, (String, String)>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Cookie mapping: case-sensitive names, single value per name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    entries: Vec<(String, String)>,
}

impl Cookies {
    pub fn new() -> Cookies {
        Cookies { entries: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Last-wins insert.
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        self.entries.retain(|(k, _)| *k != name);
        self.entries.push((name, value.into()));
    }

    pub fn iter(&self) -> slice::Iter<'_, (String, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical on-the-wire capitalization for a lowercase header name:
/// `content-type` becomes `Content-Type`.
pub(crate) fn canonical_name(name: &str) -> String {
    let mut res = String::with_capacity(name.len());
    let mut upper = true;
    for ch in name.chars() {
        if upper {
            res.extend(ch.to_uppercase());
        } else {
            res.push(ch);
        }
        upper = ch == '-';
    }
    res
}

// Connection and Transfer-Encoding are comma-separated token lists and
// the tokens are compared case-insensitively with surrounding whitespace
// stripped.

#[inline]
fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

#[inline]
pub fn is_close(value: &str) -> bool {
    has_token(value, "close")
}

#[inline]
pub fn is_keep_alive(value: &str) -> bool {
    has_token(value, "keep-alive")
}

#[inline]
pub fn is_identity(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("identity")
}
