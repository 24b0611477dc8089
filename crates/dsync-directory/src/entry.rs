use std::borrow::Cow;
use std::collections::HashMap;

use ldap3::SearchEntry;

/// One directory entry: a DN and its attributes.
///
/// Attribute names are matched case-insensitively, as LDAP does. Values the
/// server marked as binary live in `bin_attrs`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Append a textual attribute value.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Append a binary attribute value.
    pub fn with_bin_attr(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.bin_attrs
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// All textual values of `name`.
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or_default()
    }

    /// First textual value of `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// First value of `name` as bytes, whether the server sent it as text
    /// or binary.
    pub fn raw_value(&self, name: &str) -> Option<Cow<'_, [u8]>> {
        if let Some(text) = self.value(name) {
            return Some(Cow::Borrowed(text.as_bytes()));
        }
        self.bin_attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(|v| Cow::Borrowed(v.as_slice()))
    }

    /// Whether any value of `name` equals `value`, ignoring ASCII case.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.values(name).iter().any(|v| v.eq_ignore_ascii_case(value))
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}
