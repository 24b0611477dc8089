use std::fmt;

use crate::entry::DirectoryEntry;

/// A search filter. Only the forms dsync issues are supported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// `(attr=value)`; values compare ignoring ASCII case.
    Equality { attr: String, value: String },
    /// `(attr=*)`
    Present(String),
}

impl Filter {
    pub fn equality(attr: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equality {
            attr: attr.into(),
            value: value.into(),
        }
    }

    /// `(objectclass=<class>)`
    pub fn object_class(class: impl Into<String>) -> Self {
        Self::equality("objectclass", class)
    }

    /// Evaluate the filter against an entry.
    pub fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::Equality { attr, value } => entry.has_value(attr, value),
            Self::Present(attr) => {
                !entry.values(attr).is_empty() || entry.raw_value(attr).is_some()
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equality { attr, value } => write!(f, "({attr}={})", escape(value)),
            Self::Present(attr) => write!(f, "({attr}=*)"),
        }
    }
}

/// Escape a filter assertion value (RFC 4515).
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_class_filter_text() {
        assert_eq!(Filter::object_class("OPAData").to_string(), "(objectclass=OPAData)");
    }

    #[test]
    fn escapes_special_characters() {
        let filter = Filter::equality("cn", "a*(b)\\");
        assert_eq!(filter.to_string(), "(cn=a\\2a\\28b\\29\\5c)");
        assert_eq!(Filter::Present("mail".into()).to_string(), "(mail=*)");
    }

    #[test]
    fn special_characters_match_literally() {
        let entry = DirectoryEntry::new("cn=x").with_attr("cn", "a*(b)");
        assert!(Filter::equality("cn", "a*(b)").matches(&entry));
        assert!(!Filter::equality("cn", "a").matches(&entry));
    }

    #[test]
    fn matching_ignores_case() {
        let entry = DirectoryEntry::new("cn=x").with_attr("objectClass", "opadata");
        assert!(Filter::object_class("OPAData").matches(&entry));
        assert!(!Filter::object_class("OPAPolicy").matches(&entry));
        assert!(Filter::Present("OBJECTCLASS".into()).matches(&entry));
        assert!(!Filter::Present("mail".into()).matches(&entry));
    }
}
