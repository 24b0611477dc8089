//! Compiler view of a parsed policy module.
//!
//! Built from the Rego syntax tree by [`crate::parser`]. Only what the
//! compile stages look at is kept: the package, the imports, the rule heads,
//! and for every rule the names it reads without binding them itself.

use std::fmt;

/// A parsed policy module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyModule {
    pub package: Package,
    pub imports: Vec<Import>,
    pub rules: Vec<Rule>,
}

impl PolicyModule {
    /// Data path of a rule of this module: package path plus rule path.
    pub fn rule_path(&self, rule: &Rule) -> Vec<String> {
        let mut path = self.package.path.clone();
        path.extend(rule.path.iter().cloned());
        path
    }

    /// Imports that bind a name (everything but `future.*` and `rego.*`).
    pub fn binding_imports(&self) -> impl Iterator<Item = &Import> {
        self.imports
            .iter()
            .filter(|i| !matches!(i.root(), "future" | "rego"))
    }
}

/// The `package` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Package {
    /// Segments below the `data` root, e.g. `["authz", "http"]`.
    pub path: Vec<String>,
    pub line: usize,
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", DataRef(&self.path))
    }
}

/// An `import` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    /// Full reference, including the root (`data`, `input`, ...).
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub line: usize,
}

impl Import {
    /// The name the import binds inside the module.
    pub fn name(&self) -> &str {
        self.alias
            .as_deref()
            .or_else(|| self.path.last().map(String::as_str))
            .unwrap_or_default()
    }

    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }
}

/// The shape of a rule head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    /// `p := value`, `p if { ... }`, `a.b.c := value`.
    Complete,
    /// `p contains x if { ... }`.
    PartialSet,
    /// `p[k] := v if { ... }`.
    PartialObject,
    /// `f(a, b) := value if { ... }`.
    Function { arity: usize },
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete rule"),
            Self::PartialSet => f.write_str("partial set rule"),
            Self::PartialObject => f.write_str("partial object rule"),
            Self::Function { arity } => write!(f, "function of arity {arity}"),
        }
    }
}

/// A name as written in the source, with the line it appears on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameRef {
    /// Dotted text, e.g. `x`, `count` or `strings.replace_n`.
    pub name: String,
    pub line: usize,
}

impl NameRef {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        self.name.split('.').map(str::trim).collect()
    }
}

/// A rule definition. Each `default` and each body-carrying definition is
/// its own `Rule`, even when several share a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    /// Head reference below the package: `["allow"]`, `["a", "b", "c"]`.
    pub path: Vec<String>,
    pub kind: RuleKind,
    pub is_default: bool,
    pub line: usize,
    /// Variables read but not bound by the rule. They must resolve to a
    /// rule of the same package, an import, `input` or `data`.
    pub free_vars: Vec<NameRef>,
    /// Functions the rule calls.
    pub calls: Vec<NameRef>,
}

impl Rule {
    /// First segment of the head reference.
    pub fn name(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }
}

/// Formats a data path as `data.a.b`.
pub struct DataRef<'a>(pub &'a [String]);

impl fmt::Display for DataRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("data")?;
        for segment in self.0 {
            if is_identifier(segment) {
                write!(f, ".{segment}")?;
            } else {
                write!(f, "[{segment:?}]")?;
            }
        }
        Ok(())
    }
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
