use std::fmt;

/// A syntax error in a policy module source.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{}{line}: parse error: {message}", file_prefix(.file))]
pub struct ParseError {
    /// Module path the source came from, when known.
    pub file: Option<String>,
    /// 1-based line number of the offending token.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            file: None,
            line,
            message: message.into(),
        }
    }

    /// Attach the module path this error was found in.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

fn file_prefix(file: &Option<String>) -> String {
    match file {
        Some(f) => format!("{f}:"),
        None => String::new(),
    }
}

/// Category of a compile failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// An import is malformed or clashes with another import.
    Import,
    /// Rules sharing a path disagree on their shape.
    RuleConflict,
    /// A package is nested under a rule of another module.
    PackageConflict,
    /// A variable is read but never bound and names nothing in scope.
    UnsafeVar,
    /// A call names neither a builtin nor a function rule.
    UndefinedFunction,
    /// A rule would overwrite existing store content.
    PathConflict,
    /// The store could not answer a path-conflict query.
    Store,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Import => "import error",
            Self::RuleConflict => "rule conflict",
            Self::PackageConflict => "package conflict",
            Self::UnsafeVar => "unsafe variable",
            Self::UndefinedFunction => "undefined function",
            Self::PathConflict => "path conflict",
            Self::Store => "store error",
        };
        f.write_str(s)
    }
}

/// A single compile failure, located in one module.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{file}:{line}: {kind}: {message}")]
pub struct CompileError {
    pub file: String,
    pub line: usize,
    pub kind: CompileErrorKind,
    pub message: String,
}

impl CompileError {
    pub fn new(
        kind: CompileErrorKind,
        file: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            kind,
            message: message.into(),
        }
    }
}

/// Every failure reported by one compilation, in stage order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileErrors {
    pub errors: Vec<CompileError>,
    /// Set when more errors were found than the configured limit.
    pub truncated: bool,
}

impl CompileErrors {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    /// Whether any error is of the given kind.
    pub fn has_kind(&self, kind: CompileErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => write!(f, "1 error occurred: {}", self.errors[0])?,
            n => {
                write!(f, "{n} errors occurred:")?;
                for err in &self.errors {
                    write!(f, "\n{err}")?;
                }
            }
        }
        if self.truncated {
            write!(f, "\n(error limit reached)")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
