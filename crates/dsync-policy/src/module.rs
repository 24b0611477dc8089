use crate::ast::PolicyModule;
use crate::error::ParseError;
use crate::parser::parse_module;

/// A policy module as it is handed to the compiler: where it came from, its
/// raw bytes, and the parsed tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleFile {
    pub path: String,
    pub raw: Vec<u8>,
    pub parsed: PolicyModule,
}

impl ModuleFile {
    /// Parse `raw` as UTF-8 policy source. Errors carry `path`.
    pub fn parse(path: impl Into<String>, raw: impl Into<Vec<u8>>) -> Result<Self, ParseError> {
        let path = path.into();
        let raw = raw.into();
        let source = std::str::from_utf8(&raw).map_err(|e| {
            ParseError::new(1, format!("source is not valid UTF-8: {e}")).with_file(path.as_str())
        })?;
        let parsed = parse_module(&path, source).map_err(|e| e.with_file(path.as_str()))?;
        Ok(Self { path, raw, parsed })
    }

    /// The source text. Always valid UTF-8 once parsed.
    pub fn source(&self) -> &str {
        std::str::from_utf8(&self.raw).unwrap_or_default()
    }
}
