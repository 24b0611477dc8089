use serde::{Deserialize, Serialize};

/// Configuration for the policy compiler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Roots an `import` may reference.
    pub allowed_import_roots: Vec<String>,
    /// Stop collecting errors after this many. Zero means no limit.
    pub max_errors: usize,
    /// Whether to ask the store about rule paths that shadow data.
    pub check_path_conflicts: bool,
    /// Extra function names accepted as builtins, e.g. ones an embedding
    /// evaluator registers.
    pub custom_builtins: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            allowed_import_roots: ["data", "input", "future", "rego"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_errors: 10,
            check_path_conflicts: true,
            custom_builtins: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn allows_root(&self, root: &str) -> bool {
        self.allowed_import_roots.iter().any(|r| r == root)
    }

    pub fn is_custom_builtin(&self, name: &str) -> bool {
        self.custom_builtins.iter().any(|b| b == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompilerConfig::default();
        assert!(config.allows_root("data"));
        assert!(config.allows_root("rego"));
        assert!(!config.allows_root("http"));
        assert_eq!(config.max_errors, 10);
        assert!(config.check_path_conflicts);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: CompilerConfig = serde_json::from_str(r#"{"max_errors": 3}"#).unwrap();
        assert_eq!(config.max_errors, 3);
        assert!(config.check_path_conflicts);
        assert_eq!(config.allowed_import_roots.len(), 4);
        assert!(config.custom_builtins.is_empty());
    }

    #[test]
    fn custom_builtins_from_json() {
        let config: CompilerConfig =
            serde_json::from_str(r#"{"custom_builtins": ["ldap.member_of"]}"#).unwrap();
        assert!(config.is_custom_builtin("ldap.member_of"));
        assert!(!config.is_custom_builtin("count"));
    }
}
