use std::collections::BTreeMap;

use crate::ast::{DataRef, PolicyModule};
use crate::error::{CompileError, CompileErrorKind};
use crate::stage::{CompileContext, CompileStage};

/// Checks import roots and rejects imports that bind the same name twice.
pub struct ImportStage;

impl CompileStage for ImportStage {
    fn name(&self) -> &str {
        "imports"
    }

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        context: &CompileContext<'_>,
    ) -> Vec<CompileError> {
        let mut errors = Vec::new();
        for (id, module) in modules {
            let mut bound: BTreeMap<&str, usize> = BTreeMap::new();
            for import in &module.imports {
                let root = import.root();
                if !context.config.allows_root(root) {
                    errors.push(CompileError::new(
                        CompileErrorKind::Import,
                        id,
                        import.line,
                        format!(
                            "invalid import {}: path must begin with one of {}",
                            import.path.join("."),
                            context.config.allowed_import_roots.join(", ")
                        ),
                    ));
                    continue;
                }
                // Keyword imports do not bind a name.
                if matches!(root, "future" | "rego") {
                    continue;
                }
                if let Some(first) = bound.insert(import.name(), import.line) {
                    errors.push(CompileError::new(
                        CompileErrorKind::Import,
                        id,
                        import.line,
                        format!(
                            "import {} shadows the import on line {first}",
                            import.name()
                        ),
                    ));
                }
            }
            for rule in &module.rules {
                if bound.contains_key(rule.name()) {
                    errors.push(CompileError::new(
                        CompileErrorKind::Import,
                        id,
                        rule.line,
                        format!(
                            "rule {} shadows an import",
                            DataRef(&module.rule_path(rule))
                        ),
                    ));
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::stages::testing::modules;

    fn check(sources: &[(&str, &str)]) -> Vec<CompileError> {
        check_with(&CompilerConfig::default(), sources)
    }

    fn check_with(config: &CompilerConfig, sources: &[(&str, &str)]) -> Vec<CompileError> {
        ImportStage.check(&modules(sources), &CompileContext::new(config))
    }

    #[test]
    fn accepts_known_roots() {
        let errors = check(&[(
            "a",
            "package a\nimport data.users\nimport input.req as r\nimport rego.v1\n",
        )]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn rejects_disallowed_root() {
        let config = CompilerConfig {
            allowed_import_roots: vec!["data".into(), "rego".into()],
            ..CompilerConfig::default()
        };
        let errors = check_with(&config, &[("a", "package a\n\nimport input.request\n")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, CompileErrorKind::Import);
        assert_eq!(errors[0].line, 3);
        assert_eq!(errors[0].file, "a");
        assert!(errors[0].message.contains("invalid import input.request"));
        assert!(errors[0].message.ends_with("data, rego"));
    }

    #[test]
    fn rejects_duplicate_binding() {
        let errors = check(&[(
            "a",
            "package a\nimport data.users\nimport input.users\n",
        )]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("line 2"));
    }

    #[test]
    fn keyword_imports_may_repeat() {
        let errors = check(&[(
            "a",
            "package a\nimport future.keywords.if\nimport future.keywords.if\n",
        )]);
        assert!(errors.is_empty());
    }

    #[test]
    fn rule_shadowing_import() {
        let errors = check(&[("a", "package a\nimport data.users\n\nusers := 1\n")]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("data.a.users"));
    }
}
