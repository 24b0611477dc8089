use std::collections::BTreeMap;

use crate::ast::{DataRef, PolicyModule};
use crate::error::{CompileError, CompileErrorKind};
use crate::stage::{CompileContext, CompileStage};
use crate::stages::rules_by_path;

/// A package may not live at or below the path of a rule.
pub struct PackageStage;

impl CompileStage for PackageStage {
    fn name(&self) -> &str {
        "package-conflicts"
    }

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        _context: &CompileContext<'_>,
    ) -> Vec<CompileError> {
        let rules = rules_by_path(modules);
        let mut errors = Vec::new();
        for (id, module) in modules {
            let package = &module.package.path;
            let conflict = (1..=package.len()).find_map(|n| {
                rules
                    .get(&package[..n])
                    .and_then(|defs| defs.first())
                    .map(|def| (&package[..n], *def))
            });
            if let Some((rule_path, (rule_file, rule))) = conflict {
                errors.push(CompileError::new(
                    CompileErrorKind::PackageConflict,
                    id,
                    module.package.line,
                    format!(
                        "package {} conflicts with rule {} defined at {rule_file}:{}",
                        module.package,
                        DataRef(rule_path),
                        rule.line
                    ),
                ));
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
        let config = CompilerConfig::default();
        PackageStage.check(&modules(sources), &CompileContext::new(&config))
    }

    #[test]
    fn package_below_rule() {
        let errors = check(&[
            ("a", "package x\n\ny := 1\n"),
            ("b", "package x.y.z\n\nallow := true\n"),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "b");
        assert_eq!(errors[0].kind, CompileErrorKind::PackageConflict);
        assert_eq!(
            errors[0].message,
            "package data.x.y.z conflicts with rule data.x.y defined at a:3"
        );
    }

    #[test]
    fn sibling_packages() {
        let errors = check(&[
            ("a", "package x\n\ny := 1\n"),
            ("b", "package x.w\n\nallow := true\n"),
        ]);
        assert!(errors.is_empty());
    }
}
