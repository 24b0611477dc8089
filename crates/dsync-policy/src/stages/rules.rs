use std::collections::BTreeMap;

use crate::ast::{DataRef, PolicyModule, RuleKind};
use crate::error::{CompileError, CompileErrorKind};
use crate::stage::{CompileContext, CompileStage};
use crate::stages::rules_by_path;

/// Rules that share a data path must agree on their shape.
///
/// Reports mixed rule kinds, functions of different arity, and more than one
/// `default` for the same path. Rules may be spread across modules of the
/// same package.
pub struct RuleConflictStage;

impl CompileStage for RuleConflictStage {
    fn name(&self) -> &str {
        "rule-conflicts"
    }

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        _context: &CompileContext<'_>,
    ) -> Vec<CompileError> {
        let mut errors = Vec::new();
        for (path, rules) in rules_by_path(modules) {
            let Some((_, first)) = rules.first() else {
                continue;
            };

            if let Some((id, rule)) = rules.iter().find(|(_, r)| !same_shape(first.kind, r.kind)) {
                errors.push(CompileError::new(
                    CompileErrorKind::RuleConflict,
                    *id,
                    rule.line,
                    format!(
                        "conflicting rules {} found: {} and {}",
                        DataRef(&path),
                        first.kind,
                        rule.kind
                    ),
                ));
                continue;
            }

            if let RuleKind::Function { arity } = first.kind {
                let mismatch = rules.iter().find_map(|(id, r)| match r.kind {
                    RuleKind::Function { arity: other } if other != arity => {
                        Some((*id, r.line, other))
                    }
                    _ => None,
                });
                if let Some((id, line, other)) = mismatch {
                    errors.push(CompileError::new(
                        CompileErrorKind::RuleConflict,
                        id,
                        line,
                        format!(
                            "function {} redeclared with {other} instead of {arity} arguments",
                            DataRef(&path),
                        ),
                    ));
                }
            }

            let mut defaults = rules.iter().filter(|(_, r)| r.is_default);
            if let (Some(_), Some((id, rule))) = (defaults.next(), defaults.next()) {
                errors.push(CompileError::new(
                    CompileErrorKind::RuleConflict,
                    *id,
                    rule.line,
                    format!("multiple default rules {} found", DataRef(&path)),
                ));
            }
        }
        errors
    }
}

/// Functions of any arity share a shape; arity is checked separately.
fn same_shape(a: RuleKind, b: RuleKind) -> bool {
    match (a, b) {
        (RuleKind::Function { .. }, RuleKind::Function { .. }) => true,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::stages::testing::modules;

    fn check(sources: &[(&str, &str)]) -> Vec<CompileError> {
        let config = CompilerConfig::default();
        RuleConflictStage.check(&modules(sources), &CompileContext::new(&config))
    }

    #[test]
    fn incremental_definitions_are_fine() {
        let errors = check(&[
            ("a", "package authz\nimport rego.v1\n\ndefault allow := false\n\nallow if input.admin\n"),
            ("b", "package authz\nimport rego.v1\n\nallow if input.owner\n"),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn kind_mismatch_across_modules() {
        let errors = check(&[
            ("a", "package authz\n\nallow := true\n"),
            ("b", "package authz\nimport rego.v1\n\nallow contains x if { x := 1 }\n"),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "b");
        assert_eq!(errors[0].kind, CompileErrorKind::RuleConflict);
        assert!(errors[0].message.starts_with("conflicting rules data.authz.allow found"));
    }

    #[test]
    fn function_arity_mismatch() {
        let errors = check(&[(
            "a",
            "package f\n\nf(x) := x\n\nf(x, y) := y\n",
        )]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 5);
        assert!(errors[0].message.contains("2 instead of 1"));
    }

    #[test]
    fn multiple_defaults() {
        let errors = check(&[
            ("a", "package p\n\ndefault allow := false\n"),
            ("b", "package p\n\ndefault allow := true\n"),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file, "b");
        assert!(errors[0].message.contains("multiple default rules data.p.allow"));
    }

    #[test]
    fn ref_head_rules_group_by_full_path() {
        let errors = check(&[
            ("a", "package p\n\na.b.c := 1\n"),
            ("b", "package p\nimport rego.v1\n\na.b contains 1 if { true }\n"),
        ]);
        assert!(errors.is_empty(), "{errors:?}");

        let errors = check(&[
            ("a", "package p\n\na.b.c := 1\n"),
            ("b", "package p\nimport rego.v1\n\na.b.c contains 1 if { true }\n"),
        ]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("conflicting rules data.p.a.b.c found"));
    }

    #[test]
    fn different_packages_do_not_conflict() {
        let errors = check(&[
            ("a", "package p\n\nx := 1\n"),
            ("b", "package q\nimport rego.v1\n\nx contains 1 if { true }\n"),
        ]);
        assert!(errors.is_empty());
    }
}
