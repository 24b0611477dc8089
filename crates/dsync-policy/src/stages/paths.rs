use std::collections::BTreeMap;

use tracing::debug;

use crate::ast::PolicyModule;
use crate::error::{CompileError, CompileErrorKind};
use crate::stage::{CompileContext, CompileStage};
use crate::stages::rules_by_path;

/// Rejects rules whose data path is already occupied by store content.
///
/// Asks the context's path-conflict oracle once per distinct rule path.
/// Without an oracle, or with the check disabled, the stage passes.
pub struct PathConflictStage;

impl CompileStage for PathConflictStage {
    fn name(&self) -> &str {
        "path-conflicts"
    }

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        context: &CompileContext<'_>,
    ) -> Vec<CompileError> {
        let Some(exists) = context.path_conflicts else {
            return Vec::new();
        };
        if !context.config.check_path_conflicts {
            return Vec::new();
        }

        let mut errors = Vec::new();
        for (path, rules) in rules_by_path(modules) {
            let Some((id, rule)) = rules.first() else {
                continue;
            };
            let shown = path.join("/");
            match exists(path.as_slice()) {
                Ok(false) => {}
                Ok(true) => errors.push(CompileError::new(
                    CompileErrorKind::PathConflict,
                    *id,
                    rule.line,
                    format!("conflicting rule for data path {shown} found"),
                )),
                Err(e) => errors.push(CompileError::new(
                    CompileErrorKind::Store,
                    *id,
                    rule.line,
                    format!("conflict check for data path {shown}: {e}"),
                )),
            }
        }
        debug!(conflicts = errors.len(), "path conflict check finished");
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::stages::testing::modules;

    #[test]
    fn occupied_path_conflicts() {
        let config = CompilerConfig::default();
        let oracle = |path: &[String]| -> Result<bool, String> { Ok(*path == ["cfg", "a"]) };
        let mut context = CompileContext::new(&config);
        context.path_conflicts = Some(&oracle);

        let mods = modules(&[("p", "package cfg\n\na := 1\n\nb := 2\n")]);
        let errors = PathConflictStage.check(&mods, &context);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, CompileErrorKind::PathConflict);
        assert_eq!(errors[0].line, 3);
        assert_eq!(errors[0].message, "conflicting rule for data path cfg/a found");
    }

    #[test]
    fn oracle_failure_is_store_error() {
        let config = CompilerConfig::default();
        let oracle = |_: &[String]| -> Result<bool, String> { Err("store unavailable".to_string()) };
        let mut context = CompileContext::new(&config);
        context.path_conflicts = Some(&oracle);

        let errors = PathConflictStage.check(&modules(&[("p", "package q\n\nr := 1\n")]), &context);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, CompileErrorKind::Store);
        assert!(errors[0].message.contains("store unavailable"));
    }

    #[test]
    fn skipped_without_oracle_or_when_disabled() {
        let mods = modules(&[("p", "package cfg\n\na := 1\n")]);
        let config = CompilerConfig::default();
        assert!(PathConflictStage
            .check(&mods, &CompileContext::new(&config))
            .is_empty());

        let disabled = CompilerConfig {
            check_path_conflicts: false,
            ..CompilerConfig::default()
        };
        let oracle = |_: &[String]| -> Result<bool, String> { Ok(true) };
        let mut context = CompileContext::new(&disabled);
        context.path_conflicts = Some(&oracle);
        assert!(PathConflictStage.check(&mods, &context).is_empty());
    }
}
