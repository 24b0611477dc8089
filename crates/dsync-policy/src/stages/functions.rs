use std::collections::BTreeMap;

use crate::ast::{NameRef, PolicyModule, RuleKind};
use crate::builtins::is_builtin;
use crate::error::{CompileError, CompileErrorKind};
use crate::stage::{CompileContext, CompileStage};
use crate::stages::rules_by_path;

/// Every call must name a built-in, a configured custom built-in, or a
/// function rule reachable from the calling module.
///
/// Non-builtin names resolve as `data.`-prefixed paths, through a `data`
/// import, or relative to the caller's package.
pub struct FunctionStage;

impl CompileStage for FunctionStage {
    fn name(&self) -> &str {
        "functions"
    }

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        context: &CompileContext<'_>,
    ) -> Vec<CompileError> {
        let rules = rules_by_path(modules);
        let mut errors = Vec::new();
        for (id, module) in modules {
            for rule in &module.rules {
                for call in &rule.calls {
                    let name = call.name.as_str();
                    if is_builtin(name) || context.config.is_custom_builtin(name) {
                        continue;
                    }
                    let message = match resolve(module, call) {
                        Some(target) => match rules.get(&target) {
                            Some(defs)
                                if defs
                                    .iter()
                                    .all(|(_, r)| matches!(r.kind, RuleKind::Function { .. })) =>
                            {
                                continue;
                            }
                            Some(_) => format!("{name} is not a function"),
                            None => format!("undefined function {name}"),
                        },
                        None => format!("undefined function {name}"),
                    };
                    errors.push(CompileError::new(
                        CompileErrorKind::UndefinedFunction,
                        id,
                        call.line,
                        message,
                    ));
                }
            }
        }
        errors
    }
}

/// Data path a non-builtin call refers to, if it can refer to one at all.
fn resolve(module: &PolicyModule, call: &NameRef) -> Option<Vec<String>> {
    let segments = call.segments();
    let (first, rest) = segments.split_first()?;
    if *first == "data" {
        return Some(rest.iter().map(|s| s.to_string()).collect());
    }
    if let Some(import) = module.binding_imports().find(|i| i.name() == *first) {
        if import.root() != "data" {
            return None;
        }
        let mut target: Vec<String> = import.path[1..].to_vec();
        target.extend(rest.iter().map(|s| s.to_string()));
        return Some(target);
    }
    let mut target = module.package.path.clone();
    target.extend(segments.iter().map(|s| s.to_string()));
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::stages::testing::modules;

    fn check_with(config: &CompilerConfig, sources: &[(&str, &str)]) -> Vec<CompileError> {
        FunctionStage.check(&modules(sources), &CompileContext::new(config))
    }

    fn check(sources: &[(&str, &str)]) -> Vec<CompileError> {
        check_with(&CompilerConfig::default(), sources)
    }

    #[test]
    fn undefined_function_is_reported() {
        let errors = check(&[("a", "package a\nimport rego.v1\n\nallow if { undefined_fn(1) }\n")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, CompileErrorKind::UndefinedFunction);
        assert_eq!(errors[0].line, 4);
        assert_eq!(errors[0].message, "undefined function undefined_fn");
    }

    #[test]
    fn builtins_resolve() {
        let errors = check(&[(
            "a",
            "package a\nimport rego.v1\n\nn := count(input.xs)\n\nok if startswith(lower(input.name), \"adm\")\n",
        )]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn functions_resolve_across_modules() {
        let errors = check(&[
            (
                "a",
                "package authz\nimport rego.v1\nimport data.lib.users as users\n\nallow if is_admin(input.user)\n\nowner if users.owns(input.user, input.doc)\n\nlocal if data.lib.users.owns(input.user, input.doc)\n",
            ),
            ("b", "package authz\nimport rego.v1\n\nis_admin(u) if u.role == \"admin\"\n"),
            ("c", "package lib.users\nimport rego.v1\n\nowns(u, d) if d.owner == u.name\n"),
        ]);
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn calling_a_value_rule_is_rejected() {
        let errors = check(&[(
            "a",
            "package a\nimport rego.v1\n\nlimit := 3\n\nok if limit(1)\n",
        )]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "limit is not a function");
    }

    #[test]
    fn functions_of_other_packages_need_a_qualified_name() {
        let errors = check(&[
            ("a", "package a\nimport rego.v1\n\nok if helper(1)\n"),
            ("b", "package b\n\nhelper(x) := x\n"),
        ]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "undefined function helper");
    }

    #[test]
    fn custom_builtins_are_accepted() {
        let source = [("a", "package a\nimport rego.v1\n\nok if ldap.member_of(input.user, \"admins\")\n")];
        assert_eq!(check(&source).len(), 1);

        let config = CompilerConfig {
            custom_builtins: vec!["ldap.member_of".into()],
            ..CompilerConfig::default()
        };
        assert!(check_with(&config, &source).is_empty());
    }
}
