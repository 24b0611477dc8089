use std::collections::{BTreeMap, BTreeSet};

use crate::ast::PolicyModule;
use crate::error::{CompileError, CompileErrorKind};
use crate::stage::{CompileContext, CompileStage};

/// Every variable a rule reads must be bound by the rule itself or name a
/// rule of the same package, an import, `input` or `data`.
pub struct SafetyStage;

impl CompileStage for SafetyStage {
    fn name(&self) -> &str {
        "safety"
    }

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        _context: &CompileContext<'_>,
    ) -> Vec<CompileError> {
        // Rule names visible in each package, across every module of it.
        let mut package_rules: BTreeMap<&[String], BTreeSet<&str>> = BTreeMap::new();
        for module in modules.values() {
            package_rules
                .entry(module.package.path.as_slice())
                .or_default()
                .extend(module.rules.iter().map(|r| r.name()));
        }

        let mut errors = Vec::new();
        for (id, module) in modules {
            let rules = package_rules.get(module.package.path.as_slice());
            let imports: BTreeSet<&str> = module.binding_imports().map(|i| i.name()).collect();
            for rule in &module.rules {
                for var in &rule.free_vars {
                    let name = var.name.as_str();
                    let known = matches!(name, "input" | "data")
                        || imports.contains(name)
                        || rules.is_some_and(|names| names.contains(name));
                    if !known {
                        errors.push(CompileError::new(
                            CompileErrorKind::UnsafeVar,
                            id,
                            var.line,
                            format!("var {name} is unsafe"),
                        ));
                    }
                }
            }
        }
        errors
    }
}
