//! Built-in compile stages.

pub mod functions;
pub mod imports;
pub mod packages;
pub mod paths;
pub mod rules;
pub mod safety;

pub use functions::FunctionStage;
pub use imports::ImportStage;
pub use packages::PackageStage;
pub use paths::PathConflictStage;
pub use rules::RuleConflictStage;
pub use safety::SafetyStage;

use std::collections::BTreeMap;

use crate::ast::{PolicyModule, Rule};

/// Every rule across all modules, grouped by data path. Paths iterate in
/// sorted order, rules in module-id then source order.
pub(crate) fn rules_by_path(
    modules: &BTreeMap<String, PolicyModule>,
) -> BTreeMap<Vec<String>, Vec<(&str, &Rule)>> {
    let mut grouped: BTreeMap<Vec<String>, Vec<(&str, &Rule)>> = BTreeMap::new();
    for (id, module) in modules {
        for rule in &module.rules {
            grouped
                .entry(module.rule_path(rule))
                .or_default()
                .push((id.as_str(), rule));
        }
    }
    grouped
}
