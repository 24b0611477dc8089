use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ast::PolicyModule;
use crate::config::CompilerConfig;
use crate::error::CompileErrors;
use crate::stage::{CompileContext, CompileStage, PathConflictCheck, StageResult};
use crate::stages::{
    FunctionStage, ImportStage, PackageStage, PathConflictStage, RuleConflictStage, SafetyStage,
};

pub type CompileResult<T> = Result<T, CompileErrors>;

// ---------------------------------------------------------------------------
// CompileReport
// ---------------------------------------------------------------------------

/// Summary of a successful compilation.
#[derive(Clone, Debug)]
pub struct CompileReport {
    pub modules: usize,
    pub rules: usize,
    /// Per-stage results in pipeline order.
    pub stage_results: Vec<StageResult>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// PolicyCompiler
// ---------------------------------------------------------------------------

/// A configurable pipeline of checks over a set of parsed modules.
///
/// Every stage runs; errors from all stages are collected in order and
/// capped at [`CompilerConfig::max_errors`].
pub struct PolicyCompiler<'a> {
    stages: Vec<Box<dyn CompileStage>>,
    config: CompilerConfig,
    path_conflicts: Option<Box<PathConflictCheck<'a>>>,
}

impl<'a> PolicyCompiler<'a> {
    /// An empty pipeline. Use [`Self::add_stage`] or
    /// [`Self::with_default_stages`].
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
            path_conflicts: None,
        }
    }

    /// Imports -> rule conflicts -> package conflicts -> safety ->
    /// functions -> path conflicts.
    pub fn with_default_stages(config: CompilerConfig) -> Self {
        let mut compiler = Self::new(config);
        compiler.add_stage(Box::new(ImportStage));
        compiler.add_stage(Box::new(RuleConflictStage));
        compiler.add_stage(Box::new(PackageStage));
        compiler.add_stage(Box::new(SafetyStage));
        compiler.add_stage(Box::new(FunctionStage));
        compiler.add_stage(Box::new(PathConflictStage));
        compiler
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn CompileStage>) {
        self.stages.push(stage);
    }

    /// Install the oracle used to detect rules shadowing stored data.
    pub fn with_path_conflicts_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&[String]) -> Result<bool, String> + 'a,
    {
        self.path_conflicts = Some(Box::new(check));
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Compile `modules`, keyed by module identifier.
    pub fn compile(&self, modules: &BTreeMap<String, PolicyModule>) -> CompileResult<CompileReport> {
        let start = Instant::now();
        let mut context = CompileContext::new(&self.config);
        context.path_conflicts = self.path_conflicts.as_deref();

        let mut failures = CompileErrors::default();
        for stage in &self.stages {
            let stage_start = Instant::now();
            let errors = stage.check(modules, &context);
            let result = StageResult {
                stage_name: stage.name().to_string(),
                passed: errors.is_empty(),
                errors: errors.len(),
                elapsed: stage_start.elapsed(),
            };
            debug!(
                stage = %result.stage_name,
                errors = result.errors,
                "compile stage finished"
            );
            context.previous_stages.push(result);
            failures.errors.extend(errors);
        }

        let limit = self.config.max_errors;
        if limit > 0 && failures.errors.len() > limit {
            failures.errors.truncate(limit);
            failures.truncated = true;
        }
        if !failures.is_empty() {
            return Err(failures);
        }

        let report = CompileReport {
            modules: modules.len(),
            rules: modules.values().map(|m| m.rules.len()).sum(),
            stage_results: context.previous_stages,
            elapsed: start.elapsed(),
        };
        info!(
            modules = report.modules,
            rules = report.rules,
            "policy modules compiled"
        );
        Ok(report)
    }
}

impl Default for PolicyCompiler<'_> {
    fn default() -> Self {
        Self::with_default_stages(CompilerConfig::default())
    }
}
