use std::collections::BTreeMap;
use std::time::Duration;

use crate::ast::PolicyModule;
use crate::config::CompilerConfig;
use crate::error::CompileError;

/// Answers whether a data path (segments below `data`) already holds
/// content a rule would shadow. `Err` carries a store failure message.
pub type PathConflictCheck<'a> = dyn Fn(&[String]) -> Result<bool, String> + 'a;

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage.
#[derive(Clone, Debug)]
pub struct StageResult {
    /// Name of the stage that produced this result.
    pub stage_name: String,
    /// Whether the stage reported no errors.
    pub passed: bool,
    /// Number of errors the stage reported.
    pub errors: usize,
    /// Wall-clock time the stage took.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// CompileContext
// ---------------------------------------------------------------------------

/// Shared state available to every compile stage.
pub struct CompileContext<'a> {
    pub config: &'a CompilerConfig,
    /// Store oracle for path conflicts, when the caller installed one.
    pub path_conflicts: Option<&'a PathConflictCheck<'a>>,
    /// Results from stages that already ran in this compilation.
    pub previous_stages: Vec<StageResult>,
}

impl<'a> CompileContext<'a> {
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self {
            config,
            path_conflicts: None,
            previous_stages: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CompileStage trait
// ---------------------------------------------------------------------------

/// A single check in the compile pipeline.
///
/// Modules are keyed by their identifier, which is also the `file` of every
/// error reported against them.
pub trait CompileStage: Send + Sync {
    fn name(&self) -> &str;

    fn check(
        &self,
        modules: &BTreeMap<String, PolicyModule>,
        context: &CompileContext<'_>,
    ) -> Vec<CompileError>;
}
