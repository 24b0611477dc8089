//! Policy modules for dsync: parsing and compilation.
//!
//! Policies arrive as raw Rego source text. [`ModuleFile::parse`] runs each
//! source through the `regorus` parser and lowers it into a [`PolicyModule`]
//! (a syntax error is a [`ParseError`]). [`PolicyCompiler`] then checks a
//! whole set of modules together before any of them is persisted.
//!
//! # Design Rules
//!
//! - Parsing is per module; compilation is per module *set*.
//! - The compiler never touches a store directly. Path conflicts are
//!   answered by a caller-supplied oracle so the check can run inside the
//!   caller's transaction.
//! - Every stage runs and all errors are reported together, capped at
//!   [`CompilerConfig::max_errors`].
//! - A rule may only read variables it binds or names that resolve to a
//!   rule of its package, an import, `input` or `data`. Calls must resolve
//!   to a built-in or a function rule.
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use dsync_policy::{ModuleFile, PolicyCompiler};
//!
//! let source = "package authz\n\nimport rego.v1\n\ndefault allow := false\n\nallow if input.user == \"admin\"\n";
//! let file = ModuleFile::parse("authz", source).unwrap();
//! let mut modules = BTreeMap::new();
//! modules.insert(file.path.clone(), file.parsed);
//! let report = PolicyCompiler::default().compile(&modules).unwrap();
//! assert_eq!(report.rules, 2);
//! ```

pub mod ast;
mod builtins;
pub mod compiler;
pub mod config;
pub mod error;
pub mod module;
pub mod parser;
mod scope;
pub mod stage;
pub mod stages;

pub use ast::{DataRef, Import, NameRef, Package, PolicyModule, Rule, RuleKind};
pub use compiler::{CompileReport, CompileResult, PolicyCompiler};
pub use config::CompilerConfig;
pub use error::{CompileError, CompileErrorKind, CompileErrors, ParseError};
pub use module::ModuleFile;
pub use parser::parse_module;
pub use stage::{CompileContext, CompileStage, PathConflictCheck, StageResult};
pub use stages::{
    FunctionStage, ImportStage, PackageStage, PathConflictStage, RuleConflictStage, SafetyStage,
};
