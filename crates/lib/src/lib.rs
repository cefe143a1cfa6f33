//! gamepack-lib: builds deployable games from event-based projects.
//!
//! This crate provides the build pipeline and its collaborators:
//! - `DependencyGraph`: which translation units each scene needs, and cycle detection
//! - `TaskQueue`: the serialized compiler job queue and its backends
//! - `BuildOrchestrator`: the staged pipeline from project to packaged game
//! - `DiagnosticSink`: progress and error reporting to the host

pub mod build;
pub mod codegen;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod deps;
pub mod diagnostics;
pub mod extensions;
pub mod package;
pub mod platform;
pub mod project;
pub mod queue;
pub mod unit;

pub use build::{BuildError, BuildOptions, BuildOrchestrator, BuildOutcome, BuildReport, BuildStage};
pub use config::ToolConfig;
pub use deps::{DependencyGraph, DependencySet};
pub use diagnostics::DiagnosticSink;
pub use project::Project;
pub use queue::TaskQueue;
