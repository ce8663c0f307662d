//! Labgate Core: Stage graph, Runner, Verdicts and Artifacts
//!
//! A staged gate runner for coursework CI. Stages form a DAG; each one is
//! gated by its prerequisites and an applicability predicate, and delegates
//! its actual check to an external collaborator.
//!
//! # Run Flow
//!
//! ```text
//! register → order → for each stage:
//!     cancelled? → upstream passed? → applicable? → invoke (timeout) → classify
//!          ↓              ↓                ↓               ↓              ↓
//!       SKIPPED        SKIPPED      SKIPPED/FAILED   FAILED (timeout)  PASSED/FAILED
//! ```

pub mod artifact;
pub mod collaborator;
pub mod context;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod score;
pub mod stage;
pub mod verdict;

pub use artifact::{expiry, Artifact, ArtifactStore, FileSet, InMemoryArtifactStore};
pub use collaborator::{CheckOutput, Checker, FixedScores, Invocation, NeverSkip, ScoreResolver, SkipPredicate};
pub use context::{CancelToken, RunContext};
pub use error::{GateError, Result};
pub use pipeline::Pipeline;
pub use report::{OutcomeCounts, RunReport, StageRecord};
pub use runner::GateRunner;
pub use score::{ScoreGate, TargetScore};
pub use stage::{Applicability, ProducedArtifact, Stage, MAX_RETENTION_DAYS};
pub use verdict::{FailureKind, Outcome, SkipReason, Verdict, VerdictLedger, NO_TESTS_COLLECTED};

/// Labgate engine version
pub const LABGATE_VERSION: &str = env!("CARGO_PKG_VERSION");
