//! Labgate Stages: the concrete collaborators a real run plugs into the runner
//!
//! - [`ProcessChecker`] runs actions as child processes (plus the built-in
//!   `pr-name` title check)
//! - [`FsArtifactStore`] keeps versioned artifacts on disk
//! - [`SettingsScoreResolver`] reads each lab's `settings.json`
//! - [`PipelineDocument`] is the YAML file tying stages to commands
//!
//! # Pipeline File
//!
//! ```text
//! name: lab-ci
//! actions:
//!   pytest: {program: python, args: [-m, pytest]}
//! stages:
//!   - id: unittests
//!     action: pytest
//!     when: {score_gate: {4: mark4, 6: mark6, 8: mark8, 10: mark10}}
//! ```

pub mod document;
pub mod fs_store;
pub mod process;
pub mod settings;

pub use document::PipelineDocument;
pub use fs_store::FsArtifactStore;
pub use process::{input_env_name, CommandSpec, ProcessChecker, PR_NAME_ACTION};
pub use settings::{SettingsScoreResolver, SETTINGS_FILE};
