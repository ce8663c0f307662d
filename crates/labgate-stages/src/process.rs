//! Checker that runs stage actions as child processes
//!
//! Each action id maps to a [`CommandSpec`]. The built-in `pr-name` action
//! runs in process against the configured PR title template.

use async_trait::async_trait;
use labgate_core::{
    Artifact, CheckOutput, Checker, FileSet, GateError, Invocation, Result, NO_TESTS_COLLECTED,
};
use labgate_policy::{AdminList, PrNameTemplate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Action id of the in-process PR title check
pub const PR_NAME_ACTION: &str = "pr-name";

pub const ENV_TARGET_SCORE: &str = "LABGATE_TARGET_SCORE";
pub const ENV_ACTOR: &str = "LABGATE_ACTOR";
pub const ENV_RUN_ID: &str = "LABGATE_RUN_ID";
pub const ENV_INPUT_PREFIX: &str = "LABGATE_INPUT_";

fn default_subset_flag() -> String {
    "-m".to_string()
}

/// Command line an action id resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    /// Directory whose files become the stage's produced artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Flag placed before the selected test subset
    #[serde(default = "default_subset_flag")]
    pub subset_flag: String,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            workdir: None,
            output_dir: None,
            subset_flag: default_subset_flag(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Full argument vector for one invocation
    pub fn argv(&self, invocation: &Invocation) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(invocation.extra_args.iter().cloned());
        if let Some(subset) = &invocation.test_subset {
            argv.push(self.subset_flag.clone());
            argv.push(subset.clone());
        }
        argv
    }

    fn resolved_output_dir(&self) -> Option<PathBuf> {
        let dir = self.output_dir.as_ref()?;
        match &self.workdir {
            Some(workdir) if dir.is_relative() => Some(workdir.join(dir)),
            _ => Some(dir.clone()),
        }
    }
}

/// `raw-dataset` → `LABGATE_INPUT_RAW_DATASET`
pub fn input_env_name(artifact: &str) -> String {
    let suffix: String = artifact
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}{}", ENV_INPUT_PREFIX, suffix)
}

pub struct ProcessChecker {
    commands: BTreeMap<String, CommandSpec>,
    work_root: PathBuf,
    pr_template: PrNameTemplate,
    admins: AdminList,
}

impl ProcessChecker {
    pub fn new(commands: BTreeMap<String, CommandSpec>) -> Self {
        Self {
            commands,
            work_root: std::env::temp_dir().join("labgate"),
            pr_template: PrNameTemplate::default(),
            admins: AdminList::new(),
        }
    }

    /// Where consumed artifacts are materialised
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    pub fn with_pr_template(mut self, template: PrNameTemplate) -> Self {
        self.pr_template = template;
        self
    }

    pub fn with_admins(mut self, admins: AdminList) -> Self {
        self.admins = admins;
        self
    }

    pub fn command(&self, action_id: &str) -> Option<&CommandSpec> {
        self.commands.get(action_id)
    }

    fn check_pr_name(&self, invocation: &Invocation) -> Result<CheckOutput> {
        let title = invocation
            .pr_title
            .as_deref()
            .ok_or_else(|| GateError::ActionFailure("no PR title to check".to_string()))?;
        let check = self.pr_template.check(title, &invocation.actor, &self.admins);
        info!(stage = %invocation.stage_id, exit_code = check.exit_code(), "PR title checked");
        Ok(CheckOutput::new(check.exit_code(), check.message()))
    }

    async fn spawn(&self, spec: &CommandSpec, invocation: &Invocation) -> Result<CheckOutput> {
        let stage_dir = self
            .work_root
            .join(scratch_component(&invocation.run_id)?)
            .join(scratch_component(&invocation.stage_id)?);
        // Dropped on every exit path, including the runner's timeout
        let scratch = ScratchDir(stage_dir);
        let inputs = materialize_inputs(&scratch.0, &invocation.inputs).await?;

        let argv = spec.argv(invocation);
        let mut cmd = Command::new(&spec.program);
        cmd.args(&argv)
            .envs(&spec.env)
            .env(ENV_TARGET_SCORE, invocation.target_score.to_string())
            .env(ENV_ACTOR, &invocation.actor)
            .env(ENV_RUN_ID, &invocation.run_id)
            .envs(inputs.iter().map(|(name, dir)| (input_env_name(name), dir)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(workdir) = &spec.workdir {
            cmd.current_dir(workdir);
        }

        debug!(stage = %invocation.stage_id, program = %spec.program, args = ?argv, "spawning action");
        let output = cmd.output().await.map_err(|e| {
            GateError::ActionFailure(format!("failed to start '{}': {}", spec.program, e))
        })?;

        // Killed by a signal: no exit code
        let exit_code = output.status.code().unwrap_or(-1);
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        let mut result = CheckOutput::new(exit_code, text);
        if exit_code == 0 || exit_code == NO_TESTS_COLLECTED {
            if let Some(dir) = spec.resolved_output_dir() {
                match read_tree(&dir).await {
                    Ok(files) if !files.is_empty() => result = result.with_produced(files),
                    Ok(_) => debug!(dir = %dir.display(), "output directory is empty"),
                    Err(e) => warn!(dir = %dir.display(), error = %e, "could not collect action output"),
                }
            }
        }

        drop(scratch);
        Ok(result)
    }
}

#[async_trait]
impl Checker for ProcessChecker {
    async fn invoke(&self, invocation: &Invocation) -> Result<CheckOutput> {
        match self.commands.get(&invocation.action_id) {
            Some(spec) => self.spawn(spec, invocation).await,
            None if invocation.action_id == PR_NAME_ACTION => self.check_pr_name(invocation),
            None => Err(GateError::ActionFailure(format!(
                "unknown action '{}'",
                invocation.action_id
            ))),
        }
    }
}

/// A stage's scratch directory, removed when dropped
struct ScratchDir(PathBuf);

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(dir = %self.0.display(), error = %e, "could not clean stage work dir");
            }
        }
        // The run directory goes once its last stage is gone
        if let Some(run_dir) = self.0.parent() {
            let _ = std::fs::remove_dir(run_dir);
        }
    }
}

/// `value` as exactly one plain path component
fn scratch_component(value: &str) -> Result<&str> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !value.contains(['/', '\\']) => Ok(value),
        _ => Err(GateError::ActionFailure(format!(
            "'{}' cannot name a work directory",
            value
        ))),
    }
}

/// Writes each present artifact under `<stage_dir>/inputs/<name>/`
async fn materialize_inputs(
    stage_dir: &Path,
    inputs: &BTreeMap<String, Option<Artifact>>,
) -> Result<BTreeMap<String, PathBuf>> {
    let mut dirs = BTreeMap::new();
    for (name, artifact) in inputs {
        let Some(artifact) = artifact else { continue };
        let dir = stage_dir.join("inputs").join(scratch_component(name)?);
        for (rel, contents) in artifact.files.iter() {
            if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(GateError::ActionFailure(format!(
                    "input '{}' holds a file outside its directory: {}",
                    name,
                    rel.display()
                )));
            }
            let target = dir.join(rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, contents).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;
        dirs.insert(name.clone(), dir);
    }
    Ok(dirs)
}

/// Every regular file under `root`, keyed by path relative to `root`
async fn read_tree(root: &Path) -> std::io::Result<FileSet> {
    let mut files = FileSet::new();
    if !tokio::fs::try_exists(root).await? {
        return Ok(files);
    }
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let kind = entry.file_type().await?;
            if kind.is_dir() {
                pending.push(path);
            } else if kind.is_file() {
                let rel = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                files.insert(rel, tokio::fs::read(&path).await?);
            }
        }
    }
    Ok(files)
}
