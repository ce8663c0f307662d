//! Command handlers, kept out of `main` so tests can drive them directly
use crate::config::GateConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use labgate_core::{CancelToken, GateRunner, RunContext, RunReport, TargetScore};
use labgate_policy::SkipRules;
use labgate_stages::{FsArtifactStore, PipelineDocument, ProcessChecker, SettingsScoreResolver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Inputs of one `labgate run`
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pipeline: PathBuf,
    pub target_score: TargetScore,
    pub actor: String,
    pub pr_title: Option<String>,
    pub admin: bool,
    pub report: Option<PathBuf>,
}

/// Load the pipeline, wire collaborators from `config`, run every stage.
pub async fn cmd_run(options: &RunOptions, config: &GateConfig, cancel: CancelToken) -> Result<RunReport> {
    let doc = PipelineDocument::load(&options.pipeline)
        .with_context(|| format!("loading pipeline {}", options.pipeline.display()))?;
    let (pipeline, commands) = doc.into_parts();
    info!(pipeline = %pipeline.name, stages = pipeline.stages.len(), "pipeline loaded");

    let admins = config.admins()?;
    let mut checker = ProcessChecker::new(commands)
        .with_pr_template(config.pr_template()?)
        .with_admins(admins.clone());
    if let Some(work_dir) = &config.work_dir {
        checker = checker.with_work_root(work_dir);
    }

    let mut skip = SkipRules::new(admins);
    let mut runner = GateRunner::new(Arc::new(checker))
        .with_artifact_store(Arc::new(FsArtifactStore::new(&config.artifact_dir)));
    if let Some(labs_root) = &config.labs_root {
        let resolver = Arc::new(SettingsScoreResolver::new(labs_root));
        skip = skip.with_score_resolver(resolver.clone());
        runner = runner.with_score_resolver(resolver);
    }
    let mut runner = runner.with_skip_predicate(Arc::new(skip));
    runner.register_all(pipeline.stages)?;

    let mut ctx = RunContext::new(&options.actor, options.target_score)
        .with_admin(options.admin)
        .with_cancel(cancel);
    if let Some(title) = &options.pr_title {
        ctx = ctx.with_pr_title(title);
    }

    let report = runner.run(&mut ctx).await?;
    info!(run_id = %report.run_id, success = report.success, "{}", report.summary());

    if let Some(path) = &options.report {
        write_report(&report, path)?;
    }
    Ok(report)
}

pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, report.to_json_pretty()?)
        .with_context(|| format!("writing report {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(())
}

/// Validate a pipeline file and return its execution order.
pub fn cmd_check(pipeline: &Path) -> Result<Vec<String>> {
    let doc = PipelineDocument::load(pipeline)
        .with_context(|| format!("checking pipeline {}", pipeline.display()))?;
    let order = doc
        .pipeline()
        .execution_order()?
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(order)
}

/// Drop expired artifact versions; returns how many were removed.
pub fn cmd_purge(config: &GateConfig) -> Result<usize> {
    let store = FsArtifactStore::new(&config.artifact_dir);
    let removed = store.purge_expired(Utc::now())?;
    if removed == 0 {
        info!(root = %config.artifact_dir.display(), "no expired artifacts");
    } else {
        warn!(root = %config.artifact_dir.display(), removed, "purged expired artifacts");
    }
    Ok(removed)
}

/// One line per stage for the terminal
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    for record in &report.stages {
        out.push_str(&format!(
            "{:<8} {:<32} {}ms\n",
            record.verdict.outcome().to_string().to_uppercase(),
            record.stage_id,
            record.duration_ms
        ));
        if record.verdict.is_failed() {
            for line in record.verdict.diagnostic().lines().take(20) {
                out.push_str(&format!("         | {}\n", line));
            }
        }
    }
    out.push_str(&report.summary());
    out.push('\n');
    out
}
