//! Gate Runner: executes the stage graph in dependency order and records a
//! verdict per stage
use crate::artifact::{ArtifactStore, FileSet, InMemoryArtifactStore};
use crate::collaborator::{Checker, Invocation, NeverSkip, ScoreResolver, SkipPredicate};
use crate::context::RunContext;
use crate::error::{GateError, Result};
use crate::graph;
use crate::report::{RunReport, StageRecord};
use crate::score::TargetScore;
use crate::stage::Stage;
use crate::verdict::{FailureKind, Outcome, SkipReason, Verdict, VerdictLedger};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of the applicability predicate
enum Gate {
    Run {
        score: TargetScore,
        subset: Option<String>,
    },
    Skip {
        reason: SkipReason,
        diagnostic: String,
        score: Option<TargetScore>,
    },
}

/// Verdict plus what was resolved on the way to it
struct Evaluation {
    verdict: Verdict,
    score: Option<TargetScore>,
    subset: Option<String>,
}

impl Evaluation {
    fn bare(verdict: Verdict) -> Self {
        Self {
            verdict,
            score: None,
            subset: None,
        }
    }
}

pub struct GateRunner {
    stages: Vec<Stage>,
    index: HashMap<String, usize>,
    checker: Arc<dyn Checker>,
    store: Arc<dyn ArtifactStore>,
    skip: Arc<dyn SkipPredicate>,
    scores: Option<Arc<dyn ScoreResolver>>,
    ledger: VerdictLedger,
}

impl GateRunner {
    /// Runner with an in-memory artifact store, no skip directives and no
    /// per-lab score resolution.
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self {
            stages: Vec::new(),
            index: HashMap::new(),
            checker,
            store: Arc::new(InMemoryArtifactStore::new()),
            skip: Arc::new(NeverSkip),
            scores: None,
            ledger: VerdictLedger::new(),
        }
    }

    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_skip_predicate(mut self, skip: Arc<dyn SkipPredicate>) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_score_resolver(mut self, scores: Arc<dyn ScoreResolver>) -> Self {
        self.scores = Some(scores);
        self
    }

    /// Add a stage. Its prerequisites must already be registered.
    pub fn register(&mut self, stage: Stage) -> Result<()> {
        stage.validate()?;
        if self.index.contains_key(&stage.id) {
            return Err(GateError::Config(format!("duplicate stage id '{}'", stage.id)));
        }
        if let Some(missing) = stage.needs.iter().find(|n| !self.index.contains_key(n.as_str())) {
            return Err(GateError::Config(format!(
                "stage '{}' needs unknown stage '{}'",
                stage.id, missing
            )));
        }
        debug!(stage = %stage.id, needs = ?stage.needs, "registered stage");
        self.index.insert(stage.id.clone(), self.stages.len());
        self.stages.push(stage);
        Ok(())
    }

    /// Add a batch of stages whose prerequisites may point anywhere in the
    /// batch. The batch is rejected as a whole on duplicates, unknown
    /// prerequisites or cycles.
    pub fn register_all<I>(&mut self, stages: I) -> Result<()>
    where
        I: IntoIterator<Item = Stage>,
    {
        let batch: Vec<Stage> = stages.into_iter().collect();
        for stage in &batch {
            stage.validate()?;
        }

        let mut combined = self.stages.clone();
        combined.extend(batch.iter().cloned());
        graph::topological_order(&combined)?;

        for stage in batch {
            debug!(stage = %stage.id, needs = ?stage.needs, "registered stage");
            self.index.insert(stage.id.clone(), self.stages.len());
            self.stages.push(stage);
        }
        Ok(())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    /// Stage IDs in the order `run` visits them
    pub fn execution_order(&self) -> Result<Vec<&str>> {
        Ok(graph::topological_order(&self.stages)?
            .into_iter()
            .map(|i| self.stages[i].id.as_str())
            .collect())
    }

    /// Execute every stage once, in dependency order.
    ///
    /// Only a malformed graph is returned as an error, before any stage
    /// runs; every other failure is recorded as a verdict.
    pub async fn run(&mut self, ctx: &mut RunContext) -> Result<RunReport> {
        let order = graph::topological_order(&self.stages)?;
        let started_at = Utc::now();
        let mut ledger = VerdictLedger::new();
        let mut records = Vec::with_capacity(order.len());

        info!(run_id = %ctx.run_id, actor = %ctx.actor, stages = order.len(), "starting run");

        for i in order {
            let stage = &self.stages[i];
            let stage_started = Utc::now();
            let clock = Instant::now();

            let evaluation = self.evaluate(stage, &ledger, ctx).await;
            let duration_ms = clock.elapsed().as_millis() as u64;

            info!(
                stage = %stage.id,
                verdict = %evaluation.verdict,
                duration_ms,
                "stage finished"
            );

            ledger.record(&stage.id, evaluation.verdict.clone())?;
            records.push(StageRecord {
                stage_id: stage.id.clone(),
                verdict: evaluation.verdict,
                started_at: stage_started,
                duration_ms,
                target_score: evaluation.score,
                test_subset: evaluation.subset,
            });
        }

        self.ledger = ledger;
        let report = RunReport {
            run_id: ctx.run_id.clone(),
            actor: ctx.actor.clone(),
            started_at,
            finished_at: Utc::now(),
            stages: records,
            cancelled: ctx.cancel.is_cancelled(),
            success: self.ledger.is_success(),
        };
        info!(run_id = %report.run_id, success = report.success, summary = %report.summary(), "run finished");
        Ok(report)
    }

    /// Overall success of the last run: every non-skipped stage passed.
    pub fn finalize(&self) -> bool {
        self.ledger.is_success()
    }

    /// Verdicts of the last run
    pub fn ledger(&self) -> &VerdictLedger {
        &self.ledger
    }

    async fn evaluate(&self, stage: &Stage, ledger: &VerdictLedger, ctx: &mut RunContext) -> Evaluation {
        if ctx.cancel.is_cancelled() {
            return Evaluation::bare(Verdict::skipped(
                SkipReason::Cancelled,
                "run was cancelled before this stage started",
            ));
        }

        if let Some((blocker, outcome)) = stage.needs.iter().find_map(|n| match ledger.get(n) {
            Some(v) if v.is_passed() => None,
            Some(v) => Some((n, v.outcome())),
            None => Some((n, Outcome::Skipped)),
        }) {
            return Evaluation::bare(Verdict::skipped(
                SkipReason::Upstream {
                    stage: blocker.clone(),
                },
                format!("prerequisite '{}' was {}", blocker, outcome),
            ));
        }

        let (score, subset) = match self.check_applicability(stage, ctx) {
            Ok(Gate::Run { score, subset }) => (score, subset),
            Ok(Gate::Skip {
                reason,
                diagnostic,
                score,
            }) => {
                return Evaluation {
                    verdict: Verdict::skipped(reason, diagnostic),
                    score,
                    subset: None,
                }
            }
            Err(e) => {
                warn!(stage = %stage.id, error = %e, "applicability check failed");
                return Evaluation::bare(Verdict::failed(
                    FailureKind::Applicability,
                    None,
                    e.to_string(),
                ));
            }
        };

        let invocation = Invocation {
            run_id: ctx.run_id.clone(),
            stage_id: stage.id.clone(),
            action_id: stage.action.clone(),
            target_score: score,
            actor: ctx.actor.clone(),
            pr_title: ctx.pr_title.clone(),
            extra_args: stage.args.clone(),
            test_subset: subset.clone(),
            inputs: self.collect_inputs(stage, ctx),
        };

        info!(stage = %stage.id, action = %stage.action, score = %score, subset = ?subset, "invoking action");
        let verdict = match tokio::time::timeout(stage.timeout_duration(), self.checker.invoke(&invocation)).await {
            Err(_) => Verdict::failed(
                FailureKind::Timeout,
                None,
                GateError::Timeout {
                    stage: stage.id.clone(),
                    timeout_ms: stage.timeout_ms,
                }
                .to_string(),
            ),
            Ok(Err(e)) => Verdict::failed(FailureKind::Action, None, e.to_string()),
            Ok(Ok(output)) => {
                let verdict = Verdict::from_exit(output.exit_code, output.stdout);
                if verdict.is_passed() {
                    self.store_produced(stage, output.produced, ctx);
                }
                verdict
            }
        };

        Evaluation {
            verdict,
            score: Some(score),
            subset,
        }
    }

    fn check_applicability(&self, stage: &Stage, ctx: &RunContext) -> Result<Gate> {
        if stage.when.admin_only && !ctx.admin {
            return Ok(Gate::Skip {
                reason: SkipReason::AdminOnly,
                diagnostic: "stage runs only in admin mode".to_string(),
                score: None,
            });
        }

        if stage.when.skip_directive
            && self
                .skip
                .is_skipped(ctx.pr_title.as_deref(), &ctx.actor, stage.lab.as_deref())?
        {
            return Ok(Gate::Skip {
                reason: SkipReason::Directive,
                diagnostic: "skipped on request of PR title or actor".to_string(),
                score: None,
            });
        }

        let score = self.resolve_score(stage, ctx)?;
        let Some(gate) = &stage.when.score_gate else {
            return Ok(Gate::Run { score, subset: None });
        };

        match gate.select(score) {
            Ok(Some(subset)) => Ok(Gate::Run {
                score,
                subset: Some(subset.to_string()),
            }),
            Ok(None) => Ok(Gate::Skip {
                reason: SkipReason::ZeroScore,
                diagnostic: "target score is 0; no checks apply".to_string(),
                score: Some(score),
            }),
            Err(GateError::Config(msg)) => Err(GateError::Applicability(format!(
                "configuration error: {}",
                msg
            ))),
            Err(other) => Err(other),
        }
    }

    fn resolve_score(&self, stage: &Stage, ctx: &RunContext) -> Result<TargetScore> {
        match (&stage.lab, &self.scores) {
            (Some(lab), Some(resolver)) => resolver.target_score(lab).map_err(|e| match e {
                GateError::Applicability(msg) => GateError::Applicability(msg),
                other => GateError::Applicability(format!("resolving score for '{}': {}", lab, other)),
            }),
            _ => Ok(ctx.target_score),
        }
    }

    fn collect_inputs(&self, stage: &Stage, ctx: &mut RunContext) -> BTreeMap<String, Option<crate::artifact::Artifact>> {
        let mut inputs = BTreeMap::new();
        for name in &stage.consumes {
            let artifact = self.store.get(name);
            match &artifact {
                Some(a) => {
                    debug!(stage = %stage.id, artifact = %name, version = a.version, "resolved input artifact");
                    ctx.artifacts.insert(name.clone(), a.clone());
                }
                None => {
                    warn!(stage = %stage.id, artifact = %name, "input artifact not found; continuing without it");
                }
            }
            inputs.insert(name.clone(), artifact);
        }
        inputs
    }

    fn store_produced(&self, stage: &Stage, produced: Option<FileSet>, ctx: &mut RunContext) {
        let Some(spec) = &stage.produces else {
            return;
        };
        let Some(files) = produced else {
            warn!(stage = %stage.id, artifact = %spec.name, "stage passed but produced no files");
            return;
        };

        let stored = chrono::Duration::try_days(i64::from(spec.retention_days))
            .ok_or_else(|| {
                GateError::Artifact(format!("retention of {} days is out of range", spec.retention_days))
            })
            .and_then(|retention| self.store.put(&spec.name, files, &stage.id, retention));
        match stored {
            Ok(artifact) => {
                info!(
                    stage = %stage.id,
                    artifact = %artifact.name,
                    version = artifact.version,
                    digest = %artifact.digest,
                    "stored artifact"
                );
                ctx.artifacts.insert(artifact.name.clone(), artifact);
            }
            Err(e) => {
                warn!(stage = %stage.id, artifact = %spec.name, error = %e, "failed to store artifact");
            }
        }
    }
}
