//! Gate evaluation.
//!
//! Gates are issues with `type = gate` that block workflow until a
//! condition is met. Each open gate is evaluated against its `await_type`:
//! - `human`: skipped, only a manual action closes it
//! - `timer`: resolved when `created_at + timeout_ns < now`
//! - `bead`: resolved when the awaited issue is closed
//! - `gh:run` / `gh:pr`: resolved from hosted-git CI/PR state
//!
//! The hosted-git CLI is an injected dependency so tests supply a
//! deterministic fake.

use chrono::{DateTime, Utc};
use tracing::debug;

use braid_core::cancel::CancelToken;
use braid_core::enums::{AwaitType, IssueType, Status};
use braid_core::filter::IssueFilter;
use braid_core::issue::Issue;

use crate::error::{EngineError, Result};
use crate::service::IssueService;

/// Status of a hosted-git workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    /// e.g. "completed", "in_progress", "queued".
    pub status: String,
    /// e.g. "success", "failure", "cancelled"; empty while running.
    pub conclusion: String,
}

/// Status of a hosted-git pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrStatus {
    /// e.g. "OPEN", "MERGED", "CLOSED".
    pub state: String,
    pub merged: bool,
}

/// Injected hosted-git CLI.
pub trait HostedGitCli: Send + Sync {
    fn run_status(&self, run_id: &str) -> Result<RunStatus>;
    fn pr_status(&self, pr: &str) -> Result<PrStatus>;
}

/// Production implementation shelling out to `gh`.
pub struct SystemGh;

impl SystemGh {
    fn invoke(&self, args: &[&str]) -> Result<serde_json::Value> {
        let output = std::process::Command::new("gh")
            .args(args)
            .output()
            .map_err(|e| EngineError::External(format!("failed to run gh: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::External(format!(
                "gh {} failed: {stderr}",
                args.first().copied().unwrap_or_default()
            )));
        }
        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::External(format!("failed to parse gh output: {e}")))
    }
}

impl HostedGitCli for SystemGh {
    fn run_status(&self, run_id: &str) -> Result<RunStatus> {
        let val = self.invoke(&["run", "view", run_id, "--json", "status,conclusion"])?;
        Ok(RunStatus {
            status: val["status"].as_str().unwrap_or_default().to_string(),
            conclusion: val["conclusion"].as_str().unwrap_or_default().to_string(),
        })
    }

    fn pr_status(&self, pr: &str) -> Result<PrStatus> {
        let val = self.invoke(&["pr", "view", pr, "--json", "state,mergedAt"])?;
        let state = val["state"].as_str().unwrap_or_default().to_string();
        let merged = state == "MERGED" || !val["mergedAt"].is_null();
        Ok(PrStatus { state, merged })
    }
}

/// How one gate came out of an evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDisposition {
    /// Condition met; the gate is (or would be) closed with this reason.
    Resolved(String),
    /// Not yet met. Carries a diagnostic such as remaining time or a
    /// missing-target note.
    Pending(Option<String>),
    /// Needs a manual action; never auto-closed.
    Skipped,
    /// The condition failed terminally and the escalate flag was set.
    Escalate(String),
}

/// One gate's evaluation result.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub id: String,
    pub disposition: GateDisposition,
}

/// Options for an evaluation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateRunOptions {
    /// Report dispositions without closing resolved gates.
    pub dry_run: bool,
    /// Report terminally-failed external conditions as `Escalate` instead
    /// of `Pending`.
    pub escalate: bool,
}

/// Evaluates gates against timers, other issues, and external state.
pub struct GateEvaluator<'a> {
    service: &'a IssueService,
    gh: Box<dyn HostedGitCli>,
}

impl<'a> GateEvaluator<'a> {
    pub fn new(service: &'a IssueService, gh: Box<dyn HostedGitCli>) -> Self {
        Self { service, gh }
    }

    /// Evaluates every open gate, closing resolved ones unless `dry_run`.
    pub fn evaluate_all(
        &self,
        opts: GateRunOptions,
        token: &CancelToken,
    ) -> Result<Vec<GateOutcome>> {
        let gates = self.service.list(
            &IssueFilter {
                issue_type: Some(IssueType::Gate),
                status: Some(Status::Open),
                ..Default::default()
            },
            token,
        )?;

        let now = Utc::now();
        let mut outcomes = Vec::with_capacity(gates.len());
        for gate in &gates {
            let disposition = self.evaluate_gate(gate, now, opts.escalate, token);
            if let GateDisposition::Resolved(ref reason) = disposition {
                debug!(id = %gate.id, reason = %reason, "gate resolved");
                if !opts.dry_run {
                    self.service.close(&gate.id, reason, token)?;
                }
            }
            outcomes.push(GateOutcome {
                id: gate.id.clone(),
                disposition,
            });
        }
        Ok(outcomes)
    }

    /// Evaluates a single gate. External CLI failures surface as a
    /// pending disposition carrying the error text; the batch never
    /// aborts on one bad gate.
    pub fn evaluate_gate(
        &self,
        gate: &Issue,
        now: DateTime<Utc>,
        escalate: bool,
        token: &CancelToken,
    ) -> GateDisposition {
        match gate.await_type {
            AwaitType::Human => GateDisposition::Skipped,
            AwaitType::Timer => evaluate_timer(gate, now),
            AwaitType::Bead => self.evaluate_bead(gate, token),
            AwaitType::GhRun => match self.gh.run_status(&gate.await_id) {
                Ok(run) => evaluate_run(&gate.await_id, &run, escalate),
                Err(e) => GateDisposition::Pending(Some(e.to_string())),
            },
            AwaitType::GhPr => match self.gh.pr_status(&gate.await_id) {
                Ok(pr) => evaluate_pr(&gate.await_id, &pr, escalate),
                Err(e) => GateDisposition::Pending(Some(e.to_string())),
            },
            AwaitType::None | AwaitType::Custom(_) => {
                GateDisposition::Pending(Some(format!(
                    "unrecognised await type {:?}",
                    gate.await_type.as_str()
                )))
            }
        }
    }

    fn evaluate_bead(&self, gate: &Issue, token: &CancelToken) -> GateDisposition {
        match self.service.get(&gate.await_id, token) {
            Ok(target) if target.status == Status::Closed => {
                GateDisposition::Resolved(format!("awaited issue {} closed", gate.await_id))
            }
            Ok(_) => GateDisposition::Pending(None),
            Err(e) if e.is_not_found() => GateDisposition::Pending(Some(format!(
                "awaited issue {} does not exist",
                gate.await_id
            ))),
            Err(e) => GateDisposition::Pending(Some(e.to_string())),
        }
    }
}

fn evaluate_timer(gate: &Issue, now: DateTime<Utc>) -> GateDisposition {
    let Some(timeout) = gate.timeout else {
        return GateDisposition::Pending(Some("timer gate without timeout".into()));
    };
    let Ok(timeout) = chrono::Duration::from_std(timeout) else {
        return GateDisposition::Pending(Some("timer gate timeout out of range".into()));
    };

    let deadline = gate.created_at + timeout;
    if deadline < now {
        GateDisposition::Resolved("timer expired".into())
    } else {
        GateDisposition::Pending(Some(format!(
            "{}s remaining",
            (deadline - now).num_seconds()
        )))
    }
}

fn evaluate_run(run_id: &str, run: &RunStatus, escalate: bool) -> GateDisposition {
    if run.status != "completed" {
        return GateDisposition::Pending(None);
    }
    match run.conclusion.as_str() {
        "success" => GateDisposition::Resolved(format!("run {run_id} completed successfully")),
        other => {
            let reason = format!("run {run_id} completed with conclusion {other:?}");
            if escalate {
                GateDisposition::Escalate(reason)
            } else {
                GateDisposition::Pending(Some(reason))
            }
        }
    }
}

fn evaluate_pr(pr_id: &str, pr: &PrStatus, escalate: bool) -> GateDisposition {
    if pr.merged || pr.state == "MERGED" {
        return GateDisposition::Resolved(format!("PR {pr_id} merged"));
    }
    if pr.state == "CLOSED" {
        let reason = format!("PR {pr_id} closed without merging");
        return if escalate {
            GateDisposition::Escalate(reason)
        } else {
            GateDisposition::Pending(Some(reason))
        };
    }
    GateDisposition::Pending(None)
}
