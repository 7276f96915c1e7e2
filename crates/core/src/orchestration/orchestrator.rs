//! # Orchestrator
//!
//! Drives a task through the round loop and, after convergence, the tool
//! workflow. The orchestrator is the only caller of agents, the moderator,
//! the tool registry and the history store.
//!
//! ```text
//! round r:  roster agents (in order) → Contribution × n → history
//!           moderator(Round r)       → Verdict         → history
//!           approved  → Converged
//!           r == max  → Exhausted
//!           otherwise → feedback carried into round r + 1
//!
//! tools:    extractor → Contribution → action items → ToolCall × m → history
//! ```

use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::actions::{parse_action_items, ActionItem};
use super::events::{RunEvent, RunEventKind};
use super::retry::RetryPolicy;
use super::task::{Task, TaskStatus, WorkflowState};
use crate::agents::{prompts, AgentContext, Participant};
use crate::config::RunConfig;
use crate::error::{
    AgentGenerationError, ModerationError, OrchestratorError, RunStep, StepError, ToolError,
};
use crate::history::{Contribution, HistoryEntry, HistoryRecord, HistoryStore, ToolCall, Verdict};
use crate::moderator::{build_moderator, Moderator, Round};
use crate::tools::ToolRegistry;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a run
#[derive(Debug)]
pub struct TerminalResult {
    pub scenario: String,
    pub status: TaskStatus,
    /// Rounds used, at most the task's maximum
    pub rounds: u32,
    /// Records appended by this run, in append order
    pub history: Vec<HistoryRecord>,
    /// Board text of the converged round
    pub final_contribution: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Set when a step exhausted its retries
    pub failure: Option<OrchestratorError>,
}

impl TerminalResult {
    pub fn contributions(&self) -> impl Iterator<Item = &Contribution> {
        self.history.iter().filter_map(|r| match &r.entry {
            HistoryEntry::Contribution(c) => Some(c),
            _ => None,
        })
    }

    pub fn verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.history.iter().filter_map(|r| match &r.entry {
            HistoryEntry::Verdict(v) => Some(v),
            _ => None,
        })
    }
}

/// What the round loop left behind
struct RoundsOutcome {
    last_round: Vec<Contribution>,
    failure: Option<OrchestratorError>,
}

pub struct Orchestrator {
    roster: Vec<Participant>,
    moderator: Arc<dyn Moderator>,
    history: Arc<dyn HistoryStore>,
    extractor: Option<Participant>,
    tools: ToolRegistry,
    retry: RetryPolicy,
    call_timeout: Duration,
    event_tx: Option<mpsc::Sender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(
        roster: Vec<Participant>,
        moderator: Arc<dyn Moderator>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            roster,
            moderator,
            history,
            extractor: None,
            tools: ToolRegistry::new(),
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            event_tx: None,
        }
    }

    /// Build the collaborators a config names.
    pub fn from_config(
        config: &RunConfig,
        history: Arc<dyn HistoryStore>,
        tools: ToolRegistry,
    ) -> Self {
        let roster = config
            .roster
            .iter()
            .map(|role| Participant::for_role(*role, &config.backend))
            .collect();
        let moderator = build_moderator(&config.moderator, &config.backend);

        let mut orchestrator = Self::new(roster, moderator, history)
            .with_tools(tools)
            .with_retry(config.retry.clone())
            .with_call_timeout(config.call_timeout());
        if let Some(role) = config.extractor {
            orchestrator = orchestrator.with_extractor(Participant::for_role(role, &config.backend));
        }
        orchestrator
    }

    /// Agent that turns a converged round into action items
    pub fn with_extractor(mut self, extractor: Participant) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Upper bound for every agent, moderator and tool call
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set event channel for streaming progress
    pub fn with_event_channel(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Run the refinement loop to a terminal status.
    ///
    /// Only history store faults are returned as `Err`; exhausted retries
    /// end the run with status `Failed` and the error in `failure`.
    #[tracing::instrument(skip(self, task), fields(scenario = %task.scenario(), max_rounds = task.max_rounds()))]
    pub async fn run(&self, mut task: Task) -> Result<TerminalResult, OrchestratorError> {
        let start = self.begin(&task).await?;
        let outcome = self.run_rounds(&mut task).await?;
        self.finish(&task, start, outcome, Vec::new()).await
    }

    /// Run the refinement loop, then dispatch the converged plan's action items.
    #[tracing::instrument(skip(self, task), fields(scenario = %task.scenario(), max_rounds = task.max_rounds()))]
    pub async fn run_with_tools(&self, mut task: Task) -> Result<TerminalResult, OrchestratorError> {
        let start = self.begin(&task).await?;
        let mut outcome = self.run_rounds(&mut task).await?;

        let mut tool_calls = Vec::new();
        if task.status() == TaskStatus::Converged {
            match &self.extractor {
                Some(extractor) => {
                    match self.extract(&task, extractor, &outcome.last_round).await? {
                        Ok(items) => tool_calls = self.dispatch(&task, items).await?,
                        Err(e) => outcome.failure = Some(e),
                    }
                }
                None => tracing::debug!("No extractor configured; skipping tool workflow"),
            }
        }

        self.finish(&task, start, outcome, tool_calls).await
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Validate and announce the run. Returns the last sequence before it.
    async fn begin(&self, task: &Task) -> Result<u64, OrchestratorError> {
        if self.roster.is_empty() {
            return Err(OrchestratorError::InvalidTask(
                "roster needs at least one agent".to_string(),
            ));
        }

        let start = self
            .history
            .latest(task.scenario(), 1)?
            .last()
            .map(|r| r.sequence)
            .unwrap_or(0);

        tracing::info!(
            roster = ?self.roster.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            "Run started"
        );
        self.emit(
            RunEvent::new(RunEventKind::RunStarted, task.scenario()).with_data(json!({
                "goal": task.goal(),
                "max_rounds": task.max_rounds(),
            })),
        )
        .await;
        Ok(start)
    }

    async fn run_rounds(&self, task: &mut Task) -> Result<RoundsOutcome, OrchestratorError> {
        let scenario = task.scenario().to_string();
        let mut board: Vec<Contribution> = Vec::new();
        let mut feedback: Vec<String> = Vec::new();

        loop {
            let round = task.round();
            tracing::debug!(round, "Round started");
            self.emit(RunEvent::new(RunEventKind::RoundStarted, &scenario).with_round(round))
                .await;

            let mut contributions = Vec::with_capacity(self.roster.len());
            for (index, participant) in self.roster.iter().enumerate() {
                let context = AgentContext::new(round)
                    .with_feedback(feedback.clone())
                    .with_board(board.clone());
                let agent = &participant.agent;
                let goal = task.goal();
                let context = &context;

                let drafted = self
                    .call_with_retry(&scenario, RunStep::Draft, round, &participant.id, || async move {
                        agent.generate(goal, context).await.map_err(StepError::from)
                    })
                    .await;
                let content = match drafted {
                    Ok(content) => content,
                    Err(e) => return Ok(self.abort(task, e)),
                };

                let contribution = Contribution {
                    round,
                    agent: participant.id.clone(),
                    content,
                    index: index as u32,
                };
                self.history.append(&scenario, contribution.clone().into())?;
                self.emit(
                    RunEvent::new(RunEventKind::ContributionRecorded, &scenario)
                        .with_round(round)
                        .with_actor(&participant.id),
                )
                .await;

                board.push(contribution.clone());
                contributions.push(contribution);
            }

            task.begin_review();
            let judged = Round::new(round, contributions.clone());
            let criteria = task.criteria();
            let moderator = &self.moderator;
            let judged_ref = &judged;

            let reviewed = self
                .call_with_retry(&scenario, RunStep::Review, round, "Moderator", || async move {
                    moderator
                        .evaluate(judged_ref, criteria)
                        .await
                        .map_err(StepError::from)
                })
                .await;
            let verdict = match reviewed {
                // A verdict always belongs to the round it judged
                Ok(verdict) => Verdict { round, ..verdict },
                Err(e) => return Ok(self.abort(task, e)),
            };

            self.history.append(&scenario, verdict.clone().into())?;
            self.emit(
                RunEvent::new(RunEventKind::VerdictRecorded, &scenario)
                    .with_round(round)
                    .with_data(json!({
                        "approved": verdict.approved,
                        "feedback": verdict.feedback,
                    })),
            )
            .await;

            match task.record_verdict(verdict.approved) {
                WorkflowState::Revising => {
                    feedback.push(verdict.feedback);
                    task.next_round();
                }
                state => {
                    tracing::info!(round, ?state, "Round loop finished");
                    return Ok(RoundsOutcome {
                        last_round: contributions,
                        failure: None,
                    });
                }
            }
        }
    }

    fn abort(&self, task: &mut Task, error: OrchestratorError) -> RoundsOutcome {
        tracing::error!(round = task.round(), "Run failed: {}", error);
        task.fail();
        RoundsOutcome {
            last_round: Vec::new(),
            failure: Some(error),
        }
    }

    /// Ask the extractor for action items. The outer `Result` carries
    /// history faults, the inner one exhausted retries.
    async fn extract(
        &self,
        task: &Task,
        extractor: &Participant,
        converged: &[Contribution],
    ) -> Result<Result<Vec<ActionItem>, OrchestratorError>, OrchestratorError> {
        let scenario = task.scenario();
        let round = task.round();
        let context = AgentContext::new(round).with_board(converged.to_vec());
        let agent = &extractor.agent;
        let context = &context;

        let extracted = self
            .call_with_retry(scenario, RunStep::Extraction, round, &extractor.id, || async move {
                let raw = agent.generate(prompts::EXTRACTION_TASK, context).await?;
                let items = parse_action_items(&raw)?;
                Ok::<_, StepError>((raw, items))
            })
            .await;
        let (raw, items) = match extracted {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Action item extraction failed: {}", e);
                return Ok(Err(e));
            }
        };

        let contribution = Contribution {
            round,
            agent: extractor.id.clone(),
            content: raw,
            index: converged.len() as u32,
        };
        self.history.append(scenario, contribution.into())?;
        self.emit(
            RunEvent::new(RunEventKind::ActionItemsExtracted, scenario)
                .with_round(round)
                .with_actor(&extractor.id)
                .with_data(json!({
                    "tools": items.iter().map(|i| i.tool.as_str()).collect::<Vec<_>>(),
                })),
        )
        .await;

        Ok(Ok(items))
    }

    /// Dispatch every item in order. A failing item never stops its siblings.
    async fn dispatch(
        &self,
        task: &Task,
        items: Vec<ActionItem>,
    ) -> Result<Vec<ToolCall>, OrchestratorError> {
        let scenario = task.scenario();
        let registry = self.tools.restricted_to(task.tools());
        let mut calls = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            let index = index as u32;
            let invoked = tokio::time::timeout(
                self.call_timeout,
                registry.invoke(&item.tool, item.params.clone(), index),
            )
            .await;
            let call = match invoked {
                Ok(call) => call,
                Err(_) => ToolCall::failed(
                    index,
                    &item.tool,
                    item.params,
                    ToolError::failed(format!(
                        "timed out after {}ms",
                        self.call_timeout.as_millis()
                    )),
                ),
            };

            if let Some(error) = &call.error {
                tracing::warn!(index, tool = %call.tool, "Tool call failed: {}", error);
            }

            self.history.append(scenario, call.clone().into())?;
            self.emit(
                RunEvent::new(RunEventKind::ToolInvoked, scenario)
                    .with_actor(&call.tool)
                    .with_data(json!({
                        "index": call.index,
                        "success": call.success,
                        "result": call.result,
                        "error": call.error.as_ref().map(|e| e.to_string()),
                    })),
            )
            .await;
            calls.push(call);
        }
        Ok(calls)
    }

    /// Call with the retry policy, bounding every attempt by the call timeout.
    async fn call_with_retry<T, F, Fut>(
        &self,
        scenario: &str,
        step: RunStep,
        round: u32,
        actor: &str,
        mut call: F,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let attempts = self.retry.attempts();
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(self.timeout_error(step)),
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if attempt >= attempts {
                return Err(OrchestratorError::RetriesExhausted {
                    step,
                    round,
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.retry.delay_after(attempt);
            tracing::warn!(
                %step,
                round,
                actor,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying call"
            );
            self.emit(
                RunEvent::new(RunEventKind::RetryScheduled, scenario)
                    .with_round(round)
                    .with_actor(actor)
                    .with_data(json!({
                        "step": step,
                        "attempt": attempt,
                        "delay_ms": delay.as_millis() as u64,
                        "error": error.to_string(),
                    })),
            )
            .await;

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    fn timeout_error(&self, step: RunStep) -> StepError {
        let timeout = AgentGenerationError::Timeout {
            elapsed_ms: self.call_timeout.as_millis() as u64,
        };
        match step {
            RunStep::Review => StepError::Moderation(ModerationError::Agent(timeout)),
            RunStep::Draft | RunStep::Extraction => StepError::Agent(timeout),
        }
    }

    async fn finish(
        &self,
        task: &Task,
        start: u64,
        outcome: RoundsOutcome,
        tool_calls: Vec<ToolCall>,
    ) -> Result<TerminalResult, OrchestratorError> {
        let history: Vec<HistoryRecord> = self
            .history
            .query(task.scenario())?
            .into_iter()
            .filter(|r| r.sequence > start)
            .collect();

        let final_contribution = (task.status() == TaskStatus::Converged).then(|| {
            AgentContext::new(task.round())
                .with_board(outcome.last_round)
                .board_text()
        });

        tracing::info!(
            status = %task.status(),
            rounds = task.round(),
            records = history.len(),
            tool_calls = tool_calls.len(),
            "Run finished"
        );
        self.emit(
            RunEvent::new(RunEventKind::RunFinished, task.scenario())
                .with_round(task.round())
                .with_data(json!({
                    "status": task.status(),
                    "rounds": task.round(),
                    "failure": outcome.failure.as_ref().map(|e| e.to_string()),
                })),
        )
        .await;

        Ok(TerminalResult {
            scenario: task.scenario().to_string(),
            status: task.status(),
            rounds: task.round(),
            history,
            final_contribution,
            tool_calls,
            failure: outcome.failure,
        })
    }
}
