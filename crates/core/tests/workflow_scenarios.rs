//! End-to-end runs of the refinement loop and the tool workflow against
//! scripted agents, rule moderators and in-process stores.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

use roundtable_core::agents::{
    AgentCapability, AgentContext, AgentRole, Participant, ScriptedAgent,
};
use roundtable_core::config::RunConfig;
use roundtable_core::error::{
    AgentGenerationError, ModerationError, OrchestratorError, RunStep, StepError, ToolError,
};
use roundtable_core::history::{
    HistoryEntry, HistoryStore, InMemoryHistoryStore, SqliteHistoryStore,
};
use roundtable_core::moderator::{
    parse_verdict, ApprovalRule, Moderator, ModeratorConfig, Round, RuleModerator,
};
use roundtable_core::orchestration::{Orchestrator, RetryPolicy, Task, TaskStatus};
use roundtable_core::tools::{
    standard_registry, SimulatedCalendar, Tool, ToolParams, ToolRegistry,
};

fn scripted_roster() -> Vec<Participant> {
    vec![Participant::new(
        "ResearchBot",
        Arc::new(ScriptedAgent::per_round(["draft 1", "draft 2", "draft 3"])),
    )]
}

fn rule_orchestrator(rule: ApprovalRule, store: Arc<dyn HistoryStore>) -> Orchestrator {
    Orchestrator::new(scripted_roster(), Arc::new(RuleModerator::new(rule)), store)
        .with_retry(RetryPolicy::immediate(3))
}

/// Fails the first `failures` calls, then answers.
struct FlakyAgent {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyAgent {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AgentCapability for FlakyAgent {
    async fn generate(
        &self,
        _prompt: &str,
        context: &AgentContext,
    ) -> Result<String, AgentGenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(AgentGenerationError::RateLimited {
                reason: format!("call {}", call),
            })
        } else {
            Ok(format!("draft for round {}", context.round))
        }
    }
}

/// Answers garbage first, then a proper verdict.
struct MumblingModerator {
    calls: AtomicU32,
}

#[async_trait]
impl Moderator for MumblingModerator {
    async fn evaluate(
        &self,
        round: &Round,
        _criteria: &str,
    ) -> Result<roundtable_core::history::Verdict, ModerationError> {
        let raw = if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            "hmm, hard to say"
        } else {
            "CONCLUSION: fine"
        };
        parse_verdict(round.number, raw)
    }
}

struct Broken;

#[async_trait]
impl Tool for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn call(&self, _params: &ToolParams) -> Result<Value, ToolError> {
        Err(ToolError::failed("service unavailable"))
    }
}

struct Ok200;

#[async_trait]
impl Tool for Ok200 {
    fn name(&self) -> &str {
        "ok"
    }

    async fn call(&self, params: &ToolParams) -> Result<Value, ToolError> {
        Ok(json!({ "status": 200, "echo": params }))
    }
}

fn tool_orchestrator(plan: &str, tools: ToolRegistry) -> Orchestrator {
    rule_orchestrator(ApprovalRule::Always, Arc::new(InMemoryHistoryStore::new()))
        .with_tools(tools)
        .with_extractor(Participant::new(
            "ActionItemExtractor",
            Arc::new(ScriptedAgent::fixed(plan)),
        ))
}

#[tokio::test]
async fn approve_at_round_two_converges() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let result = rule_orchestrator(ApprovalRule::AtRound(2), store.clone())
        .run(Task::new("converge", "goal", 3).unwrap())
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    assert_eq!(result.rounds, 2);
    assert!(result.failure.is_none());
    assert_eq!(result.contributions().count(), 2);

    let verdicts: Vec<bool> = result.verdicts().map(|v| v.approved).collect();
    assert_eq!(verdicts, vec![false, true]);
    assert_eq!(store.query("converge").unwrap(), result.history);
}

#[tokio::test]
async fn approve_at_round_t_uses_exactly_t_rounds() {
    for t in 1..=4 {
        let result = rule_orchestrator(
            ApprovalRule::AtRound(t),
            Arc::new(InMemoryHistoryStore::new()),
        )
        .run(Task::new("exact", "goal", 4).unwrap())
        .await
        .unwrap();

        assert_eq!(result.status, TaskStatus::Converged);
        assert_eq!(result.rounds, t);
        assert_eq!(result.contributions().count(), t as usize);
        assert_eq!(result.verdicts().count(), t as usize);
    }
}

#[tokio::test]
async fn never_approve_exhausts_at_round_ceiling() {
    let result = rule_orchestrator(ApprovalRule::Never, Arc::new(InMemoryHistoryStore::new()))
        .run(Task::new("exhaust", "goal", 2).unwrap())
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Exhausted);
    assert_eq!(result.rounds, 2);
    assert_eq!(result.contributions().count(), 2);
    assert!(result.verdicts().all(|v| !v.approved));
    assert_eq!(result.verdicts().count(), 2);
    assert!(result.final_contribution.is_none());
}

#[tokio::test]
async fn round_numbers_increase_from_one_without_gaps() {
    let result = rule_orchestrator(ApprovalRule::Never, Arc::new(InMemoryHistoryStore::new()))
        .run(Task::new("rounds", "goal", 3).unwrap())
        .await
        .unwrap();

    let rounds: Vec<u32> = result
        .history
        .iter()
        .filter_map(|r| r.entry.round())
        .collect();
    assert_eq!(rounds, vec![1, 1, 2, 2, 3, 3]);

    let sequences: Vec<u64> = result.history.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);

    // Each verdict follows the contribution of its own round
    for pair in result.history.chunks(2) {
        match (&pair[0].entry, &pair[1].entry) {
            (HistoryEntry::Contribution(c), HistoryEntry::Verdict(v)) => assert_eq!(c.round, v.round),
            other => panic!("unexpected pair {:?}", other),
        }
    }
}

#[tokio::test]
async fn identical_runs_produce_identical_history() {
    let config = RunConfig {
        scenario: "capitals".to_string(),
        goal: "What is the capital of India?".to_string(),
        ..RunConfig::default()
    };

    let mut serialized = Vec::new();
    for _ in 0..2 {
        let store = Arc::new(InMemoryHistoryStore::new());
        let result = Orchestrator::from_config(&config, store.clone(), ToolRegistry::new())
            .run(config.task().unwrap())
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Converged);
        serialized.push(serde_json::to_vec(&store.query("capitals").unwrap()).unwrap());
    }

    assert_eq!(serialized[0], serialized[1]);
}

#[tokio::test]
async fn scenarios_on_independent_stores_never_interleave() {
    let store_a = Arc::new(InMemoryHistoryStore::new());
    let store_b = Arc::new(InMemoryHistoryStore::new());

    let orch_a = rule_orchestrator(ApprovalRule::AtRound(2), store_a.clone());
    let orch_b = rule_orchestrator(ApprovalRule::Never, store_b.clone());
    let (a, b) = tokio::join!(
        orch_a.run(Task::new("alpha", "goal", 3).unwrap()),
        orch_b.run(Task::new("beta", "goal", 3).unwrap()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.history.iter().all(|r| r.scenario == "alpha"));
    assert!(b.history.iter().all(|r| r.scenario == "beta"));
    assert!(store_a.query("beta").unwrap().is_empty());
    assert!(store_b.query("alpha").unwrap().is_empty());
    assert_eq!(store_a.query("alpha").unwrap().len(), 4);
    assert_eq!(store_b.query("beta").unwrap().len(), 6);
}

#[tokio::test]
async fn scenarios_sharing_a_store_keep_separate_sequences() {
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::open_in_memory().unwrap());

    rule_orchestrator(ApprovalRule::Never, store.clone())
        .run(Task::new("one", "goal", 2).unwrap())
        .await
        .unwrap();
    rule_orchestrator(ApprovalRule::Always, store.clone())
        .run(Task::new("two", "goal", 2).unwrap())
        .await
        .unwrap();

    let one: Vec<u64> = store.query("one").unwrap().iter().map(|r| r.sequence).collect();
    let two: Vec<u64> = store.query("two").unwrap().iter().map(|r| r.sequence).collect();
    assert_eq!(one, vec![1, 2, 3, 4]);
    assert_eq!(two, vec![1, 2]);
}

#[tokio::test]
async fn transient_agent_failures_are_retried() {
    let roster = vec![Participant::new("Flaky", Arc::new(FlakyAgent::new(2)))];
    let result = Orchestrator::new(
        roster,
        Arc::new(RuleModerator::new(ApprovalRule::Always)),
        Arc::new(InMemoryHistoryStore::new()),
    )
    .with_retry(RetryPolicy::immediate(3))
    .run(Task::new("flaky", "goal", 2).unwrap())
    .await
    .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    assert_eq!(result.history.len(), 2);
    assert_eq!(
        result.contributions().next().unwrap().content,
        "draft for round 1"
    );
}

#[tokio::test]
async fn exhausted_retries_fail_the_task() {
    let roster = vec![Participant::new("Flaky", Arc::new(FlakyAgent::new(10)))];
    let store = Arc::new(InMemoryHistoryStore::new());
    let result = Orchestrator::new(
        roster,
        Arc::new(RuleModerator::new(ApprovalRule::Always)),
        store.clone(),
    )
    .with_retry(RetryPolicy::immediate(3))
    .run(Task::new("doomed", "goal", 2).unwrap())
    .await
    .unwrap();

    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.rounds, 1);
    assert!(store.query("doomed").unwrap().is_empty());
    match result.failure {
        Some(OrchestratorError::RetriesExhausted {
            step,
            round,
            attempts,
            last_error,
        }) => {
            assert_eq!(step, RunStep::Draft);
            assert_eq!(round, 1);
            assert_eq!(attempts, 3);
            assert_eq!(
                last_error,
                StepError::Agent(AgentGenerationError::RateLimited {
                    reason: "call 3".to_string()
                })
            );
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn moderator_parse_failures_are_retried() {
    let result = Orchestrator::new(
        scripted_roster(),
        Arc::new(MumblingModerator {
            calls: AtomicU32::new(0),
        }),
        Arc::new(InMemoryHistoryStore::new()),
    )
    .with_retry(RetryPolicy::immediate(2))
    .run(Task::new("mumble", "goal", 1).unwrap())
    .await
    .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    assert_eq!(result.verdicts().count(), 1);
}

#[tokio::test]
async fn unknown_tool_does_not_abort_siblings() {
    let plan = r#"[
        {"tool": "ok", "params": {"n": 1}},
        {"tool": "teleport", "params": {}},
        {"tool": "ok", "params": {"n": 3}}
    ]"#;
    let registry = ToolRegistry::new().with_tool(Arc::new(Ok200));
    let result = tool_orchestrator(plan, registry)
        .run_with_tools(Task::new("tools", "goal", 1).unwrap().with_tools(["ok", "teleport"]))
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    let outcomes: Vec<bool> = result.tool_calls.iter().map(|c| c.success).collect();
    assert_eq!(outcomes, vec![true, false, true]);
    assert_eq!(
        result.tool_calls[1].error,
        Some(ToolError::NotFound {
            name: "teleport".to_string()
        })
    );
}

#[tokio::test]
async fn failing_middle_item_is_recorded_and_siblings_run() {
    let plan = r#"[
        {"tool": "ok", "params": {"n": 1}},
        {"tool": "broken", "params": {"n": 2}},
        {"tool": "ok", "params": {"n": 3}}
    ]"#;
    let registry = ToolRegistry::new()
        .with_tool(Arc::new(Ok200))
        .with_tool(Arc::new(Broken));
    let result = tool_orchestrator(plan, registry)
        .run_with_tools(Task::new("partial", "goal", 1).unwrap().with_tools(["ok", "broken"]))
        .await
        .unwrap();

    assert_eq!(result.tool_calls.len(), 3);
    assert!(result.tool_calls[0].success);
    assert!(!result.tool_calls[1].success);
    assert!(matches!(
        result.tool_calls[1].error,
        Some(ToolError::ExecutionFailure { .. })
    ));
    assert!(result.tool_calls[2].success);
    assert_eq!(result.tool_calls[2].params["n"], json!(3));

    // contribution, verdict, extractor contribution, 3 tool calls
    let kinds: Vec<&str> = result.history.iter().map(|r| r.entry.kind()).collect();
    assert_eq!(
        kinds,
        vec!["contribution", "verdict", "contribution", "tool_call", "tool_call", "tool_call"]
    );
}

#[tokio::test]
async fn oversized_calendar_duration_fails_only_its_item() {
    let plan = r#"[
        {"tool": "find_calendar_slot", "params": {"duration_minutes": 100000000000000}},
        {"tool": "find_calendar_slot", "params": {"duration_minutes": 45}}
    ]"#;
    let registry = standard_registry(Arc::new(SimulatedCalendar::default()));
    let result = tool_orchestrator(plan, registry)
        .run_with_tools(
            Task::new("oversized", "goal", 1)
                .unwrap()
                .with_tools(["find_calendar_slot"]),
        )
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    assert_eq!(result.tool_calls.len(), 2);
    assert!(matches!(
        result.tool_calls[0].error,
        Some(ToolError::InvalidParams { ref field, .. }) if field == "duration_minutes"
    ));
    assert!(result.tool_calls[1].success);
    assert_eq!(result.tool_calls[1].result, Some(json!("2025-01-06 12:00")));
}

#[tokio::test]
async fn tools_outside_the_task_tool_set_are_not_found() {
    let plan = r#"[{"tool": "ok", "params": {}}]"#;
    let registry = ToolRegistry::new().with_tool(Arc::new(Ok200));
    let result = tool_orchestrator(plan, registry)
        .run_with_tools(Task::new("restricted", "goal", 1).unwrap())
        .await
        .unwrap();

    assert!(matches!(
        result.tool_calls[0].error,
        Some(ToolError::NotFound { .. })
    ));
}

#[tokio::test]
async fn failed_extraction_keeps_converged_status() {
    let result = tool_orchestrator("I would rather not.", ToolRegistry::new())
        .run_with_tools(Task::new("no-plan", "goal", 1).unwrap())
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    assert!(result.tool_calls.is_empty());
    assert!(matches!(
        result.failure,
        Some(OrchestratorError::RetriesExhausted {
            step: RunStep::Extraction,
            ..
        })
    ));
    assert_eq!(result.history.len(), 2);
}

#[tokio::test]
async fn exhausted_run_skips_tool_workflow() {
    let result = rule_orchestrator(ApprovalRule::Never, Arc::new(InMemoryHistoryStore::new()))
        .with_extractor(Participant::new(
            "ActionItemExtractor",
            Arc::new(ScriptedAgent::fixed(r#"[{"tool": "ok"}]"#)),
        ))
        .run_with_tools(Task::new("stalled", "goal", 1).unwrap())
        .await
        .unwrap();

    assert_eq!(result.status, TaskStatus::Exhausted);
    assert!(result.tool_calls.is_empty());
}

#[tokio::test]
async fn schedule_scenario_books_the_budget_meeting() {
    let calendar = Arc::new(SimulatedCalendar::default());
    let config = RunConfig {
        scenario: "schedule".to_string(),
        goal: format!(
            "Summarize this meeting.\n\nTranscript:\n{}",
            roundtable_core::tools::sample_transcript("q4-planning")
        ),
        max_rounds: 1,
        tools: vec![
            "find_calendar_slot".to_string(),
            "book_calendar_event".to_string(),
        ],
        roster: vec![AgentRole::TranscriptSummarizer],
        extractor: Some(AgentRole::ActionItemExtractor),
        moderator: ModeratorConfig::Rule {
            rule: ApprovalRule::Always,
        },
        ..RunConfig::default()
    };

    let result = Orchestrator::from_config(
        &config,
        Arc::new(InMemoryHistoryStore::new()),
        standard_registry(calendar.clone()),
    )
    .run_with_tools(config.task().unwrap())
    .await
    .unwrap();

    assert_eq!(result.status, TaskStatus::Converged);
    assert_eq!(result.tool_calls.len(), 2);
    assert!(result.tool_calls.iter().all(|c| c.success));
    assert_eq!(result.tool_calls[0].result, Some(json!("2025-01-06 12:00")));

    let bookings = calendar.bookings().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].title, "Finalize Q4 Budget");
}

#[tokio::test]
async fn sqlite_history_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.db");

    {
        let store = Arc::new(SqliteHistoryStore::open_at(&path).unwrap());
        rule_orchestrator(ApprovalRule::Never, store)
            .run(Task::new("persisted", "goal", 2).unwrap())
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteHistoryStore::open_at(&path).unwrap());
    let result = rule_orchestrator(ApprovalRule::Always, store.clone())
        .run(Task::new("persisted", "goal", 2).unwrap())
        .await
        .unwrap();

    let sequences: Vec<u64> = result.history.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![5, 6]);
    assert_eq!(store.query("persisted").unwrap().len(), 6);
}
