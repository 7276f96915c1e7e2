//! Console output for runs and history.

use tokio::sync::mpsc;

use roundtable_core::history::{HistoryEntry, HistoryRecord};
use roundtable_core::orchestration::{RunEvent, RunEventKind, TaskStatus, TerminalResult};

pub fn header(title: &str) {
    let bar = "═".repeat(title.chars().count() + 2);
    println!("\n╔{}╗", bar);
    println!("║ {} ║", title);
    println!("╚{}╝", bar);
}

/// Print progress until the sending side closes.
pub async fn print_events(mut rx: mpsc::Receiver<RunEvent>) {
    while let Some(event) = rx.recv().await {
        let round = event.round.unwrap_or_default();
        let actor = event.actor.as_deref().unwrap_or("?");
        let data = event.data.unwrap_or_default();

        match event.kind {
            RunEventKind::RunStarted => {}
            RunEventKind::RoundStarted => println!("\n--- Round {} ---", round),
            RunEventKind::ContributionRecorded => println!("  ✓ {} contributed", actor),
            RunEventKind::VerdictRecorded => {
                if data["approved"].as_bool().unwrap_or(false) {
                    println!("  ✅ Moderator approved round {}", round);
                } else {
                    println!("  ↻ Moderator requested another round");
                }
            }
            RunEventKind::RetryScheduled => println!(
                "  ⚠ {} failed (attempt {}), retrying: {}",
                actor,
                data["attempt"],
                data["error"].as_str().unwrap_or_default()
            ),
            RunEventKind::ActionItemsExtracted => {
                let count = data["tools"].as_array().map(Vec::len).unwrap_or(0);
                println!("  📋 {} extracted {} action item(s)", actor, count);
            }
            RunEventKind::ToolInvoked => {
                if data["success"].as_bool().unwrap_or(false) {
                    println!("  🔧 {} → {}", actor, data["result"]);
                } else {
                    println!(
                        "  ❌ {} failed: {}",
                        actor,
                        data["error"].as_str().unwrap_or_default()
                    );
                }
            }
            RunEventKind::RunFinished => {}
        }
    }
}

pub fn record(record: &HistoryRecord) {
    match &record.entry {
        HistoryEntry::Contribution(c) => {
            println!("\n▶ #{} [{} - Round {}]", record.sequence, c.agent, c.round);
            for line in c.content.lines() {
                println!("  {}", line);
            }
        }
        HistoryEntry::Verdict(v) => {
            let decision = if v.approved { "approved" } else { "revise" };
            match v.score {
                Some(score) => println!(
                    "\n▶ #{} [Moderator - Round {}] {} (score {:.2})",
                    record.sequence, v.round, decision, score
                ),
                None => println!(
                    "\n▶ #{} [Moderator - Round {}] {}",
                    record.sequence, v.round, decision
                ),
            }
            if !v.feedback.is_empty() {
                println!("  {}", v.feedback);
            }
        }
        HistoryEntry::ToolCall(t) => {
            println!(
                "\n▶ #{} [Tool {} - item {}] {}",
                record.sequence,
                t.tool,
                t.index,
                if t.success { "ok" } else { "failed" }
            );
            println!("  params: {}", serde_json::Value::Object(t.params.clone()));
            if let Some(result) = &t.result {
                println!("  result: {}", result);
            }
            if let Some(error) = &t.error {
                println!("  error: {}", error);
            }
        }
    }
}

pub fn terminal(result: &TerminalResult) {
    header("FINAL REPORT");
    println!("Scenario: {}", result.scenario);
    println!("Status:   {}", result.status);
    println!("Rounds:   {}", result.rounds);
    println!("Records:  {}", result.history.len());

    match (&result.final_contribution, result.status) {
        (Some(text), _) => {
            println!("\n{}", text);
        }
        (None, TaskStatus::Exhausted) => {
            println!("\nNo conclusion reached after maximum rounds.");
        }
        _ => {}
    }

    if !result.tool_calls.is_empty() {
        println!();
        for call in &result.tool_calls {
            match (&call.result, &call.error) {
                (Some(value), _) => println!("  ✓ {} → {}", call.tool, value),
                (None, Some(error)) => println!("  ✗ {}: {}", call.tool, error),
                (None, None) => println!("  ✓ {}", call.tool),
            }
        }
    }

    if let Some(failure) = &result.failure {
        eprintln!("\n❌ {}", failure);
    }
}
