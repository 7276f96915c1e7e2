//! Default prompt templates bundled at compile time.
//!
//! System prompts live in `defaults/*.md`. Task prompts for the fixed
//! workflow steps (evaluation, extraction) are built here.

/// ResearchBot - factual drafting
pub const RESEARCH: &str = include_str!("defaults/research.md");

/// CreativeBot - narrative drafting
pub const CREATIVE: &str = include_str!("defaults/creative.md");

/// AnalysisBot - board summary and gap analysis
pub const ANALYSIS: &str = include_str!("defaults/analysis.md");

/// Moderator - approve or request another round
pub const MODERATOR: &str = include_str!("defaults/moderator.md");

/// TranscriptSummarizer - meeting summaries
pub const TRANSCRIPT_SUMMARIZER: &str = include_str!("defaults/transcript_summarizer.md");

/// ActionItemExtractor - plan to tool calls
pub const ACTION_ITEM_EXTRACTOR: &str = include_str!("defaults/action_item_extractor.md");

/// Task prompt handed to the extraction agent after convergence.
pub const EXTRACTION_TASK: &str = "Based on the approved contributions, list every follow-up \
action item that requires a tool. Respond with only the JSON array of tool calls.";

/// Task prompt for a model-backed moderator.
pub fn evaluation_prompt(criteria: &str, round: u32) -> String {
    format!(
        "Evaluate round {} of the board against these criteria:\n{}\n\n\
         Answer with CONCLUSION: or NEXT_STEP: as instructed.",
        round, criteria
    )
}

/// All default system prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("research", RESEARCH),
        ("creative", CREATIVE),
        ("analysis", ANALYSIS),
        ("moderator", MODERATOR),
        ("transcript_summarizer", TRANSCRIPT_SUMMARIZER),
        ("action_item_extractor", ACTION_ITEM_EXTRACTOR),
    ]
}
