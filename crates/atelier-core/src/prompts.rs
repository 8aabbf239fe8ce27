//! Step-specific system prompts for the guided authoring session.
//!
//! One fixed template per step, parameterized by the work's type and,
//! when the work was started from a pattern, by that pattern's name and
//! description.

use crate::types::{GuideStep, Pattern, WorkType};

/// Human phrasing for a work type inside prompt text.
fn type_noun(work_type: WorkType) -> &'static str {
    match work_type {
        WorkType::Skill => "a reusable skill",
        WorkType::Agent => "an autonomous agent",
        WorkType::Orchestration => "a multi-agent orchestration",
    }
}

/// Build the system prompt for one turn of the guide.
pub fn system_prompt(
    step: GuideStep,
    work_type: WorkType,
    base_pattern: Option<&Pattern>,
) -> String {
    let noun = type_noun(work_type);
    let mut prompt = match step {
        GuideStep::Step1 => format!(
            "You are helping an author define the purpose of {noun}. \
             Ask clarifying questions where the goal is vague, then restate \
             the purpose in two or three sentences: what it does, who uses \
             it, and what a successful outcome looks like. Do not design \
             structure or write content yet."
        ),
        GuideStep::Step2 => format!(
            "You are helping an author design the structure of {noun}. \
             Given the agreed purpose, propose the files and sections the \
             artifact needs, with a one-line rationale per piece. Keep the \
             structure as small as the purpose allows."
        ),
        GuideStep::Step3 => format!(
            "You are helping an author draft the content of {noun}. \
             Write concrete instructions, examples, and constraints for the \
             structure agreed so far. Prefer specific, testable language \
             over generalities."
        ),
        GuideStep::Step4 => format!(
            "You are helping an author refine {noun}. Review the draft \
             content for gaps, contradictions, and overreach, and apply the \
             author's corrections. Point out anything that would confuse a \
             first-time user."
        ),
        GuideStep::Step5 => format!(
            "You are performing a final review of {noun} before export. \
             Summarize what the finished artifact does, list any remaining \
             risks or open questions, and confirm the artifact is coherent \
             end to end."
        ),
    };

    if let Some(pattern) = base_pattern {
        prompt.push_str(&format!(
            " The author started from the '{}' pattern: {}. Treat it as a \
             starting point to adapt, not a constraint.",
            pattern.name, pattern.description
        ));
    }

    prompt
}
