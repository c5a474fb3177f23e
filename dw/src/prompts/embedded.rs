//! Embedded prompts
//!
//! Compiled into the binary from the `.pmt` files at build time.

use tracing::debug;

pub const SYSTEM_TOPIC: &str = include_str!("../../prompts/system-topic.pmt");
pub const TOPIC_ANALYSIS: &str = include_str!("../../prompts/topic-analysis.pmt");
pub const SYSTEM_TOPIC_REFINE: &str = include_str!("../../prompts/system-topic-refine.pmt");
pub const TOPIC_REFINE: &str = include_str!("../../prompts/topic-refine.pmt");
pub const SYSTEM_OUTLINE: &str = include_str!("../../prompts/system-outline.pmt");
pub const OUTLINE_GENERATE: &str = include_str!("../../prompts/outline-generate.pmt");
pub const SYSTEM_OUTLINE_MODIFY: &str = include_str!("../../prompts/system-outline-modify.pmt");
pub const OUTLINE_MODIFY: &str = include_str!("../../prompts/outline-modify.pmt");
pub const SYSTEM_INTERVIEW: &str = include_str!("../../prompts/system-interview.pmt");
pub const INTERVIEW_QUESTION: &str = include_str!("../../prompts/interview-question.pmt");
pub const SYSTEM_ANALYSIS: &str = include_str!("../../prompts/system-analysis.pmt");
pub const PROBE_DECISION: &str = include_str!("../../prompts/probe-decision.pmt");
pub const SYSTEM_STRATEGIST: &str = include_str!("../../prompts/system-strategist.pmt");
pub const MAX_PROBES: &str = include_str!("../../prompts/max-probes.pmt");
pub const SYSTEM_EXPERT: &str = include_str!("../../prompts/system-expert.pmt");
pub const AUTOPILOT_ANSWER: &str = include_str!("../../prompts/autopilot-answer.pmt");
pub const FEEDBACK_ANALYSIS: &str = include_str!("../../prompts/feedback-analysis.pmt");
pub const SYSTEM_DRAFT: &str = include_str!("../../prompts/system-draft.pmt");
pub const DRAFT_GENERATE: &str = include_str!("../../prompts/draft-generate.pmt");
pub const SYSTEM_REVISION: &str = include_str!("../../prompts/system-revision.pmt");
pub const DRAFT_REVISE: &str = include_str!("../../prompts/draft-revise.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    let found = match name {
        "system-topic" => SYSTEM_TOPIC,
        "topic-analysis" => TOPIC_ANALYSIS,
        "system-topic-refine" => SYSTEM_TOPIC_REFINE,
        "topic-refine" => TOPIC_REFINE,
        "system-outline" => SYSTEM_OUTLINE,
        "outline-generate" => OUTLINE_GENERATE,
        "system-outline-modify" => SYSTEM_OUTLINE_MODIFY,
        "outline-modify" => OUTLINE_MODIFY,
        "system-interview" => SYSTEM_INTERVIEW,
        "interview-question" => INTERVIEW_QUESTION,
        "system-analysis" => SYSTEM_ANALYSIS,
        "probe-decision" => PROBE_DECISION,
        "system-strategist" => SYSTEM_STRATEGIST,
        "max-probes" => MAX_PROBES,
        "system-expert" => SYSTEM_EXPERT,
        "autopilot-answer" => AUTOPILOT_ANSWER,
        "feedback-analysis" => FEEDBACK_ANALYSIS,
        "system-draft" => SYSTEM_DRAFT,
        "draft-generate" => DRAFT_GENERATE,
        "system-revision" => SYSTEM_REVISION,
        "draft-revise" => DRAFT_REVISE,
        _ => {
            debug!("get_embedded: no match found");
            return None;
        }
    };
    Some(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_outline() {
        let outline = get_embedded("system-outline").unwrap();
        assert!(outline.contains("Return ONLY valid JSON"));
        assert!(outline.contains("{{content_type}}"));
    }

    #[test]
    fn test_question_format_markers() {
        let question = get_embedded("interview-question").unwrap();
        assert!(question.contains("QUESTION:"));
        assert!(question.contains("RATIONALE:"));
        assert!(question.contains("EXAMPLE ANSWER:"));
    }

    #[test]
    fn test_decision_prompts_demand_bare_answers() {
        assert!(get_embedded("probe-decision").unwrap().contains("only 'yes' or 'no'"));
        assert!(get_embedded("max-probes").unwrap().contains("ONLY a number between 1 and 5"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
