//! Repair Planner: validation failures to a flat work list.
//!
//! Pure data transformation, no model calls. Missing-key failures are
//! excluded: no local repair instruction can conjure an entirely absent
//! field, so the orchestrator handles those with full regeneration.

use crate::validate::{Evaluation, ReasonKind};

/// One targeted repair to send to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairTask {
    /// Field key to merge the result back into.
    pub key: String,
    /// Variation index to merge the result back into.
    pub index: usize,
    /// Required line count, repeated in the prompt.
    pub line_count: usize,
    /// Full model-facing repair prompt.
    pub prompt: String,
}

/// Collect a repair task for every evaluation carrying a reason, except
/// missing keys.
///
/// The prompt is the repair instruction, a separator, the offending text,
/// then an explicit instruction to return only the corrected text on the
/// required number of lines.
pub fn plan_repairs(evaluations: &[Evaluation]) -> Vec<RepairTask> {
    evaluations
        .iter()
        .filter_map(|eval| {
            let reason = eval.reason.as_ref()?;
            if reason.kind == ReasonKind::MissingKey {
                return None;
            }
            let text = eval.text.as_deref().unwrap_or("");
            Some(RepairTask {
                key: eval.key.clone(),
                index: eval.index,
                line_count: eval.line_count,
                prompt: format!(
                    "{}\n\n---------\n\n{}\n\nPlease return your new text, on {} lines.",
                    reason.message, text, eval.line_count
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_description;
    use crate::validate::evaluate_value;

    #[test]
    fn test_plan_skips_passing_values() {
        let spec = parse_description("(10)").unwrap();
        let evals = vec![
            evaluate_value("Title", 0, Some("Fine"), &spec),
            evaluate_value("Title", 1, Some("Much too long here"), &spec),
        ];

        let tasks = plan_repairs(&evals);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].key, "Title");
        assert_eq!(tasks[0].index, 1);
        assert_eq!(tasks[0].line_count, 1);
    }

    #[test]
    fn test_plan_skips_missing_keys() {
        let spec = parse_description("(10)").unwrap();
        let evals = vec![evaluate_value("Subtitle", 0, None, &spec)];
        assert!(plan_repairs(&evals).is_empty());
    }

    #[test]
    fn test_prompt_carries_reason_text_and_line_count() {
        let spec = parse_description("(5/5)").unwrap();
        let evals = vec![evaluate_value("Title", 0, Some("way too long\nok"), &spec)];

        let tasks = plan_repairs(&evals);
        assert_eq!(tasks.len(), 1);
        let prompt = &tasks[0].prompt;
        assert!(prompt.contains("way too long\nok"));
        assert!(prompt.contains("---------"));
        assert!(prompt.ends_with("Please return your new text, on 2 lines."));
    }

    #[test]
    fn test_plan_preserves_evaluation_order() {
        let spec = parse_description("(3)").unwrap();
        let evals = vec![
            evaluate_value("A", 0, Some("long enough"), &spec),
            evaluate_value("B", 0, Some("also long"), &spec),
        ];
        let tasks = plan_repairs(&evals);
        assert_eq!(tasks[0].key, "A");
        assert_eq!(tasks[1].key, "B");
    }
}
