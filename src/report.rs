//! Output artifact formatting.
//!
//! The final accepted (or best-effort) text is rendered as plain
//! `"{key} {index}: {value}"` lines per layout, separated by dashed rules,
//! suitable for plain-text or RTF export. Fields that still failed their
//! spec are listed so partial output stays visible rather than silent.

use crate::session::{BatchItem, LayoutOutcome};
use std::fmt::Write;

const RULE: &str = "------------------------------";

/// Render one layout outcome.
pub fn render_outcome(outcome: &LayoutOutcome) -> String {
    let mut out = format!("Generated Response for Layout {}:\n", outcome.layout);

    for group in &outcome.grouped {
        for (index, value) in group.values.iter().enumerate() {
            let _ = writeln!(out, "{} {}: {}", group.key, index, value);
        }
    }

    if !outcome.clean {
        let _ = writeln!(out, "\nFields not meeting spec:");
        for eval in &outcome.failing {
            let what = match &eval.reason {
                Some(reason) => reason.message.as_str(),
                None => "unknown",
            };
            let _ = writeln!(out, "- {} {}: {}", eval.key, eval.index, what);
        }
    }

    out.push_str(RULE);
    out.push('\n');
    out
}

/// Render a whole batch, including failed layouts.
pub fn render_batch(items: &[BatchItem]) -> String {
    let mut out = String::new();
    for item in items {
        match &item.result {
            Ok(outcome) => out.push_str(&render_outcome(outcome)),
            Err(e) => {
                let _ = writeln!(out, "Layout {} failed: {}\n{}", item.layout, e, RULE);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupedField;
    use crate::spec::parse_description;
    use crate::validate::evaluate_value;
    use crate::CopyfitError;

    fn outcome(clean: bool) -> LayoutOutcome {
        LayoutOutcome {
            layout: 4,
            grouped: vec![GroupedField {
                key: "Title".to_string(),
                values: vec!["Join us".to_string(), "We're hiring".to_string()],
            }],
            clean,
            attempts: 1,
            iterations: 0,
            failing: Vec::new(),
            unconstrained: Vec::new(),
        }
    }

    #[test]
    fn test_render_key_index_value_lines() {
        let text = render_outcome(&outcome(true));

        assert!(text.starts_with("Generated Response for Layout 4:\n"));
        assert!(text.contains("Title 0: Join us\n"));
        assert!(text.contains("Title 1: We're hiring\n"));
        assert!(text.ends_with(&format!("{}\n", RULE)));
        assert!(!text.contains("not meeting spec"));
    }

    #[test]
    fn test_render_best_effort_lists_failures() {
        let spec = parse_description("(5)").unwrap();
        let mut o = outcome(false);
        o.failing = vec![evaluate_value("Title", 0, Some("too long here"), &spec)];

        let text = render_outcome(&o);
        assert!(text.contains("Fields not meeting spec:"));
        assert!(text.contains("- Title 0:"));
    }

    #[test]
    fn test_render_batch_includes_failed_layouts() {
        let items = vec![
            BatchItem {
                layout: 4,
                result: Ok(outcome(true)),
            },
            BatchItem {
                layout: 7,
                result: Err(CopyfitError::LayoutFailed {
                    layout: 7,
                    message: "no validated generation after 3 attempts".to_string(),
                }),
            },
        ];

        let text = render_batch(&items);
        assert!(text.contains("Generated Response for Layout 4:"));
        assert!(text.contains("Layout 7 failed:"));
    }
}
