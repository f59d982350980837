//! Validator: grouped values against their field specs.
//!
//! Produces one [`Evaluation`] per (key, variation index). A failing
//! evaluation carries a [`RepairReason`] whose message is a natural-language
//! repair instruction, reused verbatim as part of the next repair prompt.
//! The instructions deliberately permit meaning drift: the end use is
//! graphic-design text that must fit a fixed visual slot, so fit beats
//! accuracy.
//!
//! Check order per value:
//! 1. absent or empty text -> missing key (terminal for the repair cycle,
//!    the orchestrator regenerates instead of patching)
//! 2. line count vs spec
//! 3. per line, only while the line exists: over upper bound, then under
//!    lower bound. The first character violation short-circuits the rest
//!    and its reason overwrites any line-count reason.
//! 4. fewer lines than required -> insufficient lines
//!
//! Fields whose key has no matching spec are skipped entirely and reported
//! back as unconstrained so callers can flag them.

use crate::group::GroupedField;
use crate::spec::{FieldSpec, SpecSet};

/// Why a value failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonKind {
    /// Line count differs from the spec.
    WrongLineCount,
    /// A line exceeds its upper character bound.
    TooLong,
    /// A line falls below its lower character bound.
    TooShort,
    /// The value has fewer lines than the spec requires.
    InsufficientLines,
    /// The field is entirely absent from the generated content.
    MissingKey,
}

/// A validation failure with its model-facing repair instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReason {
    pub kind: ReasonKind,
    /// Natural-language instruction, re-injected into the repair prompt.
    pub message: String,
}

/// Verdict for one value at one variation index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub key: String,
    pub index: usize,
    /// The evaluated text; `None` for a synthesized missing entry.
    pub text: Option<String>,
    pub meets_line_count: bool,
    pub meets_character_criteria: bool,
    /// Present iff either boolean is false.
    pub reason: Option<RepairReason>,
    /// Required line count from the spec, for repair prompt framing.
    pub line_count: usize,
}

impl Evaluation {
    /// Whether this value met its spec in full.
    pub fn passed(&self) -> bool {
        self.meets_line_count && self.meets_character_criteria
    }

    /// Whether the failure is a missing field (regenerate, don't patch).
    pub fn is_missing(&self) -> bool {
        matches!(
            self.reason,
            Some(RepairReason {
                kind: ReasonKind::MissingKey,
                ..
            })
        )
    }
}

fn missing_reason() -> RepairReason {
    RepairReason {
        kind: ReasonKind::MissingKey,
        message: "The specified key is missing from the generated content, \
                  which should be formatted with the required number of lines."
            .to_string(),
    }
}

/// Evaluate one value against a spec.
///
/// `text = None` or empty text is treated as missing. Deterministic: the
/// same inputs always yield the same verdict.
pub fn evaluate_value(
    key: &str,
    index: usize,
    text: Option<&str>,
    spec: &FieldSpec,
) -> Evaluation {
    let line_count = spec.line_count();

    let Some(value) = text.filter(|t| !t.is_empty()) else {
        return Evaluation {
            key: key.to_string(),
            index,
            text: None,
            meets_line_count: false,
            meets_character_criteria: false,
            reason: Some(missing_reason()),
            line_count,
        };
    };

    let lines: Vec<&str> = value.split('\n').collect();
    let meets_line_count = lines.len() == line_count;
    let mut reason = if meets_line_count {
        None
    } else {
        Some(RepairReason {
            kind: ReasonKind::WrongLineCount,
            message: format!(
                "Wrong number of lines - please rewrite this text so it is on \
                 {} lines, but keep the general meaning the same:",
                line_count
            ),
        })
    };

    let mut meets_character_criteria = true;
    for i in 0..line_count {
        let Some(line) = lines.get(i) else {
            meets_character_criteria = false;
            reason = Some(RepairReason {
                kind: ReasonKind::InsufficientLines,
                message: format!(
                    "This text has {} lines but needs {}. Please rewrite it on \
                     exactly {} lines, keeping the general meaning the same.",
                    lines.len(),
                    line_count,
                    line_count
                ),
            });
            break;
        };

        let bound = match spec.line(i) {
            Some(b) => b,
            None => break,
        };
        let length = line.chars().count();

        if length > bound.upper {
            meets_character_criteria = false;
            reason = Some(RepairReason {
                kind: ReasonKind::TooLong,
                message: format!(
                    "Say something like this, with only 2 words. You can change \
                     the meaning if you need to. If you want to remove a word, \
                     do it. This is for a graphic design, so we're just trying \
                     to communicate the general theme. It doesn't need to be \
                     exact. Return your new text, on {} lines.",
                    line_count
                ),
            });
            break;
        }

        if let Some(lower) = bound.lower {
            if length < lower {
                let deficit = lower - length;
                meets_character_criteria = false;
                reason = Some(RepairReason {
                    kind: ReasonKind::TooShort,
                    message: format!(
                        "Add 1 word (about {} characters) to this text. If there \
                         are line breaks, keep them. Return only the adjusted \
                         text, on {} lines.",
                        deficit, line_count
                    ),
                });
                break;
            }
        }
    }

    Evaluation {
        key: key.to_string(),
        index,
        text: Some(value.to_string()),
        meets_line_count,
        meets_character_criteria,
        reason,
        line_count,
    }
}

/// Evaluate every value of one grouped field against its spec.
pub fn evaluate_group(group: &GroupedField, spec: &FieldSpec) -> Vec<Evaluation> {
    group
        .values
        .iter()
        .enumerate()
        .map(|(index, value)| evaluate_value(&group.key, index, Some(value), spec))
        .collect()
}

/// Result of a full validation pass over one layout's grouped fields.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// One evaluation per (key, index), in grouped-field order, plus one
    /// synthesized missing entry per spec'd field with no grouped values.
    pub evaluations: Vec<Evaluation>,
    /// Keys present in the output but with no parseable spec. These pass
    /// unconditionally; the list exists so callers can flag them.
    pub unconstrained: Vec<String>,
}

impl ValidationReport {
    /// Evaluations still carrying a repair reason.
    pub fn failing(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| e.reason.is_some())
    }

    pub fn failing_count(&self) -> usize {
        self.failing().count()
    }

    /// Whether every spec'd value passed.
    pub fn is_clean(&self) -> bool {
        self.failing_count() == 0
    }

    /// Whether any failure is a missing field.
    pub fn has_missing_key(&self) -> bool {
        self.evaluations.iter().any(Evaluation::is_missing)
    }
}

/// Run a validation pass: every grouped field against the spec set, plus a
/// synthesized missing entry for every spec'd field the output lacks.
pub fn evaluate_all(groups: &[GroupedField], specs: &SpecSet) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut matched = vec![false; specs.len()];

    for group in groups {
        match specs.lookup(&group.key) {
            Some(entry) => {
                if let Some(pos) = specs
                    .entries()
                    .iter()
                    .position(|e| std::ptr::eq(e, entry))
                {
                    matched[pos] = true;
                }
                report
                    .evaluations
                    .extend(evaluate_group(group, &entry.spec));
            }
            None => report.unconstrained.push(group.key.clone()),
        }
    }

    // Spec'd fields the extraction never produced
    for (pos, entry) in specs.entries().iter().enumerate() {
        if !matched[pos] {
            report
                .evaluations
                .push(evaluate_value(&entry.field, 0, None, &entry.spec));
        }
    }

    report
}
