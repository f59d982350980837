//! Spec Parser: compact constraint notation to structured specifications.
//!
//! Layout field descriptions carry their structural constraints inline as
//! free text. Two notations are recognized:
//!
//! - **Range**: `"15-20"` -- a single line whose length must fall between
//!   the two numbers (inclusive bounds, lower and upper).
//! - **Slash**: `"(10/10/10)"` -- one number per required line, each an
//!   upper character limit with no lower bound.
//!
//! A description matching neither notation produces no [`FieldSpec`]; the
//! field is unconstrained and excluded from validation. Range notation is
//! checked first when both could apply.

use regex::Regex;
use std::sync::OnceLock;

/// Character bounds for one line of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBound {
    /// Maximum character count for this line (inclusive).
    pub upper: usize,
    /// Minimum character count, if the notation defined one.
    pub lower: Option<usize>,
}

/// Parsed structural constraint for one layout field.
///
/// Immutable once parsed: created when layout data is loaded, read-only
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    lines: Vec<LineBound>,
}

impl FieldSpec {
    /// Build a spec from per-line bounds. Empty bounds are rejected upstream
    /// by the parser, which returns `None` instead.
    pub fn new(lines: Vec<LineBound>) -> Self {
        Self { lines }
    }

    /// Exact number of newline-delimited lines the value must have.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Bounds for line `i` (0-based), if within the required line count.
    pub fn line(&self, i: usize) -> Option<&LineBound> {
        self.lines.get(i)
    }

    /// All per-line bounds in order.
    pub fn lines(&self) -> &[LineBound] {
        &self.lines
    }
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})\s*-\s*(\d{1,2})\b").unwrap())
}

fn slash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+(?:\s*/\s*\d+)*)\)").unwrap())
}

/// Parse a field description into a [`FieldSpec`].
///
/// Range notation wins when both notations appear in the same description.
/// Returns `None` when neither matches; the field is then unconstrained.
pub fn parse_description(description: &str) -> Option<FieldSpec> {
    if let Some(caps) = range_re().captures(description) {
        // Two 1-2 digit integers around a hyphen: single line, both bounds.
        let lower: usize = caps[1].parse().ok()?;
        let upper: usize = caps[2].parse().ok()?;
        return Some(FieldSpec::new(vec![LineBound {
            upper,
            lower: Some(lower),
        }]));
    }

    if let Some(caps) = slash_re().captures(description) {
        let bounds: Vec<LineBound> = caps[1]
            .split('/')
            .filter_map(|n| n.trim().parse::<usize>().ok())
            .map(|upper| LineBound { upper, lower: None })
            .collect();
        if !bounds.is_empty() {
            return Some(FieldSpec::new(bounds));
        }
    }

    None
}

/// Normalize a field key for spec matching: lowercase, spaces stripped.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One named spec derived from a layout field description.
#[derive(Debug, Clone)]
pub struct SpecEntry {
    /// Annotation key, `"{field name}_specs"`.
    pub key: String,
    /// The original field name the spec was parsed from.
    pub field: String,
    /// The parsed constraint.
    pub spec: FieldSpec,
}

/// Ordered collection of field specs for one layout.
///
/// Lookup normalizes the query key and returns the first entry whose
/// normalized annotation key contains it as a substring. Order follows the
/// layout's field order, so first match wins deterministically.
#[derive(Debug, Clone, Default)]
pub struct SpecSet {
    entries: Vec<SpecEntry>,
}

impl SpecSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec for a field, keyed as `"{field_name}_specs"`.
    pub fn insert(&mut self, field_name: &str, spec: FieldSpec) {
        self.entries.push(SpecEntry {
            key: format!("{}_specs", field_name),
            field: field_name.to_string(),
            spec,
        });
    }

    /// Find the spec for a produced field key. The query is normalized and
    /// matched by substring containment against each entry's normalized
    /// annotation key; first match wins.
    pub fn lookup(&self, field_key: &str) -> Option<&SpecEntry> {
        let needle = normalize_key(field_key);
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| normalize_key(&e.key).contains(&needle))
    }

    /// All entries in layout field order.
    pub fn entries(&self) -> &[SpecEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
