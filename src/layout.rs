//! Layout data model.
//!
//! A [`Layout`] is a named template: an ordered set of field names with
//! their raw description strings (which embed the constraint notation the
//! Spec Parser understands), plus optional image-prompt boilerplate and a
//! tone guide. Layouts are read-only during a generation session.

use crate::spec::{parse_description, SpecSet};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// One field of a layout: name plus raw description string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutField {
    pub name: String,
    /// Raw description, e.g. `"Title (10/10/10)"` or `"Hashtags 15-20"`.
    pub description: String,
}

/// A layout template sourced from the external layout table.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Layout number extracted from the layout name column.
    pub number: u32,
    /// Field descriptions in table order.
    pub fields: Vec<LayoutField>,
    /// Image-prompt boilerplate for this content type, if any.
    pub image_prompt: Option<String>,
    /// Company tone and style guide text, if any.
    pub tone_guide: Option<String>,
}

/// Record columns that are metadata rather than field descriptions.
const META_COLUMNS: &[&str] = &[
    "Layout",
    "Layout Number",
    "AI",
    "DH Layout Description",
    "Image",
    "id",
    "createdTime",
];

fn layout_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)").unwrap())
}

impl Layout {
    /// Build a layout with just a number and fields.
    pub fn new(number: u32, fields: Vec<LayoutField>) -> Self {
        Self {
            number,
            fields,
            image_prompt: None,
            tone_guide: None,
        }
    }

    pub fn with_image_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.image_prompt = Some(prompt.into());
        self
    }

    pub fn with_tone_guide(mut self, tone: impl Into<String>) -> Self {
        self.tone_guide = Some(tone.into());
        self
    }

    /// Build a layout from a table record's field map.
    ///
    /// The layout number is the first integer in the `Layout` column value.
    /// Every other string-valued column that is not metadata becomes a
    /// field description. Returns `None` when the record has no parseable
    /// layout number.
    pub fn from_record(fields: &Value) -> Option<Self> {
        let map = fields.as_object()?;
        let layout_name = map.get("Layout")?.as_str()?;
        let number: u32 = layout_number_re()
            .captures(layout_name)?
            .get(1)?
            .as_str()
            .parse()
            .ok()?;

        let layout_fields = map
            .iter()
            .filter(|(name, _)| !META_COLUMNS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value.as_str().map(|desc| LayoutField {
                    name: name.clone(),
                    description: desc.to_string(),
                })
            })
            .collect();

        Some(Self::new(number, layout_fields))
    }

    /// Derive the spec set from this layout's field descriptions.
    ///
    /// Fields whose description matches neither notation contribute no
    /// spec and are left unconstrained.
    pub fn spec_set(&self) -> SpecSet {
        let mut set = SpecSet::new();
        for field in &self.fields {
            if let Some(spec) = parse_description(&field.description) {
                set.insert(&field.name, spec);
            }
        }
        set
    }

    /// Render the layout details block for the generation prompt.
    pub fn prompt_block(&self) -> String {
        let mut block = format!("**Details for Layout {}**\n", self.number);
        for field in &self.fields {
            block.push_str(&format!("- {}: {}\n", field.name, field.description));
        }
        block
    }
}

/// Filter layouts down to the selected layout numbers, keeping input order.
pub fn select_layouts(layouts: &[Layout], numbers: &[u32]) -> Vec<Layout> {
    layouts
        .iter()
        .filter(|l| numbers.contains(&l.number))
        .cloned()
        .collect()
}
