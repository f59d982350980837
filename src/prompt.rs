//! Prompt Assembler: composes the model-facing generation prompt.
//!
//! The prompt stacks the company tone guide, the user's topic, the
//! image-prompt boilerplate, and the layout's field details, then asks for
//! the desired number of variations. `{key}` placeholders anywhere in the
//! assembled text are substituted from the execution context's variables.

use std::collections::HashMap;

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// Separator between prompt sections.
const SECTION_SEPARATOR: &str = "\n\n--------------\n\n";

/// Substitute `{key}` placeholders in a template with variable values.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use copyfit::prompt::render;
/// use std::collections::HashMap;
///
/// let mut vars = HashMap::new();
/// vars.insert("brand".to_string(), "Acme".to_string());
/// let result = render("Write copy for {brand}.", &vars);
/// assert_eq!(result, "Write copy for Acme.");
/// ```
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    // Pass 2: substitute placeholders
    for (key, value) in vars {
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    rendered
}

/// Assemble the generation prompt for one layout.
///
/// Empty sections are omitted rather than leaving blank separators behind.
pub fn assemble(
    layout: &crate::layout::Layout,
    topic: &str,
    variations: u32,
    vars: &HashMap<String, String>,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(tone) = layout.tone_guide.as_deref().filter(|t| !t.is_empty()) {
        sections.push(tone.to_string());
    }
    if !topic.is_empty() {
        sections.push(topic.to_string());
    }
    if let Some(image) = layout.image_prompt.as_deref().filter(|p| !p.is_empty()) {
        sections.push(image.to_string());
    }

    sections.push(layout.prompt_block());
    sections.push(format!(
        "Come up with {} variations. Never output in code.",
        variations
    ));

    render(&sections.join(SECTION_SEPARATOR), vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Layout, LayoutField};

    fn test_layout() -> Layout {
        Layout::new(
            4,
            vec![LayoutField {
                name: "Title".to_string(),
                description: "Headline (10/10)".to_string(),
            }],
        )
    }

    #[test]
    fn test_render_basic() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        assert_eq!(render("Hello {name}", &vars), "Hello Alice");
    }

    #[test]
    fn test_render_no_placeholders() {
        assert_eq!(render("static prompt", &HashMap::new()), "static prompt");
    }

    #[test]
    fn test_render_escaped_braces() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        let result = render("Hello {name}, JSON: {{\"key\": \"val\"}}", &vars);
        assert_eq!(result, r#"Hello Alice, JSON: {"key": "val"}"#);
    }

    #[test]
    fn test_assemble_full_stack() {
        let layout = test_layout()
            .with_tone_guide("Friendly but direct.")
            .with_image_prompt("Design copy for a poster.");

        let prompt = assemble(&layout, "Summer hiring push", 3, &HashMap::new());

        assert!(prompt.starts_with("Friendly but direct."));
        assert!(prompt.contains("Summer hiring push"));
        assert!(prompt.contains("Design copy for a poster."));
        assert!(prompt.contains("**Details for Layout 4**"));
        assert!(prompt.contains("- Title: Headline (10/10)"));
        assert!(prompt.ends_with("Come up with 3 variations. Never output in code."));
    }

    #[test]
    fn test_assemble_omits_empty_sections() {
        let prompt = assemble(&test_layout(), "", 1, &HashMap::new());
        assert!(prompt.starts_with("**Details for Layout 4**"));
        assert!(!prompt.contains("--------------\n\n\n"));
    }

    #[test]
    fn test_assemble_substitutes_vars() {
        let layout = test_layout().with_tone_guide("Write in the voice of {brand}.");
        let mut vars = HashMap::new();
        vars.insert("brand".to_string(), "Acme".to_string());

        let prompt = assemble(&layout, "topic", 1, &vars);
        assert!(prompt.contains("voice of Acme"));
    }
}
