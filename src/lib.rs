//! # copyfit
//!
//! Spec-driven marketing-copy generation with structural validation and a
//! bounded repair loop.
//!
//! This crate prompts a large language model for copy (titles, subtitles,
//! hashtags, section text), mechanically validates every produced field
//! against per-field constraints (line counts, character-length ranges)
//! parsed from layout descriptions, and iteratively asks the model to
//! repair fields that fail until everything passes or retry budgets run
//! out. It guarantees structural conformance, not grammatical quality: the
//! end use is graphic-design text that must fit a fixed visual slot.
//!
//! ## Core Concepts
//!
//! - **[`FieldSpec`]** -- parsed structural constraint for one field:
//!   `"15-20"` means one line of 15 to 20 characters; `"(10/10/10)"` means
//!   three lines of at most 10 characters each.
//! - **[`Layout`]** -- a template: field names with constraint-bearing
//!   descriptions, plus tone guide and image-prompt boilerplate.
//! - **[`run_layout`]** -- the repair loop: generate, extract key/value
//!   fields via a forced `fit_to_spec` tool call, group by key, validate,
//!   issue targeted repair calls, merge, and re-validate. Missing fields
//!   trigger full regeneration; malformed fields get patched in place.
//! - **[`ExecCtx`]** -- shared execution context (HTTP client, backend,
//!   model, cancellation, optional event handler).
//!
//! ## Quick Start
//!
//! ```no_run
//! use copyfit::{run_layout, ExecCtx, Layout, LayoutField, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = ExecCtx::builder("https://api.openai.com")
//!         .openai_with_key(std::env::var("OPENAI_API_KEY")?)
//!         .model("gpt-4o")
//!         .build();
//!
//!     let layout = Layout::new(
//!         1,
//!         vec![
//!             LayoutField {
//!                 name: "Title".into(),
//!                 description: "Main headline (10/10)".into(),
//!             },
//!             LayoutField {
//!                 name: "Hashtags".into(),
//!                 description: "15-20 characters".into(),
//!             },
//!         ],
//!     )
//!     .with_tone_guide("Friendly but direct.");
//!
//!     let outcome = run_layout(
//!         &ctx,
//!         &RunConfig::default().with_variations(3),
//!         &layout,
//!         "Summer hiring push for the engineering team",
//!     )
//!     .await?;
//!
//!     print!("{}", copyfit::report::render_outcome(&outcome));
//!     Ok(())
//! }
//! ```

pub mod airtable;
pub mod backend;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod extract;
pub mod group;
pub mod layout;
pub mod prompt;
pub mod repair;
pub mod report;
pub mod session;
pub mod spec;
pub mod validate;

pub use airtable::TableSource;
pub use backend::{BackoffConfig, LlmConfig, MockBackend, OpenAiBackend};
pub use error::{CopyfitError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use extract::KeyValue;
pub use group::GroupedField;
pub use layout::{Layout, LayoutField};
pub use session::{run_batch, run_layout, BatchItem, LayoutOutcome, RunConfig};
pub use spec::{FieldSpec, LineBound, SpecSet};
pub use validate::{Evaluation, ReasonKind, RepairReason};
