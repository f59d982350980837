//! End-to-end run against the mock backend: no API key needed.
//!
//! Run with: cargo run --example mock_run

use copyfit::backend::mock::{tool_call, MockBackend};
use copyfit::events::{Event, FnEventHandler};
use copyfit::{report, run_batch, ExecCtx, Layout, LayoutField, RunConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // First extraction produces an overlong title; the repair response
    // ("Join us") fits and the run converges on the second pass.
    let mock = MockBackend::new(vec![
        "Title: Hiring Senior Developers\nHashtags: #HiringDevsNow22".to_string(),
        "Join us".to_string(),
    ])
    .with_tool_batches(vec![vec![
        tool_call("Title", "Hiring Senior Developers"),
        tool_call("Hashtags", "#HiringDevsNow22"),
    ]]);

    let ctx = ExecCtx::builder("http://unused")
        .model("mock-model")
        .backend(Arc::new(mock))
        .event_handler(Arc::new(FnEventHandler(|event: Event| match event {
            Event::LayoutStart { layout } => println!("[layout {}] start", layout),
            Event::ValidationPass {
                layout,
                iteration,
                failing,
            } => println!("[layout {}] pass {}: {} failing", layout, iteration, failing),
            Event::RepairStart { key, index, .. } => {
                println!("  repairing {} at index {}", key, index)
            }
            Event::LayoutEnd { layout, clean } => {
                println!("[layout {}] done (clean: {})", layout, clean)
            }
            _ => {}
        })))
        .build();

    let layout = Layout::new(
        1,
        vec![
            LayoutField {
                name: "Title".into(),
                description: "Main headline (10)".into(),
            },
            LayoutField {
                name: "Hashtags".into(),
                description: "15-20 characters".into(),
            },
        ],
    )
    .with_tone_guide("Friendly but direct.");

    let items = run_batch(
        &ctx,
        &RunConfig::default(),
        &[layout],
        "Summer hiring push for the engineering team",
    )
    .await;

    println!("\n{}", report::render_batch(&items));
}
