//! Repair Loop orchestrator.
//!
//! Drives one layout through an explicit state machine:
//!
//! ```text
//! Generating -> Extracting -> Validating -> Clean        (success)
//!      ^                          |
//!      |                          +-> MissingKey          (regenerate,
//!      +--------------------------+                       outer budget)
//!                                 |
//!                                 +-> Repairing -> Validating  (inner budget)
//! ```
//!
//! Two budgets bound the loop: an outer retry cap (full regenerations,
//! default 3) consumed by empty responses, transport failures, and missing
//! keys, and an inner iteration cap (repair passes, default 5). Exhausting
//! the inner cap ends the attempt as best effort: the last-known grouped
//! values are emitted with their failing evaluations attached rather than
//! discarded. Exhausting the outer cap is a terminal failure for that
//! layout only; sibling layouts in a batch proceed independently.
//!
//! Failure is absorbed here, not propagated: a model call that still fails
//! after transport retries abandons the attempt (generation, extraction) or
//! skips the task (repair) instead of aborting the layout. Only
//! cancellation exits the loop directly.
//!
//! Cancellation is checked at every state transition, never mid-call.

use crate::backend::{with_backoff, with_backoff_tool, LlmRequest, ToolCall};
use crate::error::Result;
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::extract;
use crate::group::{group_pairs, merge_repair, GroupedField};
use crate::layout::Layout;
use crate::repair::{plan_repairs, RepairTask};
use crate::validate::{evaluate_all, Evaluation};
use crate::{prompt, CopyfitError};

/// Budgets and batch options for a generation run. No globals: everything
/// the loop needs arrives through this and [`ExecCtx`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Full regenerations allowed per layout. Default: 3.
    pub max_retries: u32,
    /// Repair passes allowed per generation attempt. Default: 5.
    pub max_iterations: u32,
    /// Variations requested in the generation prompt. Default: 1.
    pub variations: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_iterations: 5,
            variations: 1,
        }
    }
}

impl RunConfig {
    /// Reject budgets the loop cannot make progress with.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(CopyfitError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.variations == 0 {
            return Err(CopyfitError::InvalidConfig(
                "variations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_variations(mut self, n: u32) -> Self {
        self.variations = n;
        self
    }
}

/// Final state of one layout run.
#[derive(Debug, Clone)]
pub struct LayoutOutcome {
    /// Layout number.
    pub layout: u32,
    /// Last-known grouped values (validated, or best effort).
    pub grouped: Vec<GroupedField>,
    /// Whether every spec'd value passed validation.
    pub clean: bool,
    /// Generation attempts consumed.
    pub attempts: u32,
    /// Repair passes consumed in the final attempt.
    pub iterations: u32,
    /// Evaluations still failing when the run ended. Empty when clean.
    pub failing: Vec<Evaluation>,
    /// Keys present in the output with no parseable spec.
    pub unconstrained: Vec<String>,
}

/// One entry of a batch run: the layout number and its result.
#[derive(Debug)]
pub struct BatchItem {
    pub layout: u32,
    pub result: Result<LayoutOutcome>,
}

/// Repair Loop states. Owned data travels with the state so each
/// transition hands off exactly what the next step needs.
enum LoopState {
    Generating,
    Extracting { text: String },
    Validating { grouped: Vec<GroupedField> },
    Repairing { grouped: Vec<GroupedField>, tasks: Vec<RepairTask> },
}

async fn call_text(ctx: &ExecCtx, name: &str, request: &LlmRequest) -> Result<String> {
    let handler = ctx.event_handler.clone();
    let mut on_retry = |attempt: u32, delay: std::time::Duration, reason: &str| {
        emit(
            &handler,
            Event::TransportRetry {
                name: name.to_string(),
                attempt,
                delay_ms: delay.as_millis() as u64,
                reason: reason.to_string(),
            },
        );
    };
    let response = with_backoff(
        &ctx.backend,
        &ctx.client,
        &ctx.base_url,
        request,
        &ctx.backoff,
        ctx.cancel_flag(),
        Some(&mut on_retry),
    )
    .await?;
    Ok(response.text)
}

async fn call_extraction(ctx: &ExecCtx, text: &str) -> Result<Vec<ToolCall>> {
    let request = extract::extraction_request(&ctx.model, text, ctx.llm_config.clone());
    let tool = extract::fit_to_spec_tool();
    let handler = ctx.event_handler.clone();
    let mut on_retry = |attempt: u32, delay: std::time::Duration, reason: &str| {
        emit(
            &handler,
            Event::TransportRetry {
                name: "extract".to_string(),
                attempt,
                delay_ms: delay.as_millis() as u64,
                reason: reason.to_string(),
            },
        );
    };
    with_backoff_tool(
        &ctx.backend,
        &ctx.client,
        &ctx.base_url,
        &request,
        &tool,
        &ctx.backoff,
        ctx.cancel_flag(),
        Some(&mut on_retry),
    )
    .await
}

/// Run the full generate/extract/validate/repair loop for one layout.
///
/// Returns `Ok` with a clean or best-effort [`LayoutOutcome`], or
/// [`CopyfitError::LayoutFailed`] when the outer retry budget is exhausted
/// without a single attempt surviving validation. Model-call failures are
/// absorbed into the budgets; the only other error is
/// [`CopyfitError::Cancelled`].
pub async fn run_layout(
    ctx: &ExecCtx,
    config: &RunConfig,
    layout: &Layout,
    topic: &str,
) -> Result<LayoutOutcome> {
    config.validate()?;

    let specs = layout.spec_set();
    let mut attempts: u32 = 0;
    let mut iterations: u32 = 0;
    let mut unconstrained: Vec<String> = Vec::new();

    emit(&ctx.event_handler, Event::LayoutStart { layout: layout.number });

    let mut state = LoopState::Generating;
    loop {
        ctx.check_cancelled()?;

        state = match state {
            LoopState::Generating => {
                if attempts >= config.max_retries {
                    emit(
                        &ctx.event_handler,
                        Event::LayoutEnd {
                            layout: layout.number,
                            clean: false,
                        },
                    );
                    return Err(CopyfitError::LayoutFailed {
                        layout: layout.number,
                        message: format!(
                            "no validated generation after {} attempts",
                            config.max_retries
                        ),
                    });
                }
                attempts += 1;
                iterations = 0;
                emit(
                    &ctx.event_handler,
                    Event::GenerationAttempt {
                        layout: layout.number,
                        attempt: attempts,
                    },
                );

                let request = LlmRequest {
                    model: ctx.model.clone(),
                    system_prompt: None,
                    prompt: prompt::assemble(layout, topic, config.variations, &ctx.vars),
                    messages: Vec::new(),
                    config: ctx.llm_config.clone(),
                };
                match call_text(ctx, "generate", &request).await {
                    Err(CopyfitError::Cancelled) => return Err(CopyfitError::Cancelled),
                    Err(e) => {
                        emit(
                            &ctx.event_handler,
                            Event::BackendError {
                                layout: layout.number,
                                attempt: attempts,
                                error: e.to_string(),
                            },
                        );
                        LoopState::Generating
                    }
                    Ok(text) if text.trim().is_empty() => {
                        emit(
                            &ctx.event_handler,
                            Event::EmptyResponse {
                                layout: layout.number,
                                attempt: attempts,
                            },
                        );
                        LoopState::Generating
                    }
                    Ok(text) => LoopState::Extracting { text },
                }
            }

            LoopState::Extracting { text } => match call_extraction(ctx, &text).await {
                Err(CopyfitError::Cancelled) => return Err(CopyfitError::Cancelled),
                Err(e) => {
                    emit(
                        &ctx.event_handler,
                        Event::BackendError {
                            layout: layout.number,
                            attempt: attempts,
                            error: e.to_string(),
                        },
                    );
                    LoopState::Generating
                }
                Ok(calls) => {
                    let pairs = extract::pairs_from_tool_calls(&calls);
                    emit(
                        &ctx.event_handler,
                        Event::PairsExtracted {
                            layout: layout.number,
                            count: pairs.len(),
                        },
                    );
                    // An empty extraction yields no groups; validation then
                    // reports every spec'd field missing and the attempt is
                    // regenerated.
                    LoopState::Validating {
                        grouped: group_pairs(&pairs),
                    }
                }
            },

            LoopState::Validating { grouped } => {
                let report = evaluate_all(&grouped, &specs);
                if iterations == 0 {
                    for key in &report.unconstrained {
                        emit(
                            &ctx.event_handler,
                            Event::UnconstrainedField { key: key.clone() },
                        );
                    }
                    unconstrained = report.unconstrained.clone();
                }
                emit(
                    &ctx.event_handler,
                    Event::ValidationPass {
                        layout: layout.number,
                        iteration: iterations,
                        failing: report.failing_count(),
                    },
                );

                if report.is_clean() {
                    emit(
                        &ctx.event_handler,
                        Event::LayoutEnd {
                            layout: layout.number,
                            clean: true,
                        },
                    );
                    return Ok(LayoutOutcome {
                        layout: layout.number,
                        grouped,
                        clean: true,
                        attempts,
                        iterations,
                        failing: Vec::new(),
                        unconstrained,
                    });
                }

                if report.has_missing_key() {
                    // Partial fixes are never attempted for missing fields.
                    if let Some(eval) = report.evaluations.iter().find(|e| e.is_missing()) {
                        emit(
                            &ctx.event_handler,
                            Event::MissingKey {
                                layout: layout.number,
                                key: eval.key.clone(),
                                attempt: attempts,
                            },
                        );
                    }
                    LoopState::Generating
                } else if iterations >= config.max_iterations {
                    let failing: Vec<Evaluation> = report.failing().cloned().collect();
                    emit(
                        &ctx.event_handler,
                        Event::IterationCapReached {
                            layout: layout.number,
                            failing: failing.len(),
                        },
                    );
                    emit(
                        &ctx.event_handler,
                        Event::LayoutEnd {
                            layout: layout.number,
                            clean: false,
                        },
                    );
                    return Ok(LayoutOutcome {
                        layout: layout.number,
                        grouped,
                        clean: false,
                        attempts,
                        iterations,
                        failing,
                        unconstrained,
                    });
                } else {
                    let tasks = plan_repairs(&report.evaluations);
                    LoopState::Repairing { grouped, tasks }
                }
            }

            LoopState::Repairing { mut grouped, tasks } => {
                for task in tasks {
                    ctx.check_cancelled()?;
                    emit(
                        &ctx.event_handler,
                        Event::RepairStart {
                            key: task.key.clone(),
                            index: task.index,
                            reason: task.prompt.clone(),
                        },
                    );

                    let request = LlmRequest {
                        model: ctx.model.clone(),
                        system_prompt: None,
                        prompt: task.prompt.clone(),
                        messages: Vec::new(),
                        config: ctx.llm_config.clone(),
                    };
                    // A failed repair call skips the task; the field keeps
                    // its last-known value and the next validation pass
                    // re-plans it until the inner cap runs out.
                    let fixed = match call_text(ctx, "repair", &request).await {
                        Ok(text) => text,
                        Err(CopyfitError::Cancelled) => return Err(CopyfitError::Cancelled),
                        Err(e) => {
                            emit(
                                &ctx.event_handler,
                                Event::BackendError {
                                    layout: layout.number,
                                    attempt: attempts,
                                    error: e.to_string(),
                                },
                            );
                            continue;
                        }
                    };

                    if merge_repair(&mut grouped, &task.key, task.index, fixed) {
                        emit(
                            &ctx.event_handler,
                            Event::RepairApplied {
                                key: task.key.clone(),
                                index: task.index,
                            },
                        );
                    } else {
                        emit(
                            &ctx.event_handler,
                            Event::MergeAnomaly {
                                key: task.key.clone(),
                                index: task.index,
                            },
                        );
                    }
                }
                iterations += 1;
                LoopState::Validating { grouped }
            }
        };
    }
}

/// Run a batch of layouts sequentially.
///
/// Each layout owns its own loop state; a failed layout is recorded and the
/// rest proceed. Cancellation stops the batch at the next layout boundary.
pub async fn run_batch(
    ctx: &ExecCtx,
    config: &RunConfig,
    layouts: &[Layout],
    topic: &str,
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(layouts.len());
    for layout in layouts {
        let result = run_layout(ctx, config, layout, topic).await;
        let cancelled = matches!(result, Err(CopyfitError::Cancelled));
        items.push(BatchItem {
            layout: layout.number,
            result,
        });
        if cancelled {
            break;
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{tool_call, MockBackend};
    use crate::backend::{Backend, LlmResponse, ToolCall, ToolSpec};
    use crate::events::{Event, EventHandler};
    use crate::layout::LayoutField;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Collect(Mutex<Vec<Event>>);

    impl EventHandler for Collect {
        fn on_event(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    /// Backend whose completions start failing after a configured count,
    /// and whose tool calls can be made to fail outright.
    struct FlakyBackend {
        text: String,
        ok_completions: usize,
        completions: AtomicUsize,
        fail_tool: bool,
        batch: Vec<ToolCall>,
    }

    impl FlakyBackend {
        fn new(text: &str, ok_completions: usize) -> Self {
            Self {
                text: text.to_string(),
                ok_completions,
                completions: AtomicUsize::new(0),
                fail_tool: false,
                batch: Vec::new(),
            }
        }

        fn with_fail_tool(mut self) -> Self {
            self.fail_tool = true;
            self
        }

        fn with_batch(mut self, batch: Vec<ToolCall>) -> Self {
            self.batch = batch;
            self
        }
    }

    #[async_trait]
    impl Backend for FlakyBackend {
        async fn complete(
            &self,
            _client: &Client,
            _base_url: &str,
            _request: &LlmRequest,
        ) -> Result<LlmResponse> {
            let served = self.completions.fetch_add(1, Ordering::Relaxed);
            if served < self.ok_completions {
                Ok(LlmResponse {
                    text: self.text.clone(),
                    status: 200,
                    metadata: None,
                })
            } else {
                Err(CopyfitError::HttpError {
                    status: 400,
                    body: "bad request".to_string(),
                    retry_after: None,
                })
            }
        }

        async fn complete_with_tool(
            &self,
            _client: &Client,
            _base_url: &str,
            _request: &LlmRequest,
            _tool: &ToolSpec,
        ) -> Result<Vec<ToolCall>> {
            if self.fail_tool {
                Err(CopyfitError::HttpError {
                    status: 500,
                    body: "server error".to_string(),
                    retry_after: None,
                })
            } else {
                Ok(self.batch.clone())
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn test_layout(description: &str) -> Layout {
        Layout::new(
            1,
            vec![LayoutField {
                name: "Title".to_string(),
                description: description.to_string(),
            }],
        )
    }

    fn ctx_with(mock: MockBackend) -> ExecCtx {
        ExecCtx::builder("http://unused")
            .model("test-model")
            .backend(Arc::new(mock))
            .build()
    }

    #[tokio::test]
    async fn test_clean_run_first_attempt() {
        let mock = MockBackend::fixed("Title: Join our team")
            .with_tool_batches(vec![vec![tool_call("Title", "Join our team")]]);
        let ctx = ctx_with(mock);
        let layout = test_layout("Headline (15)");

        let outcome = run_layout(&ctx, &RunConfig::default(), &layout, "hiring")
            .await
            .unwrap();

        assert!(outcome.clean);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.failing.is_empty());
        assert_eq!(outcome.grouped[0].values, vec!["Join our team"]);
    }

    #[tokio::test]
    async fn test_repair_converges() {
        // First extraction yields an overlong title; the repair response
        // fits and the second validation pass is clean.
        let mock = MockBackend::new(vec![
            "generated copy".to_string(),
            "Join us".to_string(),
        ])
        .with_tool_batches(vec![vec![tool_call("Title", "Hiring Senior Developers")]]);
        let ctx = ctx_with(mock);
        let layout = test_layout("Headline (10)");

        let outcome = run_layout(&ctx, &RunConfig::default(), &layout, "hiring")
            .await
            .unwrap();

        assert!(outcome.clean);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.grouped[0].values, vec!["Join us"]);
    }

    #[tokio::test]
    async fn test_repair_events_emitted() {
        let events = Arc::new(Collect(Mutex::new(Vec::new())));
        let mock = MockBackend::new(vec!["gen".to_string(), "Join us".to_string()])
            .with_tool_batches(vec![vec![tool_call("Title", "Hiring Senior Developers")]]);
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(mock))
            .event_handler(events.clone())
            .build();
        let layout = test_layout("Headline (10)");

        run_layout(&ctx, &RunConfig::default(), &layout, "hiring")
            .await
            .unwrap();

        let seen = events.0.lock().unwrap();
        assert!(seen.iter().any(|e| matches!(e, Event::RepairStart { .. })));
        assert!(seen.iter().any(|e| matches!(e, Event::RepairApplied { .. })));
        assert!(seen
            .iter()
            .any(|e| matches!(e, Event::LayoutEnd { clean: true, .. })));
    }

    #[tokio::test]
    async fn test_missing_key_regenerates_until_budget_exhausted() {
        // Extraction never returns the spec'd field, so every attempt ends
        // in MissingKey and the outer budget runs out.
        let mock = MockBackend::fixed("some generated text");
        let ctx = ctx_with(mock);
        let layout = test_layout("Headline (10)");

        let err = run_layout(&ctx, &RunConfig::default(), &layout, "hiring")
            .await
            .unwrap_err();

        match err {
            CopyfitError::LayoutFailed { layout, .. } => assert_eq!(layout, 1),
            other => panic!("expected LayoutFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_full_regeneration_not_patch() {
        let events = Arc::new(Collect(Mutex::new(Vec::new())));
        let mock = MockBackend::fixed("text");
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(mock))
            .event_handler(events.clone())
            .build();
        let layout = test_layout("Headline (10)");

        let _ = run_layout(&ctx, &RunConfig::default(), &layout, "topic").await;

        let seen = events.0.lock().unwrap();
        let missing = seen
            .iter()
            .filter(|e| matches!(e, Event::MissingKey { .. }))
            .count();
        let gens = seen
            .iter()
            .filter(|e| matches!(e, Event::GenerationAttempt { .. }))
            .count();
        assert_eq!(missing, 3);
        assert_eq!(gens, 3);
        // No targeted repairs for a missing field
        assert!(!seen.iter().any(|e| matches!(e, Event::RepairStart { .. })));
    }

    #[tokio::test]
    async fn test_empty_response_consumes_outer_budget() {
        let mock = MockBackend::fixed("");
        let ctx = ctx_with(mock);
        let layout = test_layout("Headline (10)");

        let err = run_layout(&ctx, &RunConfig::default(), &layout, "topic")
            .await
            .unwrap_err();
        assert!(matches!(err, CopyfitError::LayoutFailed { .. }));
    }

    #[tokio::test]
    async fn test_inner_cap_yields_best_effort() {
        // Repairs never fix the problem; the loop must stop at the inner
        // cap and emit the last-known values with failures attached.
        // Every canned response exceeds the 10-char limit, so repairs can
        // never converge even as the mock cycles.
        let mock = MockBackend::new(vec![
            "generated text response".to_string(),
            "still far too long to fit".to_string(),
        ])
        .with_tool_batches(vec![vec![tool_call("Title", "also much too long here")]]);
        let ctx = ctx_with(mock);
        let layout = test_layout("Headline (10)");
        let config = RunConfig::default().with_max_iterations(2);

        let outcome = run_layout(&ctx, &config, &layout, "topic").await.unwrap();

        assert!(!outcome.clean);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.failing.len(), 1);
        // Best effort: the last repaired value is kept, not discarded.
        assert_eq!(outcome.grouped[0].values[0], "generated text response");
    }

    #[tokio::test]
    async fn test_generation_errors_consume_outer_budget() {
        // Every generation call fails at the transport level; each failure
        // burns one attempt and the layout ends with LayoutFailed, never
        // with a raw transport error.
        let events = Arc::new(Collect(Mutex::new(Vec::new())));
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(FlakyBackend::new("unused", 0)))
            .event_handler(events.clone())
            .build();
        let layout = test_layout("Headline (10)");

        let err = run_layout(&ctx, &RunConfig::default(), &layout, "topic")
            .await
            .unwrap_err();
        assert!(matches!(err, CopyfitError::LayoutFailed { .. }));

        let seen = events.0.lock().unwrap();
        let gens = seen
            .iter()
            .filter(|e| matches!(e, Event::GenerationAttempt { .. }))
            .count();
        let errors = seen
            .iter()
            .filter(|e| matches!(e, Event::BackendError { .. }))
            .count();
        assert_eq!(gens, 3);
        assert_eq!(errors, 3);
    }

    #[tokio::test]
    async fn test_extraction_error_abandons_attempt() {
        // Generation succeeds but every extraction call fails; each failed
        // attempt goes back to Generating until the outer budget runs out.
        let events = Arc::new(Collect(Mutex::new(Vec::new())));
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(
                FlakyBackend::new("generated copy", usize::MAX).with_fail_tool(),
            ))
            .event_handler(events.clone())
            .build();
        let layout = test_layout("Headline (10)");

        let err = run_layout(&ctx, &RunConfig::default(), &layout, "topic")
            .await
            .unwrap_err();
        assert!(matches!(err, CopyfitError::LayoutFailed { layout: 1, .. }));

        let seen = events.0.lock().unwrap();
        let errors = seen
            .iter()
            .filter(|e| matches!(e, Event::BackendError { .. }))
            .count();
        assert_eq!(errors, 3);
        assert!(!seen.iter().any(|e| matches!(e, Event::PairsExtracted { .. })));
    }

    #[tokio::test]
    async fn test_failed_repair_call_keeps_best_effort() {
        // Generation succeeds once, then every repair call fails. The field
        // keeps its last-known value, the inner cap ends the attempt, and
        // the caller still gets the best-effort outcome.
        let events = Arc::new(Collect(Mutex::new(Vec::new())));
        let backend = FlakyBackend::new("generated copy", 1)
            .with_batch(vec![tool_call("Title", "far too long for the slot")]);
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(backend))
            .event_handler(events.clone())
            .build();
        let layout = test_layout("Headline (10)");
        let config = RunConfig::default().with_max_iterations(2);

        let outcome = run_layout(&ctx, &config, &layout, "topic").await.unwrap();

        assert!(!outcome.clean);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.failing.len(), 1);
        assert_eq!(outcome.grouped[0].values[0], "far too long for the slot");

        let seen = events.0.lock().unwrap();
        assert!(seen.iter().any(|e| matches!(e, Event::BackendError { .. })));
        // The failed calls never merged anything back
        assert!(!seen.iter().any(|e| matches!(e, Event::RepairApplied { .. })));
    }

    #[tokio::test]
    async fn test_zero_retry_budget_rejected() {
        let ctx = ctx_with(MockBackend::fixed("text"));
        let layout = test_layout("Headline (10)");
        let config = RunConfig::default().with_max_retries(0);

        let err = run_layout(&ctx, &config, &layout, "topic")
            .await
            .unwrap_err();
        assert!(matches!(err, CopyfitError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_cancellation_before_start() {
        let mock = MockBackend::fixed("text");
        let flag = Arc::new(AtomicBool::new(true));
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(mock))
            .cancellation(Some(flag))
            .build();
        let layout = test_layout("Headline (10)");

        let err = run_layout(&ctx, &RunConfig::default(), &layout, "topic")
            .await
            .unwrap_err();
        assert!(matches!(err, CopyfitError::Cancelled));
    }

    #[tokio::test]
    async fn test_batch_continues_past_failed_layout() {
        // Layout 1 never extracts its field and fails; layout 2 has no
        // spec'd fields at all and passes trivially.
        let mock = MockBackend::fixed("text").with_tool_batches(vec![vec![ToolCall {
            name: "fit_to_spec".to_string(),
            arguments: r#"{"key":"Note","value":"free text"}"#.to_string(),
        }]]);
        let ctx = ctx_with(mock);
        let layouts = vec![
            test_layout("Headline (10)"),
            Layout::new(
                2,
                vec![LayoutField {
                    name: "Note".to_string(),
                    description: "free form".to_string(),
                }],
            ),
        ];

        let items = run_batch(&ctx, &RunConfig::default(), &layouts, "topic").await;

        assert_eq!(items.len(), 2);
        assert!(items[0].result.is_err());
        let second = items[1].result.as_ref().unwrap();
        assert!(second.clean);
        assert_eq!(second.unconstrained, vec!["Note"]);
    }

    #[tokio::test]
    async fn test_unconstrained_field_event() {
        let events = Arc::new(Collect(Mutex::new(Vec::new())));
        let mock = MockBackend::fixed("text").with_tool_batches(vec![vec![
            tool_call("Title", "Join us"),
            tool_call("Footnote", "anything"),
        ]]);
        let ctx = ExecCtx::builder("http://unused")
            .backend(Arc::new(mock))
            .event_handler(events.clone())
            .build();
        let layout = test_layout("Headline (10)");

        let outcome = run_layout(&ctx, &RunConfig::default(), &layout, "topic")
            .await
            .unwrap();

        assert_eq!(outcome.unconstrained, vec!["Footnote"]);
        let seen = events.0.lock().unwrap();
        assert!(seen
            .iter()
            .any(|e| matches!(e, Event::UnconstrainedField { key } if key == "Footnote")));
    }
}
