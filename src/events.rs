//! Event system for repair-loop lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe a generation run.
//! The orchestrator emits events as layouts start, generations are
//! attempted, validation passes complete, and repairs are applied. Users
//! can implement [`EventHandler`] to receive these events for logging,
//! progress tracking, or UIs.

use std::sync::Arc;

/// Events emitted during a generation run.
#[derive(Debug, Clone)]
pub enum Event {
    /// Processing of a layout has started.
    LayoutStart {
        /// Layout number.
        layout: u32,
    },
    /// A fresh generation attempt is being sent to the model.
    GenerationAttempt {
        /// Layout number.
        layout: u32,
        /// Attempt number (1-indexed, counts against the outer retry cap).
        attempt: u32,
    },
    /// The model returned nothing; the attempt will be retried.
    EmptyResponse {
        /// Layout number.
        layout: u32,
        /// The attempt that came back empty.
        attempt: u32,
    },
    /// A model call failed even after transport retries. During generation
    /// and extraction the attempt is abandoned and counts against the outer
    /// retry budget; during repair the failed task is skipped and the field
    /// keeps its last-known value.
    BackendError {
        /// Layout number.
        layout: u32,
        /// The attempt the failure occurred in.
        attempt: u32,
        /// Error description.
        error: String,
    },
    /// Field extraction completed.
    PairsExtracted {
        /// Layout number.
        layout: u32,
        /// Number of key/value pairs extracted (duplicates included).
        count: usize,
    },
    /// A validation pass over all grouped fields completed.
    ValidationPass {
        /// Layout number.
        layout: u32,
        /// Inner iteration number (0-indexed).
        iteration: u32,
        /// Number of values still carrying a repair reason.
        failing: usize,
    },
    /// A targeted repair call is being issued.
    RepairStart {
        /// Field key being repaired.
        key: String,
        /// Variation index within the field.
        index: usize,
        /// The repair instruction sent to the model.
        reason: String,
    },
    /// A repaired value was merged back into its slot.
    RepairApplied {
        /// Field key.
        key: String,
        /// Variation index.
        index: usize,
    },
    /// A repaired value could not be placed back at its expected slot.
    /// Non-fatal: the field keeps its last-known value.
    MergeAnomaly {
        /// Field key the merge targeted.
        key: String,
        /// Variation index the merge targeted.
        index: usize,
    },
    /// A spec'd field was entirely absent from the generated content.
    /// The current attempt is abandoned and regeneration begins.
    MissingKey {
        /// Layout number.
        layout: u32,
        /// The missing field key.
        key: String,
        /// The attempt being abandoned.
        attempt: u32,
    },
    /// The inner repair iteration cap was reached; the last-known values
    /// are emitted as best effort.
    IterationCapReached {
        /// Layout number.
        layout: u32,
        /// Number of values still failing.
        failing: usize,
    },
    /// A field was present in the output but has no parseable spec.
    /// It passes validation unconditionally; this event is the only signal.
    UnconstrainedField {
        /// The field key without a spec.
        key: String,
    },
    /// Processing of a layout has finished.
    LayoutEnd {
        /// Layout number.
        layout: u32,
        /// Whether every spec'd field passed validation.
        clean: bool,
    },
    /// A transport-level retry due to HTTP error.
    TransportRetry {
        /// Operation description.
        name: String,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Reason for the retry (error description).
        reason: String,
    },
}

/// Handler for run lifecycle events.
///
/// Implement this trait to receive progress updates and anomaly signals
/// during a generation run. Entirely optional -- the loop works without
/// an event handler.
///
/// # Example
///
/// ```
/// use copyfit::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::LayoutStart { layout } => println!("[layout {}]", layout),
///             Event::MergeAnomaly { key, index } => {
///                 eprintln!("could not merge repair for {} at {}", key, index)
///             }
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the run emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use copyfit::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::ValidationPass { failing, .. } = event {
///         println!("{} values still failing", failing);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
