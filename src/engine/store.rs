//! Stateful container and perform lifecycle
//!
//! An [`ActionStore`] owns the ActionState derived from one immutable
//! Action. It exposes the state, update functions, and a control object, and
//! sequences `perform` through the status lifecycle:
//!
//! ```text
//! Potential ──► Active ──► Completed
//!     │           │
//!     └───────────┴──────► Failed
//! ```
//!
//! Completed and Failed are not terminal; a later `perform` re-enters Active.
//! One cancellation token per store acts as the teardown signal. Once it
//! fires, handler results no longer touch the state, while failures are
//! still returned to the caller.

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::error::{PerformError, PerformResult, SpecResult, ValidationError, ValidationFailure};
use super::node::Node;
use super::schema::{Schema, build_schema, check_markers};
use super::state::{
    ACTION_STATUS_KEY, ActionState, ActionStatusType, initial_state, merge_response,
    request_view, set_status, status_of,
};
use super::validity::{ValidityState, validate};
use super::variables::{VariableMap, schema_variables};
use super::{Mode, OUTPUT_SUFFIX, StoreConfig};

/// Extra arguments passed to a handler
#[derive(Debug, Clone)]
pub struct HandlerInit {
    /// Teardown signal of the owning store
    pub signal: CancellationToken,
}

/// External operation invoked by `perform`
///
/// Receives the request view (input fields only), the named input variables,
/// and the teardown signal. Resolves with a possibly partial ActionState.
pub trait ActionHandler: Send + Sync {
    /// Run the operation
    fn handle(
        &self,
        request: ActionState,
        variables: VariableMap,
        init: HandlerInit,
    ) -> BoxFuture<'static, anyhow::Result<ActionState>>;
}

impl<F, Fut> ActionHandler for F
where
    F: Fn(ActionState, VariableMap, HandlerInit) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionState>> + Send + 'static,
{
    fn handle(
        &self,
        request: ActionState,
        variables: VariableMap,
        init: HandlerInit,
    ) -> BoxFuture<'static, anyhow::Result<ActionState>> {
        (self)(request, variables, init).boxed()
    }
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> impl ActionHandler + 'static
where
    F: Fn(ActionState, VariableMap, HandlerInit) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ActionState>> + Send + 'static,
{
    f
}

/// State plus a counter bumped on every write
struct StateSlot {
    value: ActionState,
    version: u64,
}

impl StateSlot {
    fn new(value: ActionState) -> Self {
        Self { value, version: 0 }
    }

    fn replace(&mut self, next: ActionState) {
        self.value = next;
        self.version += 1;
    }
}

struct StoreInner {
    action: Node,
    config: StoreConfig,
    input_schema: Arc<Schema>,
    output_schema: Arc<Schema>,
    declares_status_output: bool,
    state: RwLock<StateSlot>,
    handler: Arc<dyn ActionHandler>,
    signal: CancellationToken,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}

/// Stateful container for one Action
///
/// Cloning is cheap; clones share the same state and teardown signal.
#[derive(Clone)]
pub struct ActionStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for ActionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStore")
            .field("state", &self.inner.state.read().value)
            .field("torn_down", &self.inner.signal.is_cancelled())
            .finish()
    }
}

impl ActionStore {
    /// Create a store with the default configuration
    pub fn new(action: Node, handler: impl ActionHandler + 'static) -> SpecResult<Self> {
        Self::with_config(action, handler, StoreConfig::default())
    }

    /// Create a store with an explicit configuration
    ///
    /// Compiles both schemas up front, so malformed specs fail here rather
    /// than during `perform`.
    pub fn with_config(
        action: Node,
        handler: impl ActionHandler + 'static,
        config: StoreConfig,
    ) -> SpecResult<Self> {
        if config.reject_conflicting_markers {
            check_markers(&action)?;
        }

        let input_schema = build_schema(&action, Mode::Input)?;
        let output_schema = build_schema(&action, Mode::Output)?;
        let status_marker = format!("{}{}", ACTION_STATUS_KEY, OUTPUT_SUFFIX);
        let declares_status_output = action
            .as_object()
            .is_some_and(|map| map.contains_key(&status_marker));
        let state = initial_state(&action, config.initial_status);

        tracing::debug!(
            input_fields = input_schema.field_count(),
            output_fields = output_schema.field_count(),
            declares_status_output,
            "Created action store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                action,
                config,
                input_schema: Arc::new(input_schema),
                output_schema: Arc::new(output_schema),
                declares_status_output,
                state: RwLock::new(StateSlot::new(state)),
                handler: Arc::new(handler),
                signal: CancellationToken::new(),
            }),
        })
    }

    /// The immutable Action this store was built from
    pub fn action(&self) -> &Node {
        &self.inner.action
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ActionState {
        self.inner.state.read().value.clone()
    }

    /// Current lifecycle status
    pub fn status(&self) -> ActionStatusType {
        status_of(&self.inner.state.read().value).unwrap_or(self.inner.config.initial_status)
    }

    /// Replace the whole state
    pub fn set_state(&self, next: ActionState) {
        self.inner.state.write().replace(next);
    }

    /// Compute the next state from the previous one.
    ///
    /// `f` runs without any lock held, so it may read this store. If another
    /// write lands while `f` runs, `f` is called again on the newer state.
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&ActionState) -> ActionState,
    {
        loop {
            let (prev, seen) = {
                let slot = self.inner.state.read();
                (slot.value.clone(), slot.version)
            };
            let next = f(&prev);

            let mut slot = self.inner.state.write();
            if slot.version == seen {
                slot.replace(next);
                return;
            }
            tracing::debug!("State changed during update; retrying");
        }
    }

    /// Compiled input schema
    pub fn input_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.inner.input_schema)
    }

    /// Compiled output schema
    pub fn output_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.inner.output_schema)
    }

    /// Named input variables for the current state
    pub fn input_variables(&self) -> VariableMap {
        schema_variables(&self.inner.input_schema, &self.inner.state.read().value)
    }

    /// Named output variables for the current state
    pub fn output_variables(&self) -> VariableMap {
        schema_variables(&self.inner.output_schema, &self.inner.state.read().value)
    }

    /// Validity of the current state's input fields
    pub fn input_validity(&self) -> ValidityState {
        validate(&self.inner.input_schema, &self.inner.state.read().value)
    }

    /// Control object for binding layers
    pub fn controls(&self) -> ActionControls {
        let state = self.state();
        ActionControls {
            input_variables: schema_variables(&self.inner.input_schema, &state),
            input_validity: validate(&self.inner.input_schema, &state),
            input_schema: self.input_schema(),
            output_schema: self.output_schema(),
            store: self.clone(),
        }
    }

    /// Teardown signal shared with handlers
    pub fn signal(&self) -> CancellationToken {
        self.inner.signal.clone()
    }

    /// Fire the teardown signal; later handler results are not applied
    pub fn teardown(&self) {
        if !self.inner.signal.is_cancelled() {
            tracing::debug!("Tearing down action store");
        }
        self.inner.signal.cancel();
    }

    /// Whether teardown has happened
    pub fn is_torn_down(&self) -> bool {
        self.inner.signal.is_cancelled()
    }

    /// Validate, invoke the handler once, and merge its response.
    ///
    /// Overlapping calls are not serialized; each one merges its own
    /// response when it finishes.
    pub async fn perform(&self) -> PerformResult<()> {
        let span = tracing::info_span!("perform", perform_id = %Uuid::new_v4());
        self.run_perform().instrument(span).await
    }

    async fn run_perform(&self) -> PerformResult<()> {
        let inner = &self.inner;
        let snapshot = self.state();

        if let Err(err) = inner.input_schema.check(&snapshot) {
            tracing::warn!(error = %err, "Input validation failed");
            self.set_status(ActionStatusType::FailedActionStatus);
            return Err(PerformError::InputInvalid(err));
        }

        self.set_status(ActionStatusType::ActiveActionStatus);
        tracing::info!(status = %ActionStatusType::ActiveActionStatus, "Invoking action handler");

        let variables = schema_variables(&inner.input_schema, &snapshot);
        let request = request_view(&inner.action, &snapshot);
        let init = HandlerInit {
            signal: inner.signal.clone(),
        };

        let outcome = match inner.handler.handle(request, variables, init).await {
            Ok(response) => self
                .check_response(&response)
                .map(|status| (response, status)),
            Err(err) => Err(PerformError::HandlerRejected(err)),
        };

        let aborted = inner.signal.is_cancelled();
        match outcome {
            Ok((response, reported)) => {
                if aborted {
                    tracing::warn!("Store torn down while the handler ran; response dropped");
                    return Ok(());
                }

                let status = reported.unwrap_or(ActionStatusType::CompletedActionStatus);
                let mut slot = inner.state.write();
                let mut next = merge_response(&inner.action, &slot.value, &response);
                set_status(&mut next, status);
                slot.replace(next);
                tracing::info!(status = %status, "Action finished");
                Ok(())
            }
            Err(err) => {
                if aborted {
                    tracing::warn!(error = %err, "Action failed after teardown");
                } else {
                    self.set_status(ActionStatusType::FailedActionStatus);
                    tracing::warn!(error = %err, "Action failed");
                }
                Err(err)
            }
        }
    }

    /// Validate a handler response; returns the status it reports, if any
    fn check_response(&self, response: &Node) -> PerformResult<Option<ActionStatusType>> {
        let inner = &self.inner;

        if inner.config.validate_output {
            inner
                .output_schema
                .check(response)
                .map_err(PerformError::OutputInvalid)?;
        }

        if !inner.declares_status_output {
            return Ok(None);
        }

        match response.get(ACTION_STATUS_KEY) {
            None => Ok(None),
            Some(Node::String(text)) => text.parse::<ActionStatusType>().map(Some).map_err(|reason| {
                PerformError::OutputInvalid(ValidationError::new(ACTION_STATUS_KEY, reason))
            }),
            Some(other) => Err(PerformError::OutputInvalid(ValidationError::new(
                ACTION_STATUS_KEY,
                ValidationFailure::InvalidStatus(other.to_json().to_string()),
            ))),
        }
    }

    fn set_status(&self, status: ActionStatusType) {
        let mut slot = self.inner.state.write();
        set_status(&mut slot.value, status);
        slot.version += 1;
    }
}

/// Control object handed to binding layers
#[derive(Debug, Clone)]
pub struct ActionControls {
    /// Named input variables at the time the controls were taken
    pub input_variables: VariableMap,
    /// Input validity at the time the controls were taken
    pub input_validity: ValidityState,
    /// Compiled input schema
    pub input_schema: Arc<Schema>,
    /// Compiled output schema
    pub output_schema: Arc<Schema>,
    store: ActionStore,
}

impl ActionControls {
    /// Run the lifecycle against the store's current state
    pub async fn perform(&self) -> PerformResult<()> {
        self.store.perform().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SpecError;
    use serde_json::json;

    fn node(value: serde_json::Value) -> Node {
        Node::from(value)
    }

    fn echo() -> impl ActionHandler + 'static {
        handler_fn(|request: ActionState, _vars: VariableMap, _init: HandlerInit| async move {
            anyhow::Ok(request)
        })
    }

    #[test]
    fn test_initial_state_and_status() {
        let action = node(json!({"query": "rust", "query-input": "required name=q"}));
        let store = ActionStore::new(action, echo()).unwrap();

        assert_eq!(store.status(), ActionStatusType::PotentialActionStatus);
        assert_eq!(store.state().get("query"), Some(&Node::from("rust")));
        assert_eq!(store.input_variables().get("q"), Some(&Node::from("rust")));
        assert!(store.input_validity().valid);
    }

    #[test]
    fn test_functional_update() {
        let store = ActionStore::new(node(json!({"query-input": "required"})), echo()).unwrap();
        assert!(!store.input_validity().valid);

        store.update(|prev| {
            let mut next = prev.clone();
            next.insert("query", Node::from("typed"));
            next
        });
        assert!(store.input_validity().valid);
    }

    #[test]
    fn test_update_closure_can_read_the_store() {
        let store = ActionStore::new(node(json!({"query-input": "required"})), echo()).unwrap();
        let reader = store.clone();

        store.update(|prev| {
            assert!(!reader.input_validity().valid);
            assert_eq!(reader.status(), ActionStatusType::PotentialActionStatus);
            assert_eq!(reader.controls().input_variables.len(), 0);
            let mut next = reader.state();
            next.insert("query", Node::from(format!("{} rust", prev.kind())));
            next
        });

        assert_eq!(store.state().get("query"), Some(&Node::from("object rust")));
        assert!(store.input_validity().valid);
    }

    #[test]
    fn test_update_retries_after_concurrent_write() {
        let store = ActionStore::new(node(json!({"count-input": ""})), echo()).unwrap();
        let writer = store.clone();
        let mut calls = 0;

        store.update(|prev| {
            calls += 1;
            if calls == 1 {
                writer.set_state(node(json!({"count": 10})));
            }
            let count = prev.get("count").and_then(Node::as_f64).unwrap_or(0.0);
            let mut next = prev.clone();
            next.insert("count", Node::from(count + 1.0));
            next
        });

        assert_eq!(calls, 2);
        assert_eq!(store.state().get("count"), Some(&Node::Number(11.0)));
    }

    #[test]
    fn test_conflicting_markers_rejected_by_default() {
        let action = node(json!({"x-input": "", "x-output": ""}));
        assert!(matches!(
            ActionStore::new(action.clone(), echo()),
            Err(SpecError::ConflictingMarkers { .. })
        ));

        let config = StoreConfig {
            reject_conflicting_markers: false,
            ..StoreConfig::default()
        };
        assert!(ActionStore::with_config(action, echo(), config).is_ok());
    }

    #[test]
    fn test_drop_fires_signal() {
        let store = ActionStore::new(node(json!({})), echo()).unwrap();
        let signal = store.signal();
        drop(store);
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_controls_perform() {
        let action = node(json!({"query": "x", "query-input": "required"}));
        let store = ActionStore::new(action, echo()).unwrap();
        let controls = store.controls();
        assert!(controls.input_validity.valid);
        controls.perform().await.unwrap();
        assert_eq!(store.status(), ActionStatusType::CompletedActionStatus);
    }
}
