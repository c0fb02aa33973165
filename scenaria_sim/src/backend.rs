//! In-process backend channel for harness runs.
//!
//! Answers every multicall envelope successfully by default, records the
//! full request stream, and can be armed to fail or reject the next
//! call. Handles share state through `Arc`, so a test can keep a handle
//! while the context owns the boxed channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::debug;

use scenaria_env::{BackendChannel, SimError};

#[derive(Default)]
struct Shared {
    requests: Mutex<Vec<Value>>,
    fail_next: AtomicBool,
    reject_next: AtomicBool,
}

/// Recording backend channel with programmable failure modes.
#[derive(Clone, Default)]
pub struct SimBackend {
    shared: Arc<Shared>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a transport failure for the next call.
    pub fn fail_next(&self) {
        self.shared.fail_next.store(true, Ordering::SeqCst);
    }

    /// Arms a `success: false` response for the next call.
    pub fn reject_next(&self) {
        self.shared.reject_next.store(true, Ordering::SeqCst);
    }

    /// All requests executed so far, oldest first.
    pub fn requests(&self) -> Vec<Value> {
        self.shared.requests.lock().unwrap().clone()
    }

    /// Method names of all requests executed so far.
    pub fn method_names(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|request| request[0][0]["methodName"].as_str().map(str::to_owned))
            .collect()
    }
}

impl BackendChannel for SimBackend {
    fn execute(&mut self, request: &Value) -> Result<Value, SimError> {
        self.shared.requests.lock().unwrap().push(request.clone());

        if self.shared.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SimError::backend("connection reset by peer", -32300));
        }

        let success = !self.shared.reject_next.swap(false, Ordering::SeqCst);
        debug!(
            method = request[0][0]["methodName"].as_str().unwrap_or("?"),
            success, "backend call"
        );
        Ok(json!([[{ "success": success }]]))
    }
}
