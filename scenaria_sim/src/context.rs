//! Simulation context: the injected owner of the backend channel.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use scenaria_env::{BackendChannel, SimError};

/// Owns the single backend connection for a simulation run.
///
/// The context is injected into the facade rather than reached through
/// process globals, so tests can swap the channel. RPC calls are
/// strictly serialized by the channel lock; the RAII guard releases it
/// on every exit path, error paths included.
pub struct SimulationContext {
    channel: Mutex<Box<dyn BackendChannel>>,
}

impl SimulationContext {
    /// Creates a context around a backend channel.
    pub fn new(channel: Box<dyn BackendChannel>) -> Self {
        Self {
            channel: Mutex::new(channel),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(channel: Box<dyn BackendChannel>) -> Arc<Self> {
        Arc::new(Self::new(channel))
    }

    /// Executes one blocking RPC round trip on the single connection.
    pub fn execute(&self, request: &Value) -> Result<Value, SimError> {
        let mut channel = self.channel.lock().unwrap();
        channel.execute(request)
    }
}
