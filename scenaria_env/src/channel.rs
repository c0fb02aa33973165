//! Backend RPC channel interface.

use serde_json::Value;

use crate::error::SimError;

/// Blocking RPC channel to the physics/rendering backend process.
///
/// One client connection, strictly serialized: callers must never issue
/// concurrent calls on the same channel. There is no independent timeout;
/// backend unavailability manifests as either a protocol fault
/// ([`SimError::BackendCommunication`]) or indefinite blocking.
///
/// A call that completes but reports `success = false` in its response
/// tree is a normal negative result, not an error.
pub trait BackendChannel: Send {
    /// Executes one blocking RPC round trip. The request and response are
    /// generic value trees; field-path naming is part of the wire
    /// contract.
    fn execute(&mut self, request: &Value) -> Result<Value, SimError>;
}
