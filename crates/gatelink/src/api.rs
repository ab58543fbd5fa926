//! Thin RPC-method wrappers.
//!
//! Pure pass-throughs over [`GatewayClient::call`]; the payloads' business
//! semantics belong to the Gateway, not to this client.

use serde_json::Value;

use crate::client::GatewayClient;
use crate::error::GatewayError;

impl GatewayClient {
    /// Lists the sessions known to the gateway (`sessions.list`).
    ///
    /// A `null` payload is treated as an empty list.
    pub async fn list_sessions(&self) -> Result<Vec<Value>, GatewayError> {
        let payload = self.call("sessions.list", None).await?;
        if payload.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(payload)
            .map_err(|e| gatelink_protocol::ProtocolError::Decode(e).into())
    }

    /// Creates an agent (`agents.create`). Parameters pass through
    /// untouched.
    pub async fn create_agent(&self, params: Value) -> Result<Value, GatewayError> {
        self.call("agents.create", Some(params)).await
    }

    /// Describes the gateway node (`node.describe`).
    pub async fn describe_node(&self) -> Result<Value, GatewayError> {
        self.call("node.describe", None).await
    }
}
