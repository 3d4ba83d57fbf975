//! Wire types for the Try/Confirm/Cancel contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A Try request addressed to one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TccReq {
    /// Transaction identifier, shared by every branch of the transaction.
    pub tx_id: String,
    /// The participant this request is addressed to.
    pub component_id: String,
    /// Business arguments for this branch. Reference participants read
    /// `biz_id` out of this map to key their reservation.
    pub request_arg: HashMap<String, Value>,
}

impl TccReq {
    /// The `biz_id` argument as a string, if present, matching the
    /// reference participant's business-id extraction.
    pub fn biz_id(&self) -> Option<String> {
        self.request_arg.get("biz_id").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Reply from a Try, Confirm, or Cancel call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TccResp {
    /// Echoes the request's transaction id.
    pub tx_id: String,
    /// Echoes the request's (or call's) component id.
    pub component_id: String,
    /// Whether the branch acknowledged this phase. `false` is a legal,
    /// non-error outcome (a soft decline).
    pub ack: bool,
}
