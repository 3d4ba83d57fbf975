//! Submitter-facing request shape.

use std::collections::HashMap;

use serde_json::Value;

/// One branch of a prospective transaction, addressed to a registered
/// participant.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// The participant this branch is addressed to.
    pub component_id: String,
    /// Business arguments passed through to the participant's Try call.
    pub request_arg: HashMap<String, Value>,
}

impl SubmitRequest {
    /// Construct a request with the given component id and arguments.
    pub fn new(component_id: impl Into<String>, request_arg: HashMap<String, Value>) -> Self {
        Self {
            component_id: component_id.into(),
            request_arg,
        }
    }
}
