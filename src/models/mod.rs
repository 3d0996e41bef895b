use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

pub mod result;

/// A single node-input substitution applied to the deployed workflow at
/// submission time.
///
/// The node id is relative to the saved workflow (export the API workflow
/// to retrieve the ids) and must not be empty. Input values are opaque to
/// the client and forwarded as-is.
#[derive(Clone, Debug)]
pub struct Override {
    pub node_id: String,
    pub inputs: HashMap<String, Value>,
}

/// Request body of the inference endpoint. The node id / `"inputs"`
/// nesting is fixed by the remote API.
#[derive(Debug, Serialize)]
pub(crate) struct OverridePayload {
    overrides: HashMap<String, NodeInputs>,
}

#[derive(Debug, Serialize)]
struct NodeInputs {
    inputs: HashMap<String, Value>,
}

impl OverridePayload {
    pub(crate) fn new(overrides: Vec<Override>) -> Self {
        Self {
            overrides: overrides
                .into_iter()
                .map(|o| (o.node_id, NodeInputs { inputs: o.inputs }))
                .collect(),
        }
    }
}

pub(crate) fn api_error(code: i64, message: &str) -> Option<ApiError> {
    (code != 0).then(|| ApiError {
        code,
        message: message.to_string(),
    })
}

#[allow(unused)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct InferencePayload {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    status_url: String,
    #[serde(default)]
    result_url: String,
    #[serde(default)]
    cancel_url: String,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

impl InferencePayload {
    pub(crate) fn api_error(&self) -> Option<ApiError> {
        api_error(self.error_code, &self.error_message)
    }
}

/// Queue-side state of a submitted request.
///
/// `Completed` only signals that execution stopped; whether the request
/// succeeded or failed is only knowable through the result endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    InQueue,
    InProgress,
    Completed,
    Canceled,
}

/// Status of a request together with its position in the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: QueueStatus,
    /// Only meaningful while `status` is [`QueueStatus::InQueue`].
    pub queue_position: i64,
}

#[allow(unused)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StatusPayload {
    pub status: Option<QueueStatus>,
    #[serde(default)]
    pub queue_position: i64,
    #[serde(default)]
    request_id: String,
    #[serde(default)]
    result_url: String,
    #[serde(default)]
    status_url: String,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

impl StatusPayload {
    pub(crate) fn api_error(&self) -> Option<ApiError> {
        api_error(self.error_code, &self.error_message)
    }
}

/// Outcome of a cancellation attempt.
///
/// `NotCancellable` is a regular outcome, not a failure: the request was
/// already past the point where the service could stop it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    CancellationRequested,
    NotCancellable,
}

#[allow(unused)]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CancelPayload {
    #[serde(default)]
    request_id: String,
    pub status: Option<CancelOutcome>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

impl CancelPayload {
    pub(crate) fn api_error(&self) -> Option<ApiError> {
        api_error(self.error_code, &self.error_message)
    }
}
