use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::error::{ApiError, Error};
use crate::outputs::Outputs;

/// Textual layout of the timestamps returned by the result endpoint:
/// RFC 3339-like with up to six fractional digits and a `±HH:MM` offset.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// State reported by the result endpoint.
///
/// Distinct from [`QueueStatus`](crate::models::QueueStatus) even though
/// both are called `status` on the wire: the queue reports `completed`
/// without telling the outcome, the result endpoint resolves it to
/// `Succeeded` or `Failed`. The non-terminal variants only show up when the
/// result is fetched before execution stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Succeeded,
    Failed,
    Canceled,
    InQueue,
    InProgress,
}

impl ResultStatus {
    /// Whether the request stopped executing. Only then does the response
    /// carry a finish timestamp.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Final report of a request.
#[derive(Clone, Debug)]
pub struct ResultResponse {
    pub status: ResultStatus,
    pub created: DateTime<FixedOffset>,
    /// Present once `status` is terminal.
    pub finished: Option<DateTime<FixedOffset>>,
    /// Populated only when `status` is [`ResultStatus::Succeeded`].
    pub outputs: Outputs,
    /// Populated only when `status` is [`ResultStatus::Failed`].
    pub errors: Vec<ResultError>,
}

/// One execution error reported for a failed request.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ResultError {
    #[serde(rename = "errorCode", default)]
    pub code: i64,
    #[serde(rename = "error", default)]
    pub message: String,
    #[serde(rename = "debugInfo")]
    pub debug_info: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ResultPayload {
    pub status: Option<ResultStatus>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    finished_at: String,
    #[serde(default)]
    outputs: Outputs,
    #[serde(default, rename = "error")]
    errors: Vec<ResultError>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_message: String,
}

impl ResultPayload {
    pub(crate) fn api_error(&self) -> Option<ApiError> {
        crate::models::api_error(self.error_code, &self.error_message)
    }
}

impl TryFrom<ResultPayload> for ResultResponse {
    type Error = Error;

    fn try_from(raw: ResultPayload) -> Result<Self, Error> {
        let status = raw.status.ok_or(Error::MissingField("status"))?;
        let created = parse_timestamp("created_at", &raw.created_at)?;
        // the finish timestamp is absent until the request stops executing
        let finished = if status.is_terminal() {
            Some(parse_timestamp("finished_at", &raw.finished_at)?)
        } else {
            None
        };
        Ok(Self {
            status,
            created,
            finished,
            outputs: raw.outputs,
            errors: raw.errors,
        })
    }
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, Error> {
    DateTime::parse_from_str(value, TIME_FORMAT).map_err(|source| Error::Timestamp {
        field,
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(raw: &str) -> Result<ResultResponse, Error> {
        let payload: ResultPayload = serde_json::from_str(raw).unwrap();
        payload.try_into()
    }

    #[test]
    fn terminal_statuses() {
        assert!(ResultStatus::Succeeded.is_terminal());
        assert!(ResultStatus::Failed.is_terminal());
        assert!(ResultStatus::Canceled.is_terminal());
        assert!(!ResultStatus::InQueue.is_terminal());
        assert!(!ResultStatus::InProgress.is_terminal());
    }

    #[test]
    fn succeeded_result() {
        let result = convert(
            r#"{
                "status": "succeeded",
                "created_at": "2024-05-14T09:30:12.123456+02:00",
                "finished_at": "2024-05-14T09:31:02.5+02:00",
                "outputs": {"58": {"images": {"filename": "ComfyUI_00010_.png", "url": "https://storage.runcomfy.net/output/ComfyUI_00010_.png"}}},
                "error_code": 0,
                "error_message": ""
            }"#,
        )
        .unwrap();

        assert_eq!(result.status, ResultStatus::Succeeded);
        assert_eq!(result.created.timezone().local_minus_utc(), 2 * 3600);
        let finished = result.finished.unwrap();
        assert!(finished > result.created);
        assert!(result.errors.is_empty());
        assert_eq!(result.outputs.extract_images().len(), 1);
    }

    #[test]
    fn failed_result_keeps_every_error() {
        let result = convert(
            r#"{
                "status": "failed",
                "created_at": "2024-05-14T09:30:12.123456-07:00",
                "finished_at": "2024-05-14T09:30:42.000001-07:00",
                "error": [
                    {"errorCode": 1101, "error": "node 16 rejected its input", "debugInfo": "traceback..."},
                    {"errorCode": 1102, "error": "execution aborted"}
                ],
                "error_code": 0,
                "error_message": ""
            }"#,
        )
        .unwrap();

        assert_eq!(result.status, ResultStatus::Failed);
        assert!(result.outputs.extract_images().is_empty());
        assert_eq!(
            result.errors,
            vec![
                ResultError {
                    code: 1101,
                    message: "node 16 rejected its input".into(),
                    debug_info: Some("traceback...".into()),
                },
                ResultError {
                    code: 1102,
                    message: "execution aborted".into(),
                    debug_info: None,
                },
            ]
        );
    }

    #[test]
    fn non_terminal_result_has_no_finish_time() {
        let result = convert(
            r#"{
                "status": "in_progress",
                "created_at": "2024-05-14T09:30:12.123456+00:00",
                "error_code": 0
            }"#,
        )
        .unwrap();

        assert_eq!(result.status, ResultStatus::InProgress);
        assert!(result.finished.is_none());
    }

    #[test]
    fn missing_creation_time_fails() {
        let error = convert(r#"{"status": "in_queue", "error_code": 0}"#).unwrap_err();

        assert!(matches!(
            error,
            Error::Timestamp {
                field: "created_at",
                ..
            }
        ));
        assert!(error.is_transport());
    }

    #[test]
    fn terminal_result_requires_a_parsable_finish_time() {
        let error = convert(
            r#"{
                "status": "canceled",
                "created_at": "2024-05-14T09:30:12.123456+00:00",
                "finished_at": "yesterday-ish",
                "error_code": 0
            }"#,
        )
        .unwrap_err();

        assert!(matches!(
            error,
            Error::Timestamp {
                field: "finished_at",
                ..
            }
        ));
    }

    #[test]
    fn unknown_result_fields_are_rejected() {
        let raw = r#"{
            "status": "succeeded",
            "created_at": "2024-05-14T09:30:12.123456+00:00",
            "finished_at": "2024-05-14T09:31:02.000001+00:00",
            "telemetry": {},
            "error_code": 0
        }"#;
        assert!(serde_json::from_str::<ResultPayload>(raw).is_err());
    }
}
