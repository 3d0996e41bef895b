use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, HttpError, HttpErrorBody};
use crate::models::result::{ResultPayload, ResultResponse};
use crate::models::{
    CancelOutcome, CancelPayload, InferencePayload, Override, OverridePayload, StatusPayload,
    StatusResponse,
};

const BASE_URL: &str = "https://api.runcomfy.net";
const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

/// Everything needed to link a [`Deployment`].
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub api_token: String,
    pub deployment_id: String,
    /// Reuse an existing pooled client, e.g. one shared with other
    /// services. A fresh one is created when left empty.
    pub http_client: Option<reqwest::Client>,
    /// Aborts in-flight exchanges when triggered. The caller keeps a clone
    /// and cancels from wherever it sees fit.
    pub cancel: Option<CancellationToken>,
    /// Per-exchange deadline, unlimited when left empty.
    pub request_timeout: Option<Duration>,
}

/// Client bound to one serverless deployment.
///
/// Immutable once linked and cheap to clone; all operations take `&self`,
/// issue exactly one HTTP exchange and block only their own task, so a
/// single instance can be shared across tasks without synchronization.
/// Polling cadence is up to the caller, the queue position returned by
/// [`status`](Self::status) is the hint to pick a reasonable interval.
#[derive(Clone)]
pub struct Deployment {
    auth: String,
    base_url: Url,
    http: reqwest::Client,
    cancel: CancellationToken,
    request_timeout: Option<Duration>,
}

impl Deployment {
    /// Bind a client to the deployment described by `config`.
    pub fn link(config: Config) -> Result<Self, Error> {
        let base_url = Url::parse(BASE_URL)?.join(&format!(
            "prod/v1/deployments/{}/",
            config.deployment_id
        ))?;
        Ok(Self {
            auth: format!("Bearer {}", config.api_token),
            base_url,
            http: config.http_client.unwrap_or_default(),
            cancel: config.cancel.unwrap_or_default(),
            request_timeout: config.request_timeout,
        })
    }

    /// Submit a request to the deployment, substituting the given node
    /// inputs into the deployed workflow.
    ///
    /// Returns the request id consumed by [`status`](Self::status),
    /// [`result`](Self::result) and [`cancel`](Self::cancel). Override
    /// values are not validated locally, the service is the judge of what
    /// each node accepts.
    pub async fn start(&self, overrides: Vec<Override>) -> Result<String, Error> {
        let payload = OverridePayload::new(overrides);
        let resp: InferencePayload = self
            .request(Method::POST, "inference", Some(&payload))
            .await?;
        match resp.api_error() {
            None => Ok(resp.request_id),
            Some(error) => Err(error.into()),
        }
    }

    /// Retrieve the current status of a request.
    pub async fn status(&self, request_id: &str) -> Result<StatusResponse, Error> {
        let resp: StatusPayload = self
            .request::<(), _>(Method::GET, &format!("requests/{request_id}/status"), None)
            .await?;
        match resp.api_error() {
            None => Ok(StatusResponse {
                status: resp.status.ok_or(Error::MissingField("status"))?,
                queue_position: resp.queue_position,
            }),
            Some(error) => Err(error.into()),
        }
    }

    /// Retrieve the result of a request.
    ///
    /// Meant to be called once [`status`](Self::status) reports
    /// [`QueueStatus::Completed`](crate::models::QueueStatus::Completed);
    /// fetched earlier it reports a non-terminal status without a finish
    /// timestamp.
    pub async fn result(&self, request_id: &str) -> Result<ResultResponse, Error> {
        let resp: ResultPayload = self
            .request::<(), _>(Method::GET, &format!("requests/{request_id}/result"), None)
            .await?;
        match resp.api_error() {
            None => resp.try_into(),
            Some(error) => Err(error.into()),
        }
    }

    /// Ask the service to cancel a queued or running request.
    ///
    /// Repeating the call never corrupts the job state; once the request is
    /// past the point of cancellation the service answers
    /// [`CancelOutcome::NotCancellable`].
    pub async fn cancel(&self, request_id: &str) -> Result<CancelOutcome, Error> {
        let resp: CancelPayload = self
            .request::<(), _>(Method::POST, &format!("requests/{request_id}/cancel"), None)
            .await?;
        match resp.api_error() {
            None => resp.status.ok_or(Error::MissingField("status")),
            Some(error) => Err(error.into()),
        }
    }

    /// Download a result artifact, e.g. an extracted image URL.
    ///
    /// Artifact URLs are pre-signed storage links, so no auth header is
    /// attached.
    pub async fn download(&self, url: &Url) -> Result<Bytes, Error> {
        let resp = self.http.get(url.clone()).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(Error::UnexpectedStatus(resp.status().to_string()));
        }
        resp.bytes().await.map_err(Into::into)
    }

    /// One HTTP exchange against the deployment endpoint.
    ///
    /// 200/202 decode strictly into `R`, 403 carries a structured error
    /// body, any other status only carries its raw status line. The
    /// exchange aborts with [`Error::Canceled`] when the configured
    /// cancellation token fires first.
    async fn request<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R, Error>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.base_url.join(path)?;
        let mut req = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, self.auth.as_str())
            .header(ACCEPT, CONTENT_TYPE_JSON);
        if let Some(body) = body {
            let data = serde_json::to_vec(body).map_err(Error::Encode)?;
            req = req.header(CONTENT_TYPE, CONTENT_TYPE_JSON).body(data);
        }
        if let Some(timeout) = self.request_timeout {
            req = req.timeout(timeout);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Canceled),
            resp = Self::exchange(req) => resp,
        }
    }

    async fn exchange<R>(req: reqwest::RequestBuilder) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let resp = req.send().await?;
        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::ACCEPTED => {
                let raw = resp.text().await?;
                serde_json::from_str(&raw).map_err(|error| {
                    log::error!("failed to decode response payload: {error}, payload: {raw}");
                    Error::Decode(error)
                })
            }
            StatusCode::FORBIDDEN => {
                let raw = resp.text().await?;
                let body: HttpErrorBody = serde_json::from_str(&raw).map_err(|error| {
                    log::error!(
                        "failed to decode error payload after HTTP status {status}: {error}, payload: {raw}"
                    );
                    Error::Decode(error)
                })?;
                Err(HttpError {
                    code: status,
                    message: body.message,
                }
                .into())
            }
            _ => Err(Error::UnexpectedStatus(status.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Deployment {
        Deployment::link(Config {
            api_token: "token-123".into(),
            deployment_id: "dep-456".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn link_builds_the_deployment_endpoint() {
        let deployment = deployment();

        assert_eq!(
            deployment.base_url.as_str(),
            "https://api.runcomfy.net/prod/v1/deployments/dep-456/"
        );
        assert_eq!(deployment.auth, "Bearer token-123");
    }

    #[test]
    fn request_paths_stay_below_the_deployment() {
        let deployment = deployment();

        let status = deployment.base_url.join("requests/abc/status").unwrap();
        assert_eq!(
            status.as_str(),
            "https://api.runcomfy.net/prod/v1/deployments/dep-456/requests/abc/status"
        );

        let inference = deployment.base_url.join("inference").unwrap();
        assert_eq!(
            inference.as_str(),
            "https://api.runcomfy.net/prod/v1/deployments/dep-456/inference"
        );
    }
}
