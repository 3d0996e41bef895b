//! Async client for RunComfy serverless deployments.
//!
//! Link a [`Deployment`] to a deployment id and an API token, then drive the
//! request lifecycle: [`Deployment::start`], [`Deployment::status`],
//! [`Deployment::result`] and [`Deployment::cancel`].

pub mod deployment;
pub mod error;
pub mod models;
pub mod outputs;

pub use deployment::{Config, Deployment};
pub use error::{ApiError, Error, HttpError};
pub use models::result::{ResultError, ResultResponse, ResultStatus};
pub use models::{CancelOutcome, Override, QueueStatus, StatusResponse};
pub use outputs::{ImageOutput, Outputs};
