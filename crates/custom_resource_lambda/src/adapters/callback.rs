use std::time::Duration;

use custom_resource_core::contract::{
    ExecutionContext, LifecycleEvent, Outcome, ResponseEnvelope, ResponseStatus,
};
use reqwest::Client;
use tracing::info;

use crate::config::ReasonStyle;
use crate::logging::response_log_view;

/// What the callback endpoint answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReceipt {
    pub status_code: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("failed to encode response envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to build callback client: {0}")]
    Client(String),
    #[error("failed to deliver response to callback url: {0}")]
    Transport(String),
    #[error("callback url rejected response with status {status_code}: {body}")]
    Rejected { status_code: u16, body: String },
}

/// Delivers an encoded response body to the pre-signed callback URL.
pub trait OutcomeTransmitter {
    fn put_response(&self, response_url: &str, body: &[u8])
        -> Result<CallbackReceipt, TransmitError>;
}

/// Composes the `Reason` field of a FAILED response.
pub fn compose_reason(
    outcome: &Outcome,
    context: &ExecutionContext,
    style: ReasonStyle,
) -> Option<String> {
    if outcome.status != ResponseStatus::Failed {
        return None;
    }
    let summary = outcome.reason.clone().unwrap_or_default();

    let reason = match style {
        ReasonStyle::Bare => summary,
        ReasonStyle::LogPointer => format!(
            "See CloudWatch Logs at {}/{}/{}",
            context.log_group_name, context.log_stream_name, context.request_id
        ),
        ReasonStyle::Summary if context.has_log_coordinates() => format!(
            "{summary} (see logs at {}/{}, request {})",
            context.log_group_name, context.log_stream_name, context.request_id
        ),
        ReasonStyle::Summary => summary,
    };
    Some(reason)
}

pub fn build_envelope(
    event: &LifecycleEvent,
    outcome: &Outcome,
    context: &ExecutionContext,
    style: ReasonStyle,
) -> ResponseEnvelope {
    ResponseEnvelope::new(event, outcome, compose_reason(outcome, context, style))
}

pub fn encode_response(
    event: &LifecycleEvent,
    outcome: &Outcome,
    context: &ExecutionContext,
    style: ReasonStyle,
) -> Result<Vec<u8>, TransmitError> {
    let envelope = build_envelope(event, outcome, context, style);
    Ok(serde_json::to_vec(&envelope)?)
}

/// Encodes the outcome, PUTs it to the event's `ResponseURL`, and logs both
/// directions. Non-2xx answers are errors; nothing is retried.
pub fn send_outcome(
    event: &LifecycleEvent,
    outcome: &Outcome,
    context: &ExecutionContext,
    style: ReasonStyle,
    transmitter: &dyn OutcomeTransmitter,
) -> Result<CallbackReceipt, TransmitError> {
    let envelope = build_envelope(event, outcome, context, style);
    let body = serde_json::to_vec(&envelope)?;
    info!(
        component = "callback",
        event = "response_sent",
        request_id = %event.request_id,
        body = %response_log_view(&envelope),
        "CloudFormation response"
    );

    let receipt = transmitter.put_response(&event.response_url, &body)?;
    info!(
        component = "callback",
        event = "response_acknowledged",
        request_id = %event.request_id,
        status_code = receipt.status_code,
        body = %receipt.body,
        "CloudFormation callback status"
    );

    if !(200..300).contains(&receipt.status_code) {
        return Err(TransmitError::Rejected {
            status_code: receipt.status_code,
            body: receipt.body,
        });
    }
    Ok(receipt)
}

/// `reqwest` based transmitter. The body is sent as raw bytes so no
/// `Content-Type` header is attached, which the S3 pre-signed URL requires.
#[derive(Debug, Clone)]
pub struct HttpOutcomeTransmitter {
    client: Client,
}

impl HttpOutcomeTransmitter {
    pub fn new(timeout: Duration) -> Result<Self, TransmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransmitError::Client(error.to_string()))?;
        Ok(Self { client })
    }

    async fn put_async(
        &self,
        response_url: &str,
        body: Vec<u8>,
    ) -> Result<CallbackReceipt, TransmitError> {
        let response = self
            .client
            .put(response_url)
            .body(body)
            .send()
            .await
            .map_err(|error| TransmitError::Transport(error.to_string()))?;
        let status_code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| TransmitError::Transport(error.to_string()))?;
        Ok(CallbackReceipt { status_code, body })
    }
}

impl OutcomeTransmitter for HttpOutcomeTransmitter {
    fn put_response(
        &self,
        response_url: &str,
        body: &[u8],
    ) -> Result<CallbackReceipt, TransmitError> {
        let body = body.to_vec();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.put_async(response_url, body))
        })
    }
}
