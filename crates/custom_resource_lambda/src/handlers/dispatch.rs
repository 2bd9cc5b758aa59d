use chrono::Utc;
use custom_resource_core::contract::{ExecutionContext, LifecycleEvent, Outcome, RequestType};
use custom_resource_core::handler::{HandlerError, HandlerOutput, ResourceHandler};
use custom_resource_core::physical_id::new_physical_resource_id;
use custom_resource_core::registry::Registry;
use serde_json::Value;
use tracing::{error, info};

use crate::adapters::callback::{
    send_outcome, CallbackReceipt, OutcomeTransmitter, TransmitError,
};
use crate::config::RuntimeConfig;
use crate::handlers::fault::run_contained;
use crate::logging::event_log_view;

pub const EMPTY_PHYSICAL_ID_REASON: &str = "handler returned an empty physical resource id";

/// Everything a single invocation needs besides the event itself.
#[derive(Clone, Copy)]
pub struct DispatchDeps<'a> {
    pub registry: &'a Registry,
    pub transmitter: &'a dyn OutcomeTransmitter,
    pub config: &'a RuntimeConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The event could not be decoded, so there is no `ResponseURL` to answer.
    #[error("malformed custom resource event: {0}")]
    MalformedEvent(#[source] serde_json::Error),
    /// The outcome was built but CloudFormation never received it.
    #[error(transparent)]
    Transmit(#[from] TransmitError),
}

/// Outcome plus the operator-facing detail that stays out of the response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutcome {
    pub outcome: Outcome,
    pub failure_detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub request_type: RequestType,
    pub outcome: Outcome,
    pub failure_detail: Option<String>,
    pub receipt: CallbackReceipt,
    pub completed_at: String,
}

pub fn handle_event_bytes(
    raw: &[u8],
    context: &ExecutionContext,
    deps: DispatchDeps<'_>,
) -> Result<DispatchReport, DispatchError> {
    let event: LifecycleEvent =
        serde_json::from_slice(raw).map_err(DispatchError::MalformedEvent)?;
    dispatch_event(&event, context, deps)
}

pub fn handle_event_value(
    raw: Value,
    context: &ExecutionContext,
    deps: DispatchDeps<'_>,
) -> Result<DispatchReport, DispatchError> {
    let event: LifecycleEvent =
        serde_json::from_value(raw).map_err(DispatchError::MalformedEvent)?;
    dispatch_event(&event, context, deps)
}

/// Resolves the outcome for a decoded event and reports it exactly once.
pub fn dispatch_event(
    event: &LifecycleEvent,
    context: &ExecutionContext,
    deps: DispatchDeps<'_>,
) -> Result<DispatchReport, DispatchError> {
    info!(
        component = "dispatcher",
        event = "request_received",
        request = %event_log_view(event, deps.config.log_resource_properties),
        "CloudFormation request"
    );

    let resolved = resolve_outcome(event, context, deps.registry);
    let receipt = send_outcome(
        event,
        &resolved.outcome,
        context,
        deps.config.reason_style,
        deps.transmitter,
    )?;

    Ok(DispatchReport {
        request_type: event.request_type,
        outcome: resolved.outcome,
        failure_detail: resolved.failure_detail,
        receipt,
        completed_at: Utc::now().to_rfc3339(),
    })
}

/// Looks up the handler and runs the requested lifecycle method behind the
/// fault boundary. Always yields an outcome with a non-empty physical id.
pub fn resolve_outcome(
    event: &LifecycleEvent,
    context: &ExecutionContext,
    registry: &Registry,
) -> ResolvedOutcome {
    let type_name = event.type_name();
    let Some(handler) = registry.lookup(type_name) else {
        let reason = format!("handler for '{type_name}' not found");
        error!(
            component = "dispatcher",
            event = "handler_not_found",
            request_id = %event.request_id,
            resource_type = %event.resource_type,
            "{reason}"
        );
        return failed(fallback_physical_id(event, None), reason.clone(), reason);
    };

    match run_contained(|| invoke_lifecycle(handler.as_ref(), event, context)) {
        Ok(Ok(outcome)) => {
            info!(
                component = "dispatcher",
                event = "handler_succeeded",
                request_id = %event.request_id,
                request_type = %event.request_type,
                physical_resource_id = %outcome.physical_resource_id,
                "custom resource handler succeeded"
            );
            ResolvedOutcome {
                outcome,
                failure_detail: None,
            }
        }
        Ok(Err(handler_error)) => {
            error!(
                component = "dispatcher",
                event = "handler_failed",
                request_id = %event.request_id,
                request_type = %event.request_type,
                error = %handler_error,
                "custom resource handler returned an error"
            );
            failed(
                fallback_physical_id(event, handler_error.physical_resource_id()),
                handler_error.message().to_string(),
                handler_error.message().to_string(),
            )
        }
        Err(fault) => {
            let detail = fault.to_string();
            error!(
                component = "dispatcher",
                event = "handler_panicked",
                request_id = %event.request_id,
                request_type = %event.request_type,
                fault = %detail,
                "custom resource handler panicked"
            );
            failed(
                fallback_physical_id(event, None),
                format!("unexpected fault in handler: {}", fault.message),
                detail,
            )
        }
    }
}

fn invoke_lifecycle(
    handler: &dyn ResourceHandler,
    event: &LifecycleEvent,
    context: &ExecutionContext,
) -> Result<Outcome, HandlerError> {
    match event.request_type {
        RequestType::Create => handler.create(event, context).and_then(success_outcome),
        RequestType::Update => handler.update(event, context).and_then(success_outcome),
        RequestType::Delete => {
            handler.delete(event, context)?;
            Ok(Outcome::success(fallback_physical_id(event, None), None))
        }
    }
}

fn success_outcome(output: HandlerOutput) -> Result<Outcome, HandlerError> {
    if output.physical_resource_id.is_empty() {
        return Err(HandlerError::new(EMPTY_PHYSICAL_ID_REASON));
    }
    Ok(Outcome::success(output.physical_resource_id, output.data).with_no_echo(output.no_echo))
}

/// Claimed id, else the id CloudFormation already knows, else a fresh one.
fn fallback_physical_id(event: &LifecycleEvent, claimed: Option<&str>) -> String {
    claimed
        .or_else(|| event.existing_physical_resource_id())
        .map(str::to_string)
        .unwrap_or_else(|| new_physical_resource_id(event))
}

fn failed(physical_resource_id: String, reason: String, detail: String) -> ResolvedOutcome {
    ResolvedOutcome {
        outcome: Outcome::failed(physical_resource_id, reason),
        failure_detail: Some(detail),
    }
}
