use custom_resource_core::contract::{LifecycleEvent, ResponseEnvelope};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs a JSON formatter on stderr, which Lambda forwards to CloudWatch.
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // A subscriber may already be installed (tests, embedding applications).
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loggable view of an inbound request.
///
/// Property values are replaced by their key names unless `include_properties`
/// is set.
pub fn event_log_view(event: &LifecycleEvent, include_properties: bool) -> Value {
    let properties = |value: &Value| {
        if include_properties {
            value.clone()
        } else {
            redacted_keys(value)
        }
    };

    json!({
        "request_type": event.request_type.as_str(),
        "stack_id": event.stack_id,
        "request_id": event.request_id,
        "resource_type": event.resource_type,
        "logical_resource_id": event.logical_resource_id,
        "physical_resource_id": event.physical_resource_id,
        "resource_properties": properties(&event.resource_properties),
        "old_resource_properties": event.old_resource_properties.as_ref().map(properties),
    })
}

/// Loggable view of an outbound response. `Data` values are replaced by their
/// key names when the response is marked `NoEcho`.
pub fn response_log_view(envelope: &ResponseEnvelope) -> Value {
    let mut view = serde_json::to_value(envelope).unwrap_or(Value::Null);
    if envelope.no_echo {
        if let Some(data) = view.get_mut("Data") {
            *data = redacted_keys(data);
        }
    }
    view
}

fn redacted_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            json!({ "redacted_keys": keys })
        }
        Value::Null => Value::Null,
        _ => json!("<redacted>"),
    }
}
