use std::sync::Arc;

use custom_resource_core::registry::Registry;
use custom_resource_lambda::adapters::callback::HttpOutcomeTransmitter;
use custom_resource_lambda::config::RuntimeConfig;
use custom_resource_lambda::handlers::dispatch::{handle_event_value, DispatchDeps};
use custom_resource_lambda::logging::init_logging;
use custom_resource_lambda::resources::register_bundled_resources;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use tracing::{info, warn};

struct RuntimeDependencies {
    registry: Registry,
    transmitter: HttpOutcomeTransmitter,
    config: RuntimeConfig,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: Arc<RuntimeDependencies>,
) -> Result<Value, Error> {
    let context = deps.config.execution_context(event.context.request_id.clone());
    let report = handle_event_value(
        event.payload,
        &context,
        DispatchDeps {
            registry: &deps.registry,
            transmitter: &deps.transmitter,
            config: &deps.config,
        },
    )?;

    Ok(json!({
        "request_type": report.request_type.as_str(),
        "status": report.outcome.status,
        "physical_resource_id": report.outcome.physical_resource_id,
        "callback_status": report.receipt.status_code,
        "completed_at": report.completed_at,
    }))
}

fn build_registry(config: &RuntimeConfig) -> Result<Registry, Error> {
    let mut registry = Registry::new();
    register_bundled_resources(&mut registry, config)?;
    if registry.is_empty() {
        warn!(
            component = "runtime",
            event = "empty_registry",
            "no custom resource handlers registered"
        );
    }
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    let config = RuntimeConfig::from_env()?;
    let registry = build_registry(&config)?;
    let transmitter = HttpOutcomeTransmitter::new(config.callback_timeout)?;
    info!(
        component = "runtime",
        event = "started",
        registered_types = ?registry.registered_types(),
        reason_style = ?config.reason_style,
        callback_timeout_secs = config.callback_timeout.as_secs(),
        "custom resource runtime ready"
    );

    let deps = Arc::new(RuntimeDependencies {
        registry,
        transmitter,
        config,
    });
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        handle_request(event, Arc::clone(&deps))
    }))
    .await
}
