use custom_resource_core::registry::{Registry, RegistryError};
use tracing::warn;

use crate::config::{RuntimeConfig, RANDOM_STRING_KEY_ENV};

pub mod random_string;

/// Registers every resource type shipped with the runtime whose settings are
/// present in `config`.
pub fn register_bundled_resources(
    registry: &mut Registry,
    config: &RuntimeConfig,
) -> Result<(), RegistryError> {
    match &config.random_string_key {
        Some(key) => registry.register(
            random_string::RANDOM_STRING_TYPE,
            random_string::RandomStringHandler::new(key.clone()),
        )?,
        None => warn!(
            component = "runtime",
            event = "resource_skipped",
            resource_type = random_string::RANDOM_STRING_TYPE,
            "{RANDOM_STRING_KEY_ENV} is not set; RandomString is not registered"
        ),
    }
    Ok(())
}
