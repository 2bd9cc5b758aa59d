//! `Custom::RandomString`: a stateless secret value, stable for the lifetime of
//! its physical id.
//!
//! The value is derived from a deployment secret and the physical id, so
//! Update can return the same `Value` without any storage and Delete has
//! nothing to clean up. Knowing the physical id alone is not enough to
//! recompute it.

use std::str::FromStr;

use custom_resource_core::contract::{ExecutionContext, LifecycleEvent};
use custom_resource_core::handler::{HandlerError, HandlerOutput, ResourceHandler};
use custom_resource_core::physical_id::new_physical_resource_id;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::DerivationKey;

pub const RANDOM_STRING_TYPE: &str = "RandomString";
pub const DEFAULT_LENGTH: usize = 32;
pub const MAX_LENGTH: usize = 512;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const HEX: &[u8] = b"0123456789abcdef";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Alphanumeric,
    Uppercase,
    Hex,
}

impl Charset {
    fn alphabet(self) -> &'static [u8] {
        match self {
            Self::Alphanumeric => ALPHANUMERIC,
            Self::Uppercase => UPPERCASE,
            Self::Hex => HEX,
        }
    }
}

impl FromStr for Charset {
    type Err = HandlerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "alphanumeric" => Ok(Self::Alphanumeric),
            "uppercase" => Ok(Self::Uppercase),
            "hex" => Ok(Self::Hex),
            other => Err(HandlerError::new(format!(
                "Charset must be one of alphanumeric, uppercase or hex, got '{other}'"
            ))),
        }
    }
}

/// Raw properties. CloudFormation delivers numbers as strings, so `Length`
/// is accepted in either form.
#[derive(Debug, Default, Deserialize)]
struct RawProperties {
    #[serde(rename = "Length", default)]
    length: Option<Value>,
    #[serde(rename = "Charset", default)]
    charset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomStringSettings {
    pub length: usize,
    pub charset: Charset,
}

impl Default for RandomStringSettings {
    fn default() -> Self {
        Self {
            length: DEFAULT_LENGTH,
            charset: Charset::default(),
        }
    }
}

impl RandomStringSettings {
    fn from_properties(raw: RawProperties) -> Result<Self, HandlerError> {
        let length = match raw.length {
            None | Some(Value::Null) => DEFAULT_LENGTH,
            Some(Value::Number(number)) => number
                .as_u64()
                .and_then(|length| usize::try_from(length).ok())
                .ok_or_else(|| invalid_length(&number.to_string()))?,
            Some(Value::String(text)) => text
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid_length(&text))?,
            Some(other) => return Err(invalid_length(&other.to_string())),
        };
        if !(1..=MAX_LENGTH).contains(&length) {
            return Err(invalid_length(&length.to_string()));
        }

        let charset = match raw.charset.as_deref() {
            None | Some("") => Charset::default(),
            Some(name) => name.parse()?,
        };
        Ok(Self { length, charset })
    }

    pub fn current(event: &LifecycleEvent) -> Result<Self, HandlerError> {
        Self::from_properties(event.properties()?)
    }

    /// Settings from `OldResourceProperties`; `None` when the event carries none.
    pub fn previous(event: &LifecycleEvent) -> Result<Option<Self>, HandlerError> {
        match event.old_properties::<RawProperties>() {
            Some(raw) => Ok(Some(Self::from_properties(raw?)?)),
            None => Ok(None),
        }
    }
}

fn invalid_length(value: &str) -> HandlerError {
    HandlerError::new(format!(
        "Length must be an integer between 1 and {MAX_LENGTH}, got {value}"
    ))
}

/// Deterministic value for a physical id under `key`.
pub fn derive_value(
    key: &DerivationKey,
    physical_resource_id: &str,
    settings: RandomStringSettings,
) -> String {
    let mut rng = StdRng::from_seed(derivation_seed(key, physical_resource_id));
    let alphabet = settings.charset.alphabet();
    (0..settings.length)
        .map(|_| char::from(alphabet[rng.gen_range(0..alphabet.len())]))
        .collect()
}

/// Length-prefixed fields keep `(key, id)` pairs from colliding.
fn derivation_seed(key: &DerivationKey, physical_resource_id: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in [key.as_bytes(), physical_resource_id.as_bytes()] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[derive(Debug, Clone)]
pub struct RandomStringHandler {
    key: DerivationKey,
}

impl RandomStringHandler {
    pub fn new(key: DerivationKey) -> Self {
        Self { key }
    }

    fn output_for(
        &self,
        physical_resource_id: String,
        settings: RandomStringSettings,
    ) -> HandlerOutput {
        let value = derive_value(&self.key, &physical_resource_id, settings);
        HandlerOutput::new(physical_resource_id)
            .with_attribute("Value", value)
            .with_attribute("Length", settings.length)
            .with_no_echo()
    }
}

impl ResourceHandler for RandomStringHandler {
    fn create(
        &self,
        event: &LifecycleEvent,
        _context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let settings = RandomStringSettings::current(event)?;
        Ok(self.output_for(new_physical_resource_id(event), settings))
    }

    fn update(
        &self,
        event: &LifecycleEvent,
        _context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let settings = RandomStringSettings::current(event)?;
        let previous = RandomStringSettings::previous(event)?;

        match event.existing_physical_resource_id() {
            Some(existing) if previous == Some(settings) => {
                Ok(self.output_for(existing.to_string(), settings))
            }
            existing => {
                let replacement = new_physical_resource_id(event);
                info!(
                    component = "random_string",
                    event = "replaced",
                    request_id = %event.request_id,
                    previous_physical_resource_id = existing.unwrap_or_default(),
                    physical_resource_id = %replacement,
                    "random string settings changed, issuing replacement"
                );
                Ok(self.output_for(replacement, settings))
            }
        }
    }

    fn delete(
        &self,
        _event: &LifecycleEvent,
        _context: &ExecutionContext,
    ) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(request_type: &str, properties: Value, old: Option<Value>) -> LifecycleEvent {
        let mut raw = json!({
            "RequestType": request_type,
            "ResponseURL": "https://example.invalid/response",
            "StackId": "arn:aws:cloudformation:us-east-1:123456789012:stack/MyStack/guid",
            "RequestId": "req-1",
            "ResourceType": "Custom::RandomString",
            "LogicalResourceId": "Token",
            "ResourceProperties": properties
        });
        if let Some(old) = old {
            raw["OldResourceProperties"] = old;
            raw["PhysicalResourceId"] = json!("MyStack-Token-ABCDEFGHIJKL");
        }
        serde_json::from_value(raw).expect("event should decode")
    }

    fn test_key(fill: u8) -> DerivationKey {
        DerivationKey::new(vec![fill; 32]).expect("key should be long enough")
    }

    fn handler() -> RandomStringHandler {
        RandomStringHandler::new(test_key(7))
    }

    fn value_of(output: &HandlerOutput) -> String {
        output
            .data
            .as_ref()
            .and_then(|data| data.get("Value"))
            .and_then(Value::as_str)
            .expect("Value attribute should be present")
            .to_string()
    }

    #[test]
    fn create_uses_defaults() {
        let output = handler()
            .create(
                &event("Create", json!({}), None),
                &ExecutionContext::default(),
            )
            .expect("create should succeed");

        assert!(output.physical_resource_id.starts_with("MyStack-Token-"));
        let value = value_of(&output);
        assert_eq!(value.len(), DEFAULT_LENGTH);
        assert!(value.bytes().all(|byte| byte.is_ascii_alphanumeric()));
        assert_eq!(output.data.as_ref().and_then(|d| d.get("Length")), Some(&json!(32)));
    }

    #[test]
    fn accepts_string_length_and_charset() {
        let output = handler()
            .create(
                &event("Create", json!({ "Length": "16", "Charset": "hex" }), None),
                &ExecutionContext::default(),
            )
            .expect("create should succeed");

        let value = value_of(&output);
        assert_eq!(value.len(), 16);
        assert!(value.bytes().all(|byte| byte.is_ascii_hexdigit()));
    }

    #[test]
    fn rejects_out_of_range_length() {
        for length in [json!(0), json!(513), json!("many"), json!(-3)] {
            let error = handler()
                .create(
                    &event("Create", json!({ "Length": length }), None),
                    &ExecutionContext::default(),
                )
                .expect_err("invalid length should fail");
            assert!(error.message().starts_with("Length must be"));
        }
    }

    #[test]
    fn rejects_unknown_charset() {
        let error = handler()
            .create(
                &event("Create", json!({ "Charset": "emoji" }), None),
                &ExecutionContext::default(),
            )
            .expect_err("unknown charset should fail");
        assert!(error.message().contains("'emoji'"));
    }

    #[test]
    fn unchanged_update_keeps_id_and_value() {
        let properties = json!({ "Length": 20, "Charset": "uppercase" });
        let update = event("Update", properties.clone(), Some(properties));

        let output = handler()
            .update(&update, &ExecutionContext::default())
            .expect("update should succeed");

        assert_eq!(output.physical_resource_id, "MyStack-Token-ABCDEFGHIJKL");
        let settings = RandomStringSettings {
            length: 20,
            charset: Charset::Uppercase,
        };
        assert_eq!(
            value_of(&output),
            derive_value(&test_key(7), "MyStack-Token-ABCDEFGHIJKL", settings)
        );
        let keys: Vec<&String> = output.data.as_ref().expect("data").keys().collect();
        assert_eq!(keys, vec!["Length", "Value"]);
    }

    #[test]
    fn changed_update_replaces_resource() {
        let update = event(
            "Update",
            json!({ "Length": 24 }),
            Some(json!({ "Length": 20 })),
        );

        let output = handler()
            .update(&update, &ExecutionContext::default())
            .expect("update should succeed");

        assert_ne!(output.physical_resource_id, "MyStack-Token-ABCDEFGHIJKL");
        assert!(output.physical_resource_id.starts_with("MyStack-Token-"));
        assert_eq!(value_of(&output).len(), 24);
    }

    #[test]
    fn delete_is_a_no_op() {
        let delete = event("Delete", json!({}), Some(json!({})));
        assert!(handler()
            .delete(&delete, &ExecutionContext::default())
            .is_ok());
    }

    #[test]
    fn derived_value_depends_on_key_and_id() {
        let settings = RandomStringSettings::default();
        let key = test_key(7);
        assert_eq!(
            derive_value(&key, "a", settings),
            derive_value(&key, "a", settings)
        );
        assert_ne!(
            derive_value(&key, "a", settings),
            derive_value(&key, "b", settings)
        );
        assert_ne!(
            derive_value(&key, "a", settings),
            derive_value(&test_key(8), "a", settings)
        );
    }

    #[test]
    fn value_is_not_recoverable_from_physical_id_alone() {
        let output = handler()
            .create(
                &event("Create", json!({}), None),
                &ExecutionContext::default(),
            )
            .expect("create should succeed");
        let sent = value_of(&output);
        let id = output.physical_resource_id.as_str();
        let settings = RandomStringSettings::default();

        for guess in [
            DerivationKey::new(Vec::from([0u8; 32])).expect("key should be long enough"),
            DerivationKey::new(id.repeat(4)).expect("key should be long enough"),
            test_key(8),
        ] {
            assert_ne!(derive_value(&guess, id, settings), sent);
        }
        assert!(output.no_echo);
    }
}
