use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix CloudFormation puts in front of every custom resource type name.
pub const CUSTOM_RESOURCE_TYPE_PREFIX: &str = "Custom::";

/// Name-value pairs returned to the orchestrator and readable with `Fn::GetAtt`.
pub type ResponseData = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded CloudFormation custom resource request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleEvent {
    #[serde(rename = "RequestType")]
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    #[serde(rename = "StackId")]
    pub stack_id: String,
    #[serde(rename = "RequestId")]
    pub request_id: String,
    #[serde(rename = "ResourceType")]
    pub resource_type: String,
    #[serde(rename = "LogicalResourceId")]
    pub logical_resource_id: String,
    #[serde(
        rename = "PhysicalResourceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub physical_resource_id: Option<String>,
    #[serde(rename = "ResourceProperties", default)]
    pub resource_properties: Value,
    #[serde(
        rename = "OldResourceProperties",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub old_resource_properties: Option<Value>,
    #[serde(
        rename = "ServiceToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_token: Option<String>,
}

impl LifecycleEvent {
    /// Resource type name with the `Custom::` prefix stripped, when present.
    pub fn type_name(&self) -> &str {
        self.resource_type
            .strip_prefix(CUSTOM_RESOURCE_TYPE_PREFIX)
            .unwrap_or(&self.resource_type)
    }

    /// The physical id CloudFormation already knows, ignoring empty strings.
    pub fn existing_physical_resource_id(&self) -> Option<&str> {
        self.physical_resource_id
            .as_deref()
            .filter(|value| !value.is_empty())
    }

    /// Decodes `ResourceProperties` into a typed value.
    pub fn properties<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.resource_properties {
            Value::Null => serde_json::from_value(Value::Object(serde_json::Map::new())),
            value => serde_json::from_value(value.clone()),
        }
    }

    /// Decodes `OldResourceProperties`; `None` outside of Update requests.
    pub fn old_properties<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Option<Result<T, serde_json::Error>> {
        self.old_resource_properties
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
    }
}

/// Diagnostic coordinates of the current invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub request_id: String,
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl ExecutionContext {
    pub fn has_log_coordinates(&self) -> bool {
        !self.log_group_name.is_empty() && !self.log_stream_name.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// The terminal result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: ResponseStatus,
    pub physical_resource_id: String,
    pub reason: Option<String>,
    pub data: Option<ResponseData>,
    pub no_echo: bool,
}

impl Outcome {
    pub fn success(physical_resource_id: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: ResponseStatus::Success,
            physical_resource_id: physical_resource_id.into(),
            reason: None,
            data,
            no_echo: false,
        }
    }

    pub fn failed(physical_resource_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            physical_resource_id: physical_resource_id.into(),
            reason: Some(reason.into()),
            data: None,
            no_echo: false,
        }
    }

    pub fn with_no_echo(mut self, no_echo: bool) -> Self {
        self.no_echo = no_echo;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// JSON body PUT to the pre-signed `ResponseURL`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    #[serde(rename = "Status")]
    pub status: ResponseStatus,
    #[serde(rename = "StackId")]
    pub stack_id: String,
    #[serde(rename = "RequestId")]
    pub request_id: String,
    #[serde(rename = "PhysicalResourceId")]
    pub physical_resource_id: String,
    #[serde(rename = "LogicalResourceId")]
    pub logical_resource_id: String,
    #[serde(rename = "Reason", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(rename = "NoEcho", default, skip_serializing_if = "is_false")]
    pub no_echo: bool,
}

impl ResponseEnvelope {
    /// Builds the envelope; `reason` is only kept for failures and `data` only
    /// for non-empty successes.
    pub fn new(event: &LifecycleEvent, outcome: &Outcome, reason: Option<String>) -> Self {
        let (reason, data) = match outcome.status {
            ResponseStatus::Failed => (reason, None),
            ResponseStatus::Success => (
                None,
                outcome.data.clone().filter(|data| !data.is_empty()),
            ),
        };

        Self {
            status: outcome.status,
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            physical_resource_id: outcome.physical_resource_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            reason,
            data,
            no_echo: outcome.no_echo && outcome.status == ResponseStatus::Success,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_event;
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_cloudformation_create_request() {
        let event: LifecycleEvent = serde_json::from_value(json!({
            "RequestType": "Create",
            "ResponseURL": "https://example.invalid/response",
            "StackId": "arn:aws:cloudformation:us-east-1:123:stack/MyStack/guid",
            "RequestId": "req-1",
            "ResourceType": "Custom::Bar",
            "LogicalResourceId": "Foo",
            "ResourceProperties": { "ServiceToken": "arn:aws:lambda:fn", "Length": "16" }
        }))
        .expect("event should decode");

        assert_eq!(event.request_type, RequestType::Create);
        assert_eq!(event.type_name(), "Bar");
        assert_eq!(event.existing_physical_resource_id(), None);
        assert_eq!(event.resource_properties["Length"], json!("16"));
    }

    #[test]
    fn rejects_unknown_request_type() {
        let result = serde_json::from_value::<LifecycleEvent>(json!({
            "RequestType": "Replace",
            "ResponseURL": "https://example.invalid/response",
            "StackId": "arn:aws:cloudformation:us-east-1:123:stack/MyStack/guid",
            "RequestId": "req-1",
            "ResourceType": "Custom::Bar",
            "LogicalResourceId": "Foo"
        }));

        assert!(result.is_err());
    }

    #[test]
    fn type_name_without_prefix_is_used_verbatim() {
        let mut event = sample_event(RequestType::Create);
        event.resource_type = "AWS::CloudFormation::CustomResource".to_string();
        assert_eq!(event.type_name(), "AWS::CloudFormation::CustomResource");
    }

    #[test]
    fn empty_physical_id_counts_as_absent() {
        let mut event = sample_event(RequestType::Delete);
        event.physical_resource_id = Some(String::new());
        assert_eq!(event.existing_physical_resource_id(), None);

        event.physical_resource_id = Some("MyStack-Foo-ABC".to_string());
        assert_eq!(event.existing_physical_resource_id(), Some("MyStack-Foo-ABC"));
    }

    #[test]
    fn failed_envelope_carries_reason_and_omits_data() {
        let event = sample_event(RequestType::Create);
        let mut outcome = Outcome::failed("MyStack-Foo-ABCDEFGHIJKL", "boom");
        outcome.data = Some(ResponseData::from([("Key".to_string(), json!("v"))]));

        let envelope = ResponseEnvelope::new(&event, &outcome, Some("boom".to_string()));
        let body = serde_json::to_value(&envelope).expect("envelope should encode");

        assert_eq!(body["Status"], json!("FAILED"));
        assert_eq!(body["Reason"], json!("boom"));
        assert_eq!(body["PhysicalResourceId"], json!("MyStack-Foo-ABCDEFGHIJKL"));
        assert_eq!(body["LogicalResourceId"], json!("Foo"));
        assert!(body.get("Data").is_none());
        assert!(body.get("NoEcho").is_none());
    }

    #[test]
    fn success_envelope_drops_empty_data_and_reason() {
        let event = sample_event(RequestType::Update);
        let outcome = Outcome::success("phys-1", Some(ResponseData::new()));

        let envelope = ResponseEnvelope::new(&event, &outcome, Some("ignored".to_string()));
        let body = serde_json::to_value(&envelope).expect("envelope should encode");

        assert_eq!(body["Status"], json!("SUCCESS"));
        assert!(body.get("Reason").is_none());
        assert!(body.get("Data").is_none());
    }

    #[test]
    fn success_envelope_keeps_data_and_no_echo() {
        let event = sample_event(RequestType::Create);
        let data = ResponseData::from([("Value".to_string(), json!("secret"))]);
        let outcome = Outcome::success("phys-1", Some(data.clone())).with_no_echo(true);

        let envelope = ResponseEnvelope::new(&event, &outcome, None);

        assert_eq!(envelope.data, Some(data));
        assert!(envelope.no_echo);
        let body = serde_json::to_value(&envelope).expect("envelope should encode");
        assert_eq!(body["NoEcho"], json!(true));
    }

    #[test]
    fn typed_properties_treat_missing_block_as_empty_object() {
        #[derive(Deserialize)]
        struct Props {
            #[serde(rename = "Length", default)]
            length: Option<u32>,
        }

        let mut event = sample_event(RequestType::Create);
        event.resource_properties = Value::Null;
        let props: Props = event.properties().expect("empty properties should decode");
        assert_eq!(props.length, None);
    }
}
