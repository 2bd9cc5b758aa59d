use crate::contract::{ExecutionContext, LifecycleEvent, ResponseData};

/// Provisioning logic behind one custom resource type.
///
/// Panics raised by any method are intercepted by the dispatcher and reported
/// to CloudFormation as a failure, with the backtrace written to the logs.
pub trait ResourceHandler: Send + Sync {
    /// Creates the resource and returns its physical id plus optional
    /// attributes readable with `Fn::GetAtt`.
    fn create(
        &self,
        event: &LifecycleEvent,
        context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError>;

    /// Updates the resource.
    ///
    /// Returning a physical id different from the event's one tells
    /// CloudFormation the resource was replaced; it later sends a Delete for
    /// the old id. The returned data must contain every key Create returned,
    /// otherwise `Fn::GetAtt` lookups on the resource fail.
    fn update(
        &self,
        event: &LifecycleEvent,
        context: &ExecutionContext,
    ) -> Result<HandlerOutput, HandlerError>;

    /// Deletes the resource identified by the event's physical id.
    fn delete(&self, event: &LifecycleEvent, context: &ExecutionContext)
        -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub physical_resource_id: String,
    pub data: Option<ResponseData>,
    pub no_echo: bool,
}

impl HandlerOutput {
    pub fn new(physical_resource_id: impl Into<String>) -> Self {
        Self {
            physical_resource_id: physical_resource_id.into(),
            data: None,
            no_echo: false,
        }
    }

    pub fn with_data(mut self, data: ResponseData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.data
            .get_or_insert_with(ResponseData::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }
}

/// Failure reported by a handler.
///
/// A handler that got far enough to know the physical id of what it touched
/// attaches it so the failure is reported against that id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    physical_resource_id: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            physical_resource_id: None,
        }
    }

    pub fn with_physical_resource_id(mut self, physical_resource_id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(physical_resource_id.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The claimed physical id, ignoring empty strings.
    pub fn physical_resource_id(&self) -> Option<&str> {
        self.physical_resource_id
            .as_deref()
            .filter(|value| !value.is_empty())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(format!("invalid resource properties: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_builder_accumulates_attributes() {
        let output = HandlerOutput::new("phys-1")
            .with_attribute("Arn", "arn:aws:s3:::bucket")
            .with_attribute("Port", 5432);

        let data = output.data.expect("attributes should be recorded");
        assert_eq!(data["Arn"], json!("arn:aws:s3:::bucket"));
        assert_eq!(data["Port"], json!(5432));
        assert!(!output.no_echo);
    }

    #[test]
    fn error_ignores_empty_claimed_id() {
        let error = HandlerError::new("quota exceeded").with_physical_resource_id("");
        assert_eq!(error.physical_resource_id(), None);
        assert_eq!(error.to_string(), "quota exceeded");
    }

    #[test]
    fn property_decode_errors_convert_to_handler_errors() {
        let decode_error = serde_json::from_value::<u32>(json!("not-a-number"))
            .expect_err("decode should fail");
        let error = HandlerError::from(decode_error);
        assert!(error.message().starts_with("invalid resource properties:"));
    }
}
