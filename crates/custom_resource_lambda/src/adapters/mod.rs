//! Side-effecting integrations: delivery of responses to CloudFormation.

pub mod callback;
