//! Runtime-free building blocks for CloudFormation custom resources.
//!
//! This crate owns the lifecycle request/response contract, the handler
//! capability set, the handler registry, and physical-id generation. It
//! intentionally excludes Lambda runtime and HTTP concerns; those live in
//! `custom_resource_lambda`.

pub mod contract;
pub mod handler;
pub mod physical_id;
pub mod registry;
