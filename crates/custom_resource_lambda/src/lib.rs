//! Lambda integration for CloudFormation custom resources.
//!
//! Decodes lifecycle requests, routes them to the registered
//! [`ResourceHandler`](custom_resource_core::handler::ResourceHandler), and
//! reports exactly one outcome to the pre-signed callback URL.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod resources;
