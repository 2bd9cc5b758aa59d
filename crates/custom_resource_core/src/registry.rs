use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::ResourceHandler;

pub const MAX_TYPE_NAME_LEN: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid custom resource type name '{0}'")]
    InvalidTypeName(String),
    #[error("no handler supplied for custom resource type '{0}'")]
    MissingHandler(String),
    #[error("multiple registrations for custom resource type '{0}'")]
    AlreadyRegistered(String),
}

/// Handlers keyed by custom resource type name (without the `Custom::` prefix).
///
/// Registration needs `&mut self`, so once the registry is shared behind an
/// `Arc` for serving it can only be read. Entries are never replaced or removed.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn ResourceHandler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: ResourceHandler + 'static>(
        &mut self,
        name: &str,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_shared(name, Some(Arc::new(handler)))
    }

    /// Registers an already shared handler. `None` is rejected.
    pub fn register_shared(
        &mut self,
        name: &str,
        handler: Option<Arc<dyn ResourceHandler>>,
    ) -> Result<(), RegistryError> {
        if !is_valid_type_name(name) {
            return Err(RegistryError::InvalidTypeName(name.to_string()));
        }
        let Some(handler) = handler else {
            return Err(RegistryError::MissingHandler(name.to_string()));
        };
        if self.handlers.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.registered_types())
            .finish()
    }
}

/// A letter, then letters, digits, `_`, `@` or `-`; at most 60 characters.
pub fn is_valid_type_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };
    name.len() <= MAX_TYPE_NAME_LEN
        && first.is_ascii_alphabetic()
        && bytes.all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'@' | b'-'))
}
