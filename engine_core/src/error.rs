//! Registry error types.

use thiserror::Error;

use crate::guid::Guid;

/// Errors reported by the resource registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The empty guid names no resource and is never cached.
    #[error("the empty key never names a resource")]
    EmptyKey,
    /// The resource constructor reported failure; nothing was cached.
    #[error("failed to construct {type_name} {key}")]
    Construction {
        key: Guid,
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    /// A constructor asked for a handle to the resource it is building.
    #[error("{type_name} {key} requested itself during construction")]
    CyclicConstruction { key: Guid, type_name: &'static str },
    /// Handles were still alive when the registry shut down.
    #[error("registry '{registry}' shut down with {count} live resource(s): {keys:?}")]
    Leaked {
        registry: String,
        count: usize,
        keys: Vec<String>,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;
