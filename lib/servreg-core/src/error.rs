use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("namespace name not provided")]
    MissingNamespaceName,

    #[error("service name not provided")]
    MissingServiceName,

    #[error("endpoint name not provided")]
    MissingEndpointName,

    #[error("invalid name {0:?}: names cannot contain '/'")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("could not decode value stored at {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("could not encode entity for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl RegistryError {
    /// True for errors raised by identifier validation, before any backend call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RegistryError::MissingNamespaceName
                | RegistryError::MissingServiceName
                | RegistryError::MissingEndpointName
                | RegistryError::InvalidName(_)
        )
    }

    /// True for transient failures that a later pass may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::BackendUnavailable(_) | RegistryError::Decode { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RegistryError::AlreadyExists(_))
    }
}
