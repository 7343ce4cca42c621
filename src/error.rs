use thiserror::Error;

#[derive(Error, Debug)]
pub enum NomadError {
    #[error("Network error calling {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Nomad returned HTTP {status} for {url}: {body}")]
    Server {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Invalid job payload: {0}")]
    Validation(String),

    #[error("Invalid Nomad endpoint: {0}")]
    InvalidEndpoint(String),
}

impl NomadError {
    pub fn job_not_found(name: impl Into<String>) -> Self {
        NomadError::NotFound {
            kind: "Job",
            name: name.into(),
        }
    }

    pub fn host_not_found(name: impl Into<String>) -> Self {
        NomadError::NotFound {
            kind: "Host",
            name: name.into(),
        }
    }

    pub fn alloc_not_found(job: &str, host: &str) -> Self {
        NomadError::NotFound {
            kind: "Allocation",
            name: format!("'{}' job on '{}' host", job, host),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NomadError::NotFound { .. })
    }

    /// Only transport-level failures are worth another attempt. Anything the
    /// scheduler actually answered is deterministic for the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NomadError::Network { .. })
    }
}

impl From<NomadError> for tonic::Status {
    fn from(err: NomadError) -> Self {
        let message = err.to_string();
        match err {
            NomadError::Network { .. } => tonic::Status::unavailable(message),
            NomadError::Decode { .. } => tonic::Status::internal(message),
            NomadError::NotFound { .. } => tonic::Status::not_found(message),
            NomadError::Server { .. } => tonic::Status::unknown(message),
            NomadError::Validation(_) => tonic::Status::invalid_argument(message),
            NomadError::InvalidEndpoint(_) => tonic::Status::internal(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, NomadError>;
