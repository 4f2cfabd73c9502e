//! Domain error types.

/// Top-level error type for rollstitch.
///
/// Only malformed input and unrecoverable collaborator failures surface here.
/// Missing data (lookup misses, empty retrievals, short coverage) is handled
/// inside the collection pipeline and never becomes an error.
#[derive(Debug, thiserror::Error)]
pub enum RollstitchError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unsupported time unit '{unit}'")]
    UnsupportedTimeUnit { unit: String },

    #[error("malformed contract id '{id}': {reason}")]
    MalformedContractId { id: String, reason: String },

    #[error("no front contract resolved for {symbol}")]
    NoFrontContract { symbol: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    #[error("status file error: {reason}")]
    Status { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RollstitchError {
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            RollstitchError::ConfigParse { .. }
                | RollstitchError::ConfigMissing { .. }
                | RollstitchError::ConfigInvalid { .. }
                | RollstitchError::UnsupportedTimeUnit { .. }
                | RollstitchError::MalformedContractId { .. }
        )
    }
}

impl From<&RollstitchError> for std::process::ExitCode {
    fn from(err: &RollstitchError) -> Self {
        let code: u8 = match err {
            RollstitchError::Io(_) => 1,
            RollstitchError::ConfigParse { .. }
            | RollstitchError::ConfigMissing { .. }
            | RollstitchError::ConfigInvalid { .. }
            | RollstitchError::UnsupportedTimeUnit { .. }
            | RollstitchError::MalformedContractId { .. } => 2,
            RollstitchError::Broker { .. } | RollstitchError::Auth { .. } => 3,
            RollstitchError::Status { .. } => 4,
            RollstitchError::NoFrontContract { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
