//! CLI exit-code mapping.
//!
//! Exit codes:
//! - 0: success
//! - 2: configuration error (bad thresholds, unknown mode, missing MU entry)
//! - 3: data contradiction (ORCID collision on NEW, non-finite score)
//! - 130: cancelled

use authorlink_core::EngineError;

/// Process exit codes for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CliExitCode {
    /// Run completed (cancellation excluded).
    Success = 0,
    /// Fatal configuration problem; no decisions were committed.
    Config = 2,
    /// The input data contradicts a core invariant; the trace was flushed
    /// and the manifest marked aborted before exit.
    Contradiction = 3,
    /// External cancellation; the in-flight publication completed.
    Cancelled = 130,
}

impl From<&EngineError> for CliExitCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Config(_) => CliExitCode::Config,
            EngineError::Contradiction(_) => CliExitCode::Contradiction,
            EngineError::Cancelled => CliExitCode::Cancelled,
            // I/O and serialization failures have no dedicated code; they
            // surface as configuration-class failures.
            EngineError::Io(_) | EngineError::Serialization(_) => CliExitCode::Config,
        }
    }
}

impl CliExitCode {
    /// The numeric code handed to `std::process::exit`.
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authorlink_core::{ConfigError, ContradictionError};

    #[test]
    fn exit_code_values() {
        assert_eq!(CliExitCode::Success.code(), 0);
        assert_eq!(CliExitCode::Config.code(), 2);
        assert_eq!(CliExitCode::Contradiction.code(), 3);
        assert_eq!(CliExitCode::Cancelled.code(), 130);
    }

    #[test]
    fn error_mapping() {
        let config: EngineError = ConfigError::UnknownMode("x".into()).into();
        assert_eq!(CliExitCode::from(&config), CliExitCode::Config);

        let contradiction: EngineError = ContradictionError::DuplicateAuthorId("au_1".into()).into();
        assert_eq!(CliExitCode::from(&contradiction), CliExitCode::Contradiction);

        assert_eq!(
            CliExitCode::from(&EngineError::Cancelled),
            CliExitCode::Cancelled
        );
    }
}
