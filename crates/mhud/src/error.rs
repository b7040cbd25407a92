use thiserror::Error;

use crate::hook::InterceptionState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Module resolution failed: {0}")]
    ModuleResolution(String),

    #[error("Signature '{name}' not found: captured {found} bytes, need {required}")]
    SignatureNotFound {
        name: String,
        found: usize,
        required: usize,
    },

    #[error("Import {library}!{symbol} not found in module")]
    ImportNotFound { library: String, symbol: String },

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("No hook installed for symbol: {0}")]
    HookNotInstalled(String),

    #[error("Frame customization failed: {0}")]
    FrameCustomization(String),

    #[error("Cleanup failed: {0}")]
    Cleanup(String),

    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: InterceptionState,
        to: InterceptionState,
    },

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Errors that leave the memory layout half-resolved. The injected session
    /// cannot continue after one of these.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Error::ModuleResolution(_)
                | Error::SignatureNotFound { .. }
                | Error::ImportNotFound { .. }
                | Error::Hook(_)
                | Error::InvalidTransition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_startup_fatal_classification() {
        let missing = Error::SignatureNotFound {
            name: "playerManager".to_string(),
            found: 0,
            required: 4,
        };
        assert!(missing.is_fatal_at_startup());
        assert!(Error::ModuleResolution("bad header".to_string()).is_fatal_at_startup());
        assert!(!Error::FrameCustomization("lost context".to_string()).is_fatal_at_startup());
        assert!(!Error::Cleanup("font".to_string()).is_fatal_at_startup());
    }

    #[test]
    fn test_signature_not_found_message() {
        let err = Error::SignatureNotFound {
            name: "playerList".to_string(),
            found: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "Signature 'playerList' not found: captured 1 bytes, need 2"
        );
    }
}
