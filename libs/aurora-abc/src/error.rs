//! Error handling for the ABC register client
//!
//! `AbcError` carries the wire-level taxonomy the query executor makes its
//! fallback decisions on, plus the ambient failures (configuration, transport,
//! query parsing) surfaced to callers.

use thiserror::Error;

use crate::transport::TransportError;

/// ABC client error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbcError {
    /// No (complete) response arrived within the transaction deadline
    #[error("Wire timeout: {0}")]
    WireTimeout(String),

    /// The device rejected one of the requested addresses (exception 2)
    #[error("Illegal data address: {0}")]
    IllegalDataAddress(String),

    /// The device rejected the function code (exception 1)
    #[error("Illegal function: {0}")]
    IllegalFunction(String),

    /// Frame length, checksum or content did not match the request
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Caller supplied value rejected before anything was sent
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Any other exception code reported by the device
    #[error("Device exception: function 0x{function:02x}, code 0x{code:02x}")]
    DeviceException { function: u8, code: u8 },

    /// Query expression could not be parsed
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Transport level failure other than a timeout
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AbcError {
    /// Create a wire timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::WireTimeout(msg.into())
    }

    /// Create an illegal data address error
    pub fn illegal_address(msg: impl Into<String>) -> Self {
        Self::IllegalDataAddress(msg.into())
    }

    /// Create an illegal function error
    pub fn illegal_function(msg: impl Into<String>) -> Self {
        Self::IllegalFunction(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create an invalid query error
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Map a Modbus exception code returned for `function` to an error
    pub fn from_exception(function: u8, code: u8) -> Self {
        match code {
            crate::constants::EXCEPTION_ILLEGAL_FUNCTION => {
                Self::IllegalFunction(format!("function 0x{:02x}", function))
            }
            crate::constants::EXCEPTION_ILLEGAL_DATA_ADDRESS => {
                Self::IllegalDataAddress(format!("rejected by function 0x{:02x}", function))
            }
            _ => Self::DeviceException { function, code },
        }
    }

    /// The device understood the request but refused part of it
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::IllegalDataAddress(_) | Self::IllegalFunction(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WireTimeout(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AbcError>;

impl From<TransportError> for AbcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => AbcError::WireTimeout(msg),
            other => AbcError::TransportError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AbcError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            AbcError::WireTimeout(err.to_string())
        } else {
            AbcError::TransportError(err.to_string())
        }
    }
}

impl From<figment::Error> for AbcError {
    fn from(err: figment::Error) -> Self {
        AbcError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_mapping() {
        assert!(matches!(
            AbcError::from_exception(0x41, 0x02),
            AbcError::IllegalDataAddress(_)
        ));
        assert!(matches!(
            AbcError::from_exception(0x44, 0x01),
            AbcError::IllegalFunction(_)
        ));
        assert_eq!(
            AbcError::from_exception(0x03, 0x04),
            AbcError::DeviceException {
                function: 0x03,
                code: 0x04
            }
        );
    }

    #[test]
    fn test_transport_timeout_becomes_wire_timeout() {
        let err: AbcError = TransportError::Timeout("no reply".to_string()).into();
        assert!(err.is_timeout());

        let err: AbcError = TransportError::SendFailed("broken pipe".to_string()).into();
        assert!(matches!(err, AbcError::TransportError(_)));
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_error_display() {
        let err = AbcError::validation("heating setpoint 95 outside 40..=90");
        assert_eq!(
            err.to_string(),
            "Validation error: heating setpoint 95 outside 40..=90"
        );
    }
}
