//! Error types for the bridge.

use thiserror::Error;

use crate::value::HostValue;

/// Errors that can occur while driving the script engine from the host.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A script exception crossed the boundary.
    ///
    /// `message` is the exception's `message` property (or its string form)
    /// and `value` the marshaled thrown value, when it could be captured.
    /// Display prints the bare message so error text survives a full
    /// host -> script -> host round trip.
    #[error("{message}")]
    Script {
        message: String,
        value: Option<Box<HostValue>>,
    },

    /// Attribute lookup failed (the property is absent, including the
    /// prototype chain).
    #[error("object has no attribute '{0}'")]
    AttributeNotFound(String),

    /// Mapping lookup failed (no own enumerable property with this key).
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    /// Sequence index outside the valid range.
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    /// A value had the wrong type for the requested operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Extended slice assignment with a replacement of the wrong length.
    #[error("length mismatch: {0}")]
    LengthMismatch(String),

    /// The engine ran out of memory.
    #[error("script engine out of memory")]
    OutOfMemory,

    /// An engine fault that is not a script exception.
    #[error("engine error: {0}")]
    Engine(String),
}

impl BridgeError {
    /// Create a script error without a captured value
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
            value: None,
        }
    }

    /// Create an attribute lookup error
    pub fn attribute_not_found(name: impl Into<String>) -> Self {
        Self::AttributeNotFound(name.into())
    }

    /// Create a mapping lookup error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound(key.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    /// Create a length mismatch error
    pub fn length_mismatch(message: impl Into<String>) -> Self {
        Self::LengthMismatch(message.into())
    }

    /// Create an engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Error raised by host callables invoked from script.
///
/// Thrown into the script context as an `Error` whose `message` is this
/// message, so script code can catch it.
#[derive(Debug, Clone)]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

impl From<BridgeError> for HostError {
    fn from(err: BridgeError) -> Self {
        Self::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_error_displays_bare_message() {
        let err = BridgeError::script("-*Message*-");
        assert_eq!(err.to_string(), "-*Message*-");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            BridgeError::attribute_not_found("abc").to_string(),
            "object has no attribute 'abc'"
        );
        assert_eq!(
            BridgeError::key_not_found("x").to_string(),
            "key 'x' not found"
        );
        assert_eq!(
            BridgeError::IndexOutOfRange(-6).to_string(),
            "index -6 out of range"
        );
    }

    #[test]
    fn test_host_error_from_bridge_error() {
        let host: HostError = BridgeError::script("boom").into();
        assert_eq!(host.message(), "boom");
    }
}
