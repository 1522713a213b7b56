use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The native subsystem a failure came from. Each has its own error channel.
pub enum Subsystem {
    /// Lattice schemes: BFV, BGV, CKKS.
    Pke,

    /// Binary-gate scheme: FHEW.
    BinFhe,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pke => write!(f, "PKE"),
            Self::BinFhe => write!(f, "BinFHE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One half of a key pair.
pub enum KeyHalf {
    /// The public key.
    Public,

    /// The private (secret) key.
    Private,
}

impl fmt::Display for KeyHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
/// Errors that can occur in this crate.
pub enum Error {
    /// The object was released, or its construction never produced a handle.
    #[error("{kind} is closed or invalid")]
    Closed {
        /// The kind of object, e.g. `Ciphertext`.
        kind: &'static str,
    },

    /// The engine rejected a call. `message` is the engine's own description,
    /// passed through unchanged.
    #[error("{message}")]
    Native {
        /// The subsystem whose error channel held the message.
        subsystem: Subsystem,

        /// The operation that failed.
        op: &'static str,

        /// The engine's message.
        message: String,
    },

    /// An encoding was asked to encode nothing.
    #[error("{op}: input vector is empty")]
    EmptyInput {
        /// The operation that was attempted.
        op: &'static str,
    },

    /// A decrypted one-hot vector contained no hot slot.
    #[error("no index found in one-hot vector (all values are 0)")]
    IndexNotFound,

    /// A key pair does not hold the requested half.
    #[error("KeyPair has no {half} key")]
    MissingKey {
        /// The absent half.
        half: KeyHalf,
    },

    /// An argument was rejected before reaching the engine.
    #[error("{op}: {message}")]
    InvalidArgument {
        /// The operation that was attempted.
        op: &'static str,

        /// Why the argument was rejected.
        message: String,
    },

    /// The engine reported success but produced no object.
    #[error("{op} returned OK but null handle")]
    NullHandle {
        /// The operation that was called.
        op: &'static str,
    },

    /// A string blob was not valid UTF-8.
    #[error("{0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// A configuration could not be (de)serialized in binary form.
    #[error("{0}")]
    Bincode(#[from] bincode::Error),

    /// A configuration could not be (de)serialized as JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The engine's message, for [`Error::Native`] failures.
    pub fn native_message(&self) -> Option<&str> {
        match self {
            Self::Native { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A `Result` whose error is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_the_engine_conventions() {
        assert_eq!(
            Error::Closed { kind: "Ciphertext" }.to_string(),
            "Ciphertext is closed or invalid"
        );
        assert_eq!(
            Error::EmptyInput {
                op: "MakePackedPlaintext"
            }
            .to_string(),
            "MakePackedPlaintext: input vector is empty"
        );
        assert_eq!(
            Error::MissingKey {
                half: KeyHalf::Public
            }
            .to_string(),
            "KeyPair has no public key"
        );
        assert_eq!(
            Error::NullHandle { op: "KeyGen" }.to_string(),
            "KeyGen returned OK but null handle"
        );
    }

    #[test]
    fn native_message_is_only_for_engine_failures() {
        let err = Error::Native {
            subsystem: Subsystem::BinFhe,
            op: "EvalBinGate",
            message: "no bootstrapping key".into(),
        };

        assert_eq!(err.native_message(), Some("no bootstrapping key"));
        assert_eq!(err.to_string(), "no bootstrapping key");
        assert_eq!(Error::IndexNotFound.native_message(), None);
    }
}
