//! Unified error handling for the entity runtime.
//!
//! Errors are split by blast radius: `CommandError` is recoverable and
//! becomes a failure client action on one reply; `ProtocolError` terminates
//! the stream (the proxy is expected to reopen); `RegistrationError` and
//! `CodecError` surface misconfiguration.

use stately_proto::crdt::CrdtError;
use thiserror::Error;

/// Errors returned by entity command handlers.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The handler failed the command. Becomes the reply's failure client
    /// action; the stream continues.
    #[error("{0}")]
    Failure(String),

    /// The entity has no handler for this command name. Terminates the
    /// stream as a protocol violation.
    #[error("unknown command: {0}")]
    Unknown(String),
}

impl CommandError {
    /// Shorthand for a client failure.
    pub fn failure(description: impl Into<String>) -> Self {
        Self::Failure(description.into())
    }
}

/// Errors raised while decoding or encoding typed payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No decoder is registered for the payload's type.
    #[error("no message type registered for: {0}")]
    UnknownType(String),

    /// The payload bytes do not decode as the registered type.
    #[error("malformed payload for {type_url}: {source}")]
    Malformed {
        /// Type URL of the offending payload.
        type_url: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A message failed to encode.
    #[error("failed to encode {type_name}: {source}")]
    Encode {
        /// Fully qualified name of the message type.
        type_name: &'static str,
        /// Underlying encode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while registering an entity descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    /// A descriptor with this service name is already registered.
    #[error("service is already registered: {0}")]
    DuplicateService(String),

    /// The descriptor carries no service name.
    #[error("service name must not be empty")]
    EmptyServiceName,
}

/// Errors raised by the transport seam.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer is gone; nothing more can be sent.
    #[error("transport closed")]
    Closed,
}

/// Stream-fatal errors. The runner sends a best-effort top-level failure
/// frame and terminates; the process and other streams continue.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The first frame of the stream was not an init.
    #[error("a message was received before an init message")]
    InitExpected,

    /// A second init arrived on a live stream.
    #[error("duplicate init message for the same entity")]
    DuplicateInit,

    /// A delta arrived before any state was received.
    #[error("received a delta without having received any state")]
    DeltaWithoutState,

    /// The init named a service nobody registered.
    #[error("received a command for an unknown service: {0}")]
    UnknownService(String),

    /// A command named no handler on the entity.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A handler returned a reply and recorded a forward.
    #[error("reply and forward both set")]
    ReplyAndForward,

    /// The entity failed fatally via its context.
    #[error("entity failed: {0}")]
    EntityFailed(String),

    /// A payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Inbound state or delta did not fit the current CRDT.
    #[error(transparent)]
    Crdt(#[from] CrdtError),

    /// The transport gave out mid-reply.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
