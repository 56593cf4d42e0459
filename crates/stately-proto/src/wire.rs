//! Frames of the bidirectional entity stream.
//!
//! The proxy dials into the user function and speaks one stream per live
//! entity. Inbound frames carry init, state, deltas, commands, deletes and
//! stream cancellations; outbound frames carry replies composed of a client
//! action, a state action and side effects. Transport and codec are owned by
//! collaborators; these types are the shared vocabulary.

use crate::crdt::{CrdtDelta, CrdtState};
use crate::payload::Payload;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identity of an entity instance within its service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Correlation id of one command on one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// First inbound frame of every stream: binds the entity identity and may
/// carry the current value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Init {
    /// Fully qualified name of the service the entity belongs to.
    pub service_name: String,
    /// Identity of the entity instance.
    pub entity_id: EntityId,
    /// Current value held by the proxy, absent for a fresh entity.
    pub state: Option<CrdtState>,
}

/// An inbound command addressed to the entity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Command {
    /// Correlation id; replies carry it back.
    pub id: CommandId,
    /// Identity of the target entity.
    pub entity_id: EntityId,
    /// Command name, dispatched by the entity's command handler.
    pub name: String,
    /// Encoded command argument.
    pub payload: Payload,
    /// Whether the reply channel stays open for on-change messages.
    pub streamed: bool,
}

/// Client-initiated cancellation of one streamed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StreamCancelled {
    /// Id of the streamed command being cancelled.
    pub command_id: CommandId,
}

/// Frames received from the proxy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntityStreamIn {
    /// Stream opening; must be first and only first.
    Init(Init),
    /// Replacement of the entire value.
    State(CrdtState),
    /// Incremental change from another replica.
    Changed(CrdtDelta),
    /// The proxy deleted the entity.
    Deleted,
    /// A command for the entity to handle.
    Command(Command),
    /// Cancellation of one streamed command.
    StreamCancelled(StreamCancelled),
}

/// A request to forward command handling to another entity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Forward {
    /// Service to forward to.
    pub service_name: String,
    /// Command to invoke on the target service.
    pub command_name: String,
    /// Argument for the forwarded command.
    pub payload: Option<Payload>,
}

/// An effect to be performed on another entity after the reply.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SideEffect {
    /// Service to invoke.
    pub service_name: String,
    /// Command to invoke on the target service.
    pub command_name: String,
    /// Argument for the effect command.
    pub payload: Option<Payload>,
    /// Whether the proxy must complete the effect before the client reply.
    pub synchronous: bool,
}

/// A failure addressed to the client or, without a command id, the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Failure {
    /// The failed command, absent for stream-level failures.
    pub command_id: Option<CommandId>,
    /// Human-readable description.
    pub description: String,
}

/// The reply-side directive addressing the end client.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClientAction {
    /// Answer the client with a payload.
    Reply {
        /// The reply payload.
        payload: Payload,
    },
    /// Hand the command to another entity.
    Forward(Forward),
    /// Fail the command.
    Failure(Failure),
}

/// The reply-side directive to the proxy about its authoritative replica.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrdtStateAction {
    /// Create the replica with this full state.
    Create(CrdtState),
    /// Merge this delta into the replica.
    Update(CrdtDelta),
    /// Delete the replica.
    Delete,
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reply {
    /// The command being answered.
    pub command_id: CommandId,
    /// Directive for the client, if any.
    pub client_action: Option<ClientAction>,
    /// Effects accumulated by the handler, in insertion order.
    pub side_effects: Vec<SideEffect>,
    /// Directive for the proxy's replica, if any.
    pub state_action: Option<CrdtStateAction>,
}

/// Output of a streamed command's change or cancel callback.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StreamedMessage {
    /// The streamed command this message belongs to.
    pub command_id: CommandId,
    /// Directive for the client, if any.
    pub client_action: Option<ClientAction>,
    /// Effects accumulated by the callback, in insertion order.
    pub side_effects: Vec<SideEffect>,
    /// Directive for the proxy's replica, if any.
    pub state_action: Option<CrdtStateAction>,
    /// When set, the subscription is over and no further messages follow.
    pub end_stream: bool,
}

/// Frames sent to the proxy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntityStreamOut {
    /// Reply to one command.
    Reply(Reply),
    /// Message on a streamed command's open channel.
    Streamed(StreamedMessage),
    /// Stream- or command-level failure.
    Failure(Failure),
}
