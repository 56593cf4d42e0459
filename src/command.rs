//! Per-command scoped view of an entity context.
//!
//! A command context lives for one handler invocation (or one streamed
//! callback firing) and accumulates the ingredients of the reply: side
//! effects, at most one forward, an optional failure, and the streamed
//! change/cancel callbacks. Subscriptions outlive the borrow, so they are
//! stored as plain data in the entity context's table and a fresh command
//! context is rebuilt around them each time they fire.

use stately_proto::crdt::Crdt;
use stately_proto::payload::Payload;
use stately_proto::wire::{
    ClientAction, Command, CommandId, EntityId, Failure, Forward, SideEffect,
};

use crate::context::Context;
use crate::error::CommandError;

/// Streamed on-change callback. May inspect the CRDT but must not mutate
/// it; a produced delta fails the subscription.
pub type ChangeFn =
    Box<dyn FnMut(&mut CommandContext<'_>) -> Result<Option<Payload>, CommandError> + Send>;

/// Streamed on-cancel callback. May mutate the CRDT.
pub type CancelFn = Box<dyn FnOnce(&mut CommandContext<'_>) -> Result<(), CommandError> + Send>;

/// A live streamed command awaiting on-change and on-cancel callbacks.
pub(crate) struct Subscription {
    pub(crate) command: Command,
    pub(crate) change: Option<ChangeFn>,
    pub(crate) cancel: Option<CancelFn>,
}

/// Scoped view of a [`Context`] for one command or callback invocation.
pub struct CommandContext<'a> {
    ctx: &'a mut Context,
    command_id: CommandId,
    streamed: bool,
    pub(crate) side_effects: Vec<SideEffect>,
    pub(crate) forward: Option<Forward>,
    pub(crate) failure: Option<String>,
    pub(crate) ended: bool,
    pub(crate) change: Option<ChangeFn>,
    pub(crate) cancel: Option<CancelFn>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(ctx: &'a mut Context, command: &Command) -> Self {
        Self {
            ctx,
            command_id: command.id,
            streamed: command.streamed,
            side_effects: Vec::new(),
            forward: None,
            failure: None,
            ended: false,
            change: None,
            cancel: None,
        }
    }

    /// Identity of the entity the command addresses.
    pub fn entity_id(&self) -> &EntityId {
        self.ctx.entity_id()
    }

    /// Correlation id of this command.
    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    /// Whether the reply channel stays open for on-change messages.
    pub fn streamed(&self) -> bool {
        self.streamed
    }

    /// The entity's current CRDT.
    pub fn crdt(&self) -> Option<&Crdt> {
        self.ctx.crdt()
    }

    /// Mutable access to the entity's current CRDT.
    pub fn crdt_mut(&mut self) -> Option<&mut Crdt> {
        self.ctx.crdt_mut()
    }

    /// Marks the entity deleted, as [`Context::delete`].
    pub fn delete(&mut self) {
        self.ctx.delete();
    }

    /// Fails this command. Becomes the reply's failure client action; the
    /// first recorded failure wins.
    pub fn fail(&mut self, description: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(description.into());
        }
    }

    /// Records a forward to another entity. At most one forward per command.
    pub fn forward(&mut self, target: Forward) -> Result<(), CommandError> {
        if self.forward.is_some() {
            return Err(CommandError::failure("this command has already forwarded"));
        }
        self.forward = Some(target);
        Ok(())
    }

    /// Appends a side effect. Effects keep insertion order on the reply.
    pub fn side_effect(&mut self, effect: SideEffect) {
        self.side_effects.push(effect);
    }

    /// Installs the on-change callback. Silent no-op unless streamed.
    pub fn on_change(
        &mut self,
        f: impl FnMut(&mut CommandContext<'_>) -> Result<Option<Payload>, CommandError>
            + Send
            + 'static,
    ) {
        if self.streamed {
            self.change = Some(Box::new(f));
        }
    }

    /// Installs the on-cancel callback. Silent no-op unless streamed.
    pub fn on_cancel(
        &mut self,
        f: impl FnOnce(&mut CommandContext<'_>) -> Result<(), CommandError> + Send + 'static,
    ) {
        if self.streamed {
            self.cancel = Some(Box::new(f));
        }
    }

    /// Ends the subscription after the current reply. Silent no-op unless
    /// streamed.
    pub fn end(&mut self) {
        if self.streamed {
            self.ended = true;
        }
    }

    /// Whether the handler both returned a reply and recorded a forward,
    /// which the protocol forbids.
    pub(crate) fn reply_and_forward(&self, reply: &Option<Payload>) -> bool {
        self.failure.is_none() && reply.is_some() && self.forward.is_some()
    }

    /// Reconciles this command's outcome into at most one client action.
    ///
    /// Precedence: a failure wins; a reply alongside a forward is the fixed
    /// protocol failure; then the reply; then the forward; then nothing.
    pub(crate) fn client_action(&mut self, reply: Option<Payload>) -> Option<ClientAction> {
        if let Some(description) = self.failure.take() {
            return Some(ClientAction::Failure(Failure {
                command_id: Some(self.command_id),
                description,
            }));
        }
        if self.reply_and_forward(&reply) {
            return Some(ClientAction::Failure(Failure {
                command_id: Some(self.command_id),
                description: "reply and forward both set".to_string(),
            }));
        }
        if let Some(payload) = reply {
            return Some(ClientAction::Reply { payload });
        }
        if let Some(forward) = self.forward.take() {
            return Some(ClientAction::Forward(forward));
        }
        None
    }
}
