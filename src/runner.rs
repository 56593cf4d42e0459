//! Stream runner - the per-stream entity state machine.
//!
//! One runner serves one bidirectional stream for one live entity:
//!
//! ```text
//! AWAIT_INIT ──Init──▶ READY ──(Deleted | failure | EOF)──▶ TERMINATED
//! ```
//!
//! Frames are processed strictly one at a time; each produces at most one
//! reply (plus zero or more subscriber-driven streamed messages) before the
//! next frame is read, which gives a total order of effects on the entity
//! replica without locking. Parallel streams are served by parallel runners.

use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::debug;

use stately_proto::crdt::Crdt;
use stately_proto::wire::{
    Command, EntityStreamIn, EntityStreamOut, Failure, Reply, StreamCancelled, StreamedMessage,
};

use crate::codec;
use crate::command::{CommandContext, Subscription};
use crate::context::Context;
use crate::entity::EntityHandler;
use crate::error::{CommandError, ProtocolError, TransportError};
use crate::registry::Server;

/// The bidirectional frame channel the proxy dials in on.
///
/// `recv` returning `Ok(None)` means the stream ended cleanly, either by EOF
/// or by transport cancellation; the runner exits silently in both cases.
#[async_trait]
pub trait Transport: Send {
    /// Receives the next inbound frame.
    async fn recv(&mut self) -> Result<Option<EntityStreamIn>, TransportError>;

    /// Sends one outbound frame.
    async fn send(&mut self, frame: EntityStreamOut) -> Result<(), TransportError>;
}

/// The proxy-facing half of a [`ChannelTransport`].
pub struct ProxyEnd {
    /// Frames written here arrive at the runner.
    pub inbound: mpsc::Sender<EntityStreamIn>,
    /// Frames the runner sends are read here.
    pub outbound: mpsc::Receiver<EntityStreamOut>,
}

/// In-process [`Transport`] over a pair of bounded channels.
///
/// This is the seam integration glue plugs into: a gRPC bridge forwards
/// wire messages into the inbound sender and drains the outbound receiver,
/// and tests drive a runner the same way.
pub struct ChannelTransport {
    inbound: mpsc::Receiver<EntityStreamIn>,
    outbound: mpsc::Sender<EntityStreamOut>,
}

impl ChannelTransport {
    /// Creates a connected transport/proxy pair with the given channel
    /// capacity.
    pub fn pair(capacity: usize) -> (Self, ProxyEnd) {
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        (
            Self {
                inbound: in_rx,
                outbound: out_tx,
            },
            ProxyEnd {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<EntityStreamIn>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, frame: EntityStreamOut) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

struct StreamState {
    context: Context,
    instance: Box<dyn EntityHandler>,
    state_received: bool,
}

pub(crate) async fn run(
    server: &Server,
    transport: &mut dyn Transport,
) -> Result<(), ProtocolError> {
    let Some(first) = transport.recv().await? else {
        return Ok(());
    };
    let EntityStreamIn::Init(init) = first else {
        return Err(ProtocolError::InitExpected);
    };

    let descriptor = server
        .lookup(&init.service_name)
        .ok_or_else(|| ProtocolError::UnknownService(init.service_name.clone()))?;
    debug!(
        service = %init.service_name,
        entity = %init.entity_id,
        "entity stream opened"
    );

    let instance = match panic::catch_unwind(AssertUnwindSafe(|| {
        descriptor.instantiate(&init.entity_id)
    })) {
        Ok(instance) => instance,
        Err(payload) => {
            let payload = report_panic(transport, payload).await;
            panic::resume_unwind(payload)
        }
    };

    let mut st = StreamState {
        context: Context::new(init.entity_id, descriptor),
        instance,
        state_received: false,
    };

    if let Some(state) = init.state {
        st.context.apply_state(state)?;
        st.state_received = true;
        notify_configured(&mut st, transport).await;
    } else {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            st.context.init_default(st.instance.as_mut());
        }));
        if let Err(payload) = outcome {
            let payload = report_panic(transport, payload).await;
            panic::resume_unwind(payload)
        }
    }

    loop {
        if st.context.deleted || !st.context.active {
            if let Some(description) = st.context.failed.take() {
                return Err(ProtocolError::EntityFailed(description));
            }
            return Ok(());
        }

        let Some(frame) = transport.recv().await? else {
            return Ok(());
        };
        match frame {
            EntityStreamIn::Init(_) => return Err(ProtocolError::DuplicateInit),
            EntityStreamIn::State(state) => {
                st.context.apply_state(state)?;
                st.state_received = true;
                notify_configured(&mut st, transport).await;
                fan_out_changes(&mut st, transport).await?;
            }
            EntityStreamIn::Changed(delta) => {
                if !st.state_received {
                    return Err(ProtocolError::DeltaWithoutState);
                }
                st.context.apply_delta(delta)?;
                fan_out_changes(&mut st, transport).await?;
            }
            EntityStreamIn::Deleted => {
                // The proxy already removed the entity; close without a
                // reply frame.
                st.context.delete();
            }
            EntityStreamIn::Command(command) => {
                handle_command(&mut st, transport, command).await?;
            }
            EntityStreamIn::StreamCancelled(cancelled) => {
                handle_cancellation(&mut st, transport, cancelled).await?;
                fan_out_changes(&mut st, transport).await?;
            }
        }
    }
}

/// Runs the set-CRDT hook after a CRDT was materialized or replaced.
async fn notify_configured(st: &mut StreamState, transport: &mut dyn Transport) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(crdt) = st.context.crdt() {
            st.instance.configure(&st.context, crdt);
        }
    }));
    if let Err(payload) = outcome {
        let payload = report_panic(transport, payload).await;
        panic::resume_unwind(payload)
    }
}

async fn handle_command(
    st: &mut StreamState,
    transport: &mut dyn Transport,
    command: Command,
) -> Result<(), ProtocolError> {
    let message = codec::decode(&command.payload)?;

    let mut cctx = CommandContext::new(&mut st.context, &command);
    let outcome = AssertUnwindSafe(st.instance.handle_command(
        &mut cctx,
        &command.name,
        message.as_ref(),
    ))
    .catch_unwind()
    .await;

    let reply = match outcome {
        Ok(Ok(payload)) => payload,
        Ok(Err(CommandError::Failure(description))) => {
            cctx.fail(description);
            None
        }
        Ok(Err(CommandError::Unknown(name))) => {
            return Err(ProtocolError::UnknownCommand(name));
        }
        Err(payload) => {
            drop(cctx);
            let payload = report_panic(transport, payload).await;
            panic::resume_unwind(payload)
        }
    };

    let failed = cctx.failure.is_some();
    let violation = cctx.reply_and_forward(&reply);
    let client_action = cctx.client_action(reply);
    let side_effects = mem::take(&mut cctx.side_effects);
    let ended = cctx.ended;
    let change = cctx.change.take();
    let cancel = cctx.cancel.take();
    drop(cctx);

    let state_action = st.context.state_action();

    // Streamed commands that installed a change callback subscribe before
    // the reply is flushed.
    let command_id = command.id;
    if command.streamed && !failed && !violation && !ended && change.is_some() {
        st.context.subscriptions.insert(
            command_id,
            Subscription {
                command,
                change,
                cancel,
            },
        );
    }

    transport
        .send(EntityStreamOut::Reply(Reply {
            command_id,
            client_action,
            side_effects,
            state_action,
        }))
        .await?;

    if violation {
        return Err(ProtocolError::ReplyAndForward);
    }
    Ok(())
}

/// Visits every live subscriber after a state-changing frame and reconciles
/// each change callback into at most one streamed message.
async fn fan_out_changes(
    st: &mut StreamState,
    transport: &mut dyn Transport,
) -> Result<(), ProtocolError> {
    let mut ids: Vec<_> = st.context.subscriptions.keys().copied().collect();
    ids.sort_unstable();

    for id in ids {
        let Some(mut sub) = st.context.subscriptions.remove(&id) else {
            continue;
        };
        let Some(mut change) = sub.change.take() else {
            st.context.subscriptions.insert(id, sub);
            continue;
        };

        let mut cctx = CommandContext::new(&mut st.context, &sub.command);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| change(&mut cctx)));
        let reply = match outcome {
            Ok(Ok(payload)) => payload,
            Ok(Err(err)) => {
                cctx.fail(err.to_string());
                None
            }
            Err(payload) => {
                drop(cctx);
                let payload = report_panic(transport, payload).await;
                panic::resume_unwind(payload)
            }
        };

        // Change callbacks observe the CRDT read-only; a produced delta
        // fails the subscription and the illegal delta is discarded.
        if cctx.crdt().is_some_and(Crdt::has_delta) {
            if let Some(crdt) = cctx.crdt_mut() {
                crdt.reset_delta();
            }
            cctx.fail("state changed in change callback");
        }

        let failed = cctx.failure.is_some();
        let violation = cctx.reply_and_forward(&reply);
        let client_action = cctx.client_action(reply);
        let side_effects = mem::take(&mut cctx.side_effects);
        let ended = cctx.ended;
        let new_change = cctx.change.take();
        let new_cancel = cctx.cancel.take();
        drop(cctx);

        if failed || violation {
            // The subscription is failed and stays removed; the runner and
            // its remaining subscribers continue.
            transport
                .send(EntityStreamOut::Streamed(StreamedMessage {
                    command_id: id,
                    client_action,
                    side_effects: Vec::new(),
                    state_action: None,
                    end_stream: true,
                }))
                .await?;
            if violation {
                return Err(ProtocolError::ReplyAndForward);
            }
            continue;
        }

        if client_action.is_some() || ended || !side_effects.is_empty() {
            transport
                .send(EntityStreamOut::Streamed(StreamedMessage {
                    command_id: id,
                    client_action,
                    side_effects,
                    state_action: None,
                    end_stream: ended,
                }))
                .await?;
        }

        if !ended {
            sub.change = new_change.or(Some(change));
            if new_cancel.is_some() {
                sub.cancel = new_cancel;
            }
            st.context.subscriptions.insert(id, sub);
        }
    }
    Ok(())
}

async fn handle_cancellation(
    st: &mut StreamState,
    transport: &mut dyn Transport,
    cancelled: StreamCancelled,
) -> Result<(), ProtocolError> {
    let id = cancelled.command_id;
    let Some(mut sub) = st.context.subscriptions.remove(&id) else {
        // Races a subscription that ended itself just before the cancel.
        debug!(command_id = %id, "stream cancel for unknown subscription");
        return Ok(());
    };

    let mut cctx = CommandContext::new(&mut st.context, &sub.command);
    if let Some(cancel) = sub.cancel.take() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| cancel(&mut cctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => cctx.fail(err.to_string()),
            Err(payload) => {
                drop(cctx);
                let payload = report_panic(transport, payload).await;
                panic::resume_unwind(payload)
            }
        }
    }

    let client_action = cctx.client_action(None);
    let side_effects = mem::take(&mut cctx.side_effects);
    drop(cctx);

    // Cancel callbacks may mutate the CRDT; the terminal streamed message
    // carries the resulting state action.
    let state_action = st.context.state_action();
    transport
        .send(EntityStreamOut::Streamed(StreamedMessage {
            command_id: id,
            client_action,
            side_effects,
            state_action,
            end_stream: true,
        }))
        .await?;
    Ok(())
}

/// Best-effort failure report before a panic propagates to the host.
async fn report_panic(
    transport: &mut dyn Transport,
    payload: Box<dyn Any + Send>,
) -> Box<dyn Any + Send> {
    let _ = transport
        .send(EntityStreamOut::Failure(Failure {
            command_id: None,
            description: format!("entity panicked: {}", panic_description(payload.as_ref())),
        }))
        .await;
    payload
}

fn panic_description(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
