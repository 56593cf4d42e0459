//! Test proxy driving a stream runner over in-process channels.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stately::codec::TypedMessage;
use stately::proto::crdt::CrdtState;
use stately::proto::wire::{
    Command, CommandId, EntityId, EntityStreamIn, EntityStreamOut, Init, Reply, StreamCancelled,
};
use stately::proto::Payload;
use stately::{ChannelTransport, ProtocolError, Server};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// One proxy-side stream: sends frames to a spawned runner, reads frames
/// back, correlates command ids.
pub struct TestProxy {
    inbound: mpsc::Sender<EntityStreamIn>,
    outbound: mpsc::Receiver<EntityStreamOut>,
    runner: JoinHandle<Result<(), ProtocolError>>,
    next_command_id: u64,
}

impl TestProxy {
    /// Opens a stream against the server.
    pub fn start(server: Arc<Server>) -> Self {
        let (mut transport, proxy_end) = ChannelTransport::pair(16);
        let runner = tokio::spawn(async move { server.handle(&mut transport).await });
        Self {
            inbound: proxy_end.inbound,
            outbound: proxy_end.outbound,
            runner,
            next_command_id: 0,
        }
    }

    /// Sends a raw inbound frame.
    pub async fn send(&self, frame: EntityStreamIn) -> anyhow::Result<()> {
        self.inbound
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("runner closed its inbound channel"))
    }

    /// Sends the stream-opening init frame.
    pub async fn init(&self, service_name: &str, entity_id: &str) -> anyhow::Result<()> {
        self.init_frame(service_name, entity_id, None).await
    }

    /// Sends an init frame carrying the proxy's current state.
    pub async fn init_with_state(
        &self,
        service_name: &str,
        entity_id: &str,
        state: CrdtState,
    ) -> anyhow::Result<()> {
        self.init_frame(service_name, entity_id, Some(state)).await
    }

    async fn init_frame(
        &self,
        service_name: &str,
        entity_id: &str,
        state: Option<CrdtState>,
    ) -> anyhow::Result<()> {
        self.send(EntityStreamIn::Init(Init {
            service_name: service_name.to_string(),
            entity_id: EntityId::new(entity_id),
            state,
        }))
        .await
    }

    /// Receives one outbound frame, failing the test after a timeout.
    pub async fn recv(&mut self) -> anyhow::Result<EntityStreamOut> {
        match timeout(RECV_TIMEOUT, self.outbound.recv()).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(anyhow::anyhow!("runner closed its outbound channel")),
            Err(_) => Err(anyhow::anyhow!("timed out waiting for an outbound frame")),
        }
    }

    /// Asserts the stream produced no further frame and ended.
    pub async fn recv_none(&mut self) -> anyhow::Result<()> {
        match timeout(RECV_TIMEOUT, self.outbound.recv()).await {
            Ok(None) => Ok(()),
            Ok(Some(frame)) => Err(anyhow::anyhow!("unexpected outbound frame: {frame:?}")),
            Err(_) => Err(anyhow::anyhow!("timed out waiting for stream end")),
        }
    }

    fn next_id(&mut self) -> CommandId {
        self.next_command_id += 1;
        CommandId::new(self.next_command_id)
    }

    /// Sends a unary command and returns its reply frame.
    pub async fn command<T: TypedMessage>(
        &mut self,
        entity_id: &str,
        name: &str,
        message: &T,
    ) -> anyhow::Result<Reply> {
        let id = self.send_command(entity_id, name, message, false).await?;
        self.expect_reply(id).await
    }

    /// Sends a streamed command and returns its initial reply frame.
    pub async fn streamed_command<T: TypedMessage>(
        &mut self,
        entity_id: &str,
        name: &str,
        message: &T,
    ) -> anyhow::Result<(CommandId, Reply)> {
        let id = self.send_command(entity_id, name, message, true).await?;
        let reply = self.expect_reply(id).await?;
        Ok((id, reply))
    }

    /// Sends a command frame without waiting for the reply.
    pub async fn send_command<T: TypedMessage>(
        &mut self,
        entity_id: &str,
        name: &str,
        message: &T,
        streamed: bool,
    ) -> anyhow::Result<CommandId> {
        let id = self.next_id();
        let payload = stately::codec::encode(message)?;
        self.send(EntityStreamIn::Command(Command {
            id,
            entity_id: EntityId::new(entity_id),
            name: name.to_string(),
            payload,
            streamed,
        }))
        .await?;
        Ok(id)
    }

    /// Cancels a streamed command.
    pub async fn cancel(&self, command_id: CommandId) -> anyhow::Result<()> {
        self.send(EntityStreamIn::StreamCancelled(StreamCancelled {
            command_id,
        }))
        .await
    }

    async fn expect_reply(&mut self, id: CommandId) -> anyhow::Result<Reply> {
        match self.recv().await? {
            EntityStreamOut::Reply(reply) if reply.command_id == id => Ok(reply),
            frame => Err(anyhow::anyhow!(
                "expected a reply to command {id}, got: {frame:?}"
            )),
        }
    }

    /// Closes the proxy side and returns the runner's exit.
    pub async fn finish(self) -> anyhow::Result<Result<(), ProtocolError>> {
        drop(self.inbound);
        Ok(self.runner.await?)
    }
}

/// Decodes a reply payload into its message type.
pub fn decode_payload<T: TypedMessage>(payload: &Payload) -> anyhow::Result<T> {
    Ok(serde_json::from_slice(&payload.value)?)
}

/// Extracts and decodes the reply client action of a reply frame.
pub fn reply_payload<T: TypedMessage>(reply: &Reply) -> anyhow::Result<T> {
    use stately::proto::wire::ClientAction;
    match &reply.client_action {
        Some(ClientAction::Reply { payload }) => decode_payload(payload),
        other => Err(anyhow::anyhow!("expected a reply client action: {other:?}")),
    }
}
