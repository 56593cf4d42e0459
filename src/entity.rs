//! Entity descriptors and the handler trait user functions implement.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use stately_proto::crdt::Crdt;
use stately_proto::payload::Payload;
use stately_proto::wire::EntityId;

use crate::command::CommandContext;
use crate::context::Context;
use crate::error::CommandError;

/// Domain logic of one entity kind.
///
/// One instance is created per live entity via the descriptor's factory and
/// owns no replicated state itself; the current CRDT lives on the [`Context`]
/// and handlers reach it through the command context.
#[async_trait]
pub trait EntityHandler: Send {
    /// Called whenever the runner materializes the entity's CRDT, from an
    /// inbound state or from [`EntityHandler::default_crdt`].
    fn configure(&mut self, ctx: &Context, crdt: &Crdt) {
        let _ = (ctx, crdt);
    }

    /// Produces the CRDT to use when the proxy has none for this entity.
    /// Returning `None` leaves the entity without state until the proxy
    /// sends some.
    fn default_crdt(&mut self, ctx: &Context) -> Option<Crdt> {
        let _ = ctx;
        None
    }

    /// Handles one command. The returned payload becomes the reply client
    /// action; `None` replies with no client action. The message is the
    /// decoded command argument, to be downcast to its registered type.
    async fn handle_command(
        &mut self,
        ctx: &mut CommandContext<'_>,
        name: &str,
        message: &(dyn Any + Send + Sync),
    ) -> Result<Option<Payload>, CommandError>;
}

/// Factory producing a fresh domain instance for an entity identity.
pub type EntityFactory = Box<dyn Fn(&EntityId) -> Box<dyn EntityHandler> + Send + Sync>;

/// Everything the runner needs to serve one entity kind, keyed by its fully
/// qualified service name. Created at registration, immutable thereafter.
pub struct EntityDescriptor {
    service_name: String,
    factory: EntityFactory,
}

impl EntityDescriptor {
    /// Creates a descriptor from a service name and an instance factory.
    pub fn new(
        service_name: impl Into<String>,
        factory: impl Fn(&EntityId) -> Box<dyn EntityHandler> + Send + Sync + 'static,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            factory: Box::new(factory),
        }
    }

    /// The fully qualified service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub(crate) fn instantiate(&self, id: &EntityId) -> Box<dyn EntityHandler> {
        (self.factory)(id)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}
