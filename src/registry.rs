//! Process-wide service registry and the stream entry point.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{instrument, warn};

use stately_proto::wire::{EntityStreamOut, Failure};

use crate::entity::EntityDescriptor;
use crate::error::{ProtocolError, RegistrationError};
use crate::runner::{self, Transport};

/// Serves entity streams for the descriptors registered with it.
///
/// Registration happens at process start; lookups are concurrent and
/// read-only for the process lifetime. Each call to [`Server::handle`]
/// serves one stream to completion; parallel streams are served by parallel
/// calls.
pub struct Server {
    entities: DashMap<String, Arc<EntityDescriptor>>,
}

impl Server {
    /// Creates a server with no registered entities.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
        }
    }

    /// Registers an entity descriptor under its service name.
    ///
    /// Fails on an empty service name or when the name is already taken.
    pub fn register(&self, descriptor: EntityDescriptor) -> Result<(), RegistrationError> {
        let service_name = descriptor.service_name().to_string();
        if service_name.is_empty() {
            return Err(RegistrationError::EmptyServiceName);
        }
        match self.entities.entry(service_name) {
            Entry::Occupied(occupied) => {
                Err(RegistrationError::DuplicateService(occupied.key().clone()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    pub(crate) fn lookup(&self, service_name: &str) -> Option<Arc<EntityDescriptor>> {
        self.entities
            .get(service_name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Serves one entity stream to completion.
    ///
    /// Protocol violations are reported with a best-effort top-level failure
    /// frame before the error is returned; transport cancellation and EOF
    /// end the stream silently.
    #[instrument(skip_all, name = "entity_stream")]
    pub async fn handle(&self, transport: &mut dyn Transport) -> Result<(), ProtocolError> {
        match runner::run(self, transport).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "entity stream failed");
                let _ = transport
                    .send(EntityStreamOut::Failure(Failure {
                        command_id: None,
                        description: err.to_string(),
                    }))
                    .await;
                Err(err)
            }
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
