//! # stately
//!
//! The stateful-entity side of a managed, sharded stateful-services
//! platform. The platform's proxy owns cluster concerns (sharding,
//! replication, durability, client ingress) and dials into this library
//! over a bidirectional stream, one per live entity. The user function owns
//! domain logic and state evolution: given an entity identity and a stream
//! of init / state / delta / command / delete frames, it produces replies
//! carrying client actions, state actions and side effects.
//!
//! The building blocks:
//!
//! - [`Server`] - registry of entity descriptors and the stream entry point
//! - [`EntityHandler`] / [`EntityDescriptor`] - the user-function seam
//! - [`Context`] / [`CommandContext`] - per-entity and per-command state
//! - [`codec`] - the process-wide typed-payload registry
//! - `stately_proto` (re-exported as [`proto`]) - wire frames and the CRDT
//!   algebra
//!
//! ## Writing an entity
//!
//! ```rust
//! use std::any::Any;
//!
//! use async_trait::async_trait;
//! use serde::{Deserialize, Serialize};
//! use stately::codec::{self, TypedMessage};
//! use stately::error::CommandError;
//! use stately::proto::crdt::{Crdt, GCounter};
//! use stately::proto::Payload;
//! use stately::{CommandContext, Context, EntityDescriptor, EntityHandler, Server};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Add {
//!     amount: u64,
//! }
//!
//! impl TypedMessage for Add {
//!     const TYPE_NAME: &'static str = "example.counter.Add";
//! }
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl EntityHandler for Counter {
//!     fn default_crdt(&mut self, _ctx: &Context) -> Option<Crdt> {
//!         Some(Crdt::GCounter(GCounter::new()))
//!     }
//!
//!     async fn handle_command(
//!         &mut self,
//!         ctx: &mut CommandContext<'_>,
//!         name: &str,
//!         message: &(dyn Any + Send + Sync),
//!     ) -> Result<Option<Payload>, CommandError> {
//!         match (name, message.downcast_ref::<Add>()) {
//!             ("Add", Some(add)) => {
//!                 let Some(Crdt::GCounter(counter)) = ctx.crdt_mut() else {
//!                     return Err(CommandError::failure("counter not materialized"));
//!                 };
//!                 counter.increment(add.amount);
//!                 Ok(Some(Payload::from_i64(counter.value() as i64)))
//!             }
//!             _ => Err(CommandError::Unknown(name.to_string())),
//!         }
//!     }
//! }
//!
//! codec::register_type::<Add>();
//! let server = Server::new();
//! server
//!     .register(EntityDescriptor::new(
//!         "example.counter.CounterService",
//!         |_id| Box::new(Counter),
//!     ))
//!     .unwrap();
//! ```
//!
//! The transport, payload schema compiler and process entry point are owned
//! by the host; [`Transport`] is the seam they plug into.

pub mod codec;
pub mod command;
pub mod context;
pub mod entity;
pub mod error;
pub mod registry;
pub mod runner;

pub use stately_proto as proto;

pub use self::command::{CancelFn, ChangeFn, CommandContext};
pub use self::context::Context;
pub use self::entity::{EntityDescriptor, EntityFactory, EntityHandler};
pub use self::error::{
    CodecError, CommandError, ProtocolError, RegistrationError, TransportError,
};
pub use self::registry::Server;
pub use self::runner::{ChannelTransport, ProxyEnd, Transport};
