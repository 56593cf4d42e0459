//! # stately-proto
//!
//! Wire vocabulary and CRDT algebra for the stately entity protocol: the
//! frames exchanged between a stateful-services proxy and a user function,
//! the opaque typed payload envelope, and the eight replicated data types
//! entity state is made of.
//!
//! ## Features
//!
//! - Tagged frame unions for the bidirectional entity stream
//! - Payload envelope with primitive helpers and process-seeded hashing
//! - Counters (G, PN), sets (G-Set, OR-Set), flag, LWW register, vote and an
//!   OR-Map of nested CRDTs, each with exact state/delta contracts
//! - Optional `serde` support for every wire-facing type
//!
//! ## Quick start
//!
//! ```rust
//! use stately_proto::crdt::{Crdt, CrdtDelta, PNCounter};
//!
//! let mut counter = Crdt::PNCounter(PNCounter::new());
//! if let Crdt::PNCounter(c) = &mut counter {
//!     c.increment(7);
//!     c.decrement(28);
//! }
//! assert!(counter.has_delta());
//! match counter.delta() {
//!     CrdtDelta::PNCounter(d) => assert_eq!(d.change, -21),
//!     _ => unreachable!(),
//! }
//! counter.reset_delta();
//! assert!(!counter.has_delta());
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod crdt;
pub mod payload;
pub mod wire;

pub use self::crdt::{Crdt, CrdtDelta, CrdtError, CrdtState};
pub use self::payload::{stable_hash, Payload, PayloadError};
pub use self::wire::{
    ClientAction, Command, CommandId, CrdtStateAction, EntityId, EntityStreamIn, EntityStreamOut,
    Failure, Forward, Init, Reply, SideEffect, StreamCancelled, StreamedMessage,
};
