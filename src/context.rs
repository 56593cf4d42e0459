//! Per-entity session state.

use std::collections::HashMap;
use std::sync::Arc;

use stately_proto::crdt::{Crdt, CrdtDelta, CrdtError, CrdtState};
use stately_proto::wire::{CommandId, CrdtStateAction, EntityId};

use crate::command::Subscription;
use crate::entity::{EntityDescriptor, EntityHandler};

/// Mutable state of one live entity, owned by one stream runner.
///
/// Holds the identity, the current CRDT, the lifecycle flags and the table
/// of streamed subscribers. Invariants: once `active` is false no further
/// outbound frames are produced; while `created` is true the local CRDT has
/// never been announced to the proxy; a delete while `created` short-circuits
/// the pending create.
pub struct Context {
    entity_id: EntityId,
    descriptor: Arc<EntityDescriptor>,
    crdt: Option<Crdt>,
    pub(crate) created: bool,
    pub(crate) deleted: bool,
    pub(crate) active: bool,
    pub(crate) failed: Option<String>,
    pub(crate) subscriptions: HashMap<CommandId, Subscription>,
}

impl Context {
    pub(crate) fn new(entity_id: EntityId, descriptor: Arc<EntityDescriptor>) -> Self {
        Self {
            entity_id,
            descriptor,
            crdt: None,
            created: false,
            deleted: false,
            active: true,
            failed: None,
            subscriptions: HashMap::new(),
        }
    }

    /// Identity of this entity.
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Fully qualified service name this entity belongs to.
    pub fn service_name(&self) -> &str {
        self.descriptor.service_name()
    }

    /// The current CRDT, absent until a state arrives or a default is made.
    pub fn crdt(&self) -> Option<&Crdt> {
        self.crdt.as_ref()
    }

    /// Mutable access to the current CRDT.
    pub fn crdt_mut(&mut self) -> Option<&mut Crdt> {
        self.crdt.as_mut()
    }

    /// Whether the proxy has deleted, or the entity requested deletion of,
    /// this entity.
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    /// Marks the entity deleted. If a locally created CRDT was never
    /// announced, the delete short-circuits the pending create.
    pub fn delete(&mut self) {
        self.deleted = true;
    }

    /// Fails the entity fatally. The runner reports the failure and stops
    /// producing frames for this stream.
    pub fn fail(&mut self, description: impl Into<String>) {
        if self.failed.is_none() {
            self.failed = Some(description.into());
        }
        self.active = false;
    }

    /// Replaces the current value wholesale. Materializes the CRDT when none
    /// is bound yet; clears any pending delta and the `created` flag, since
    /// the proxy authoritatively knows this state.
    pub(crate) fn apply_state(&mut self, state: CrdtState) -> Result<(), CrdtError> {
        match self.crdt.as_mut() {
            Some(crdt) => {
                crdt.apply_state(state)?;
                crdt.reset_delta();
            }
            None => self.crdt = Some(Crdt::from_state(state)),
        }
        self.created = false;
        Ok(())
    }

    /// Merges an inbound delta. The runner guarantees a state was received
    /// first, so a bound CRDT is an invariant here.
    pub(crate) fn apply_delta(&mut self, delta: CrdtDelta) -> Result<(), CrdtError> {
        if let Some(crdt) = self.crdt.as_mut() {
            crdt.apply_delta(delta)?;
        }
        Ok(())
    }

    /// Binds the descriptor's default CRDT when none is bound yet. Marks the
    /// entity `created`: the complete initial value is pending announcement.
    pub(crate) fn init_default(&mut self, instance: &mut dyn EntityHandler) {
        if self.crdt.is_some() {
            return;
        }
        if let Some(crdt) = instance.default_crdt(self) {
            self.crdt = Some(crdt);
            self.created = true;
            if let Some(crdt) = self.crdt.as_ref() {
                instance.configure(self, crdt);
            }
        }
    }

    /// Reconciles the CRDT's pending effects into at most one state action.
    ///
    /// Decision ladder: a never-announced CRDT that was deleted is silently
    /// dropped; a never-announced CRDT with pending effects is announced
    /// wholesale as a create; a deletion is announced and the CRDT dropped;
    /// otherwise pending effects are announced as an update. The pending
    /// delta is reset whenever it is consumed.
    pub(crate) fn state_action(&mut self) -> Option<CrdtStateAction> {
        self.crdt.as_ref()?;

        if self.created && self.deleted {
            self.created = false;
            self.crdt = None;
            return None;
        }
        if self.created {
            let crdt = self.crdt.as_mut()?;
            if crdt.has_delta() {
                self.created = false;
                let state = crdt.state();
                crdt.reset_delta();
                return Some(CrdtStateAction::Create(state));
            }
            // Materialized but still untouched; keep the create pending.
            return None;
        }
        if self.deleted {
            self.crdt = None;
            return Some(CrdtStateAction::Delete);
        }
        let crdt = self.crdt.as_mut()?;
        if crdt.has_delta() {
            let delta = crdt.delta();
            crdt.reset_delta();
            return Some(CrdtStateAction::Update(delta));
        }
        None
    }
}
