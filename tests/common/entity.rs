//! Synthetic entity exercising every CRDT kind.
//!
//! The entity picks its default CRDT from the entity id prefix
//! (`gcounter-1`, `flag-2`, ...), the way a conformance proxy drives one
//! service across all data types.

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stately::codec::{self, TypedMessage};
use stately::error::CommandError;
use stately::proto::crdt::{
    Crdt, Flag, GCounter, GSet, LwwRegister, ORMap, ORSet, PNCounter, Vote,
};
use stately::proto::wire::{Forward, SideEffect};
use stately::proto::Payload;
use stately::{CommandContext, Context, EntityDescriptor, EntityHandler, Server};

/// Service name the synthetic entity registers under.
pub const SERVICE_NAME: &str = "stately.tck.SyntheticService";

macro_rules! typed_message {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? }, $type_name:literal) => {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl TypedMessage for $name {
            const TYPE_NAME: &'static str = $type_name;
        }
    };
}

typed_message!(Get {}, "stately.tck.Get");
typed_message!(DeleteEntity {}, "stately.tck.DeleteEntity");
typed_message!(EmptyResponse {}, "stately.tck.EmptyResponse");
typed_message!(FailWith { description: String }, "stately.tck.FailWith");

typed_message!(GCounterIncrement { value: u64 }, "stately.tck.GCounterIncrement");
typed_message!(GCounterResponse { value: u64 }, "stately.tck.GCounterResponse");

typed_message!(PNCounterIncrement { value: u64 }, "stately.tck.PNCounterIncrement");
typed_message!(PNCounterDecrement { value: u64 }, "stately.tck.PNCounterDecrement");
typed_message!(PNCounterResponse { value: i64 }, "stately.tck.PNCounterResponse");

typed_message!(FlagResponse { value: bool }, "stately.tck.FlagResponse");

typed_message!(LwwSet { value: String }, "stately.tck.LwwSet");
typed_message!(LwwResponse { value: Option<String> }, "stately.tck.LwwResponse");

typed_message!(SetAdd { value: String }, "stately.tck.SetAdd");
typed_message!(SetRemove { value: String }, "stately.tck.SetRemove");
typed_message!(SetResponse { values: Vec<String> }, "stately.tck.SetResponse");

typed_message!(VoteCast { value: bool }, "stately.tck.VoteCast");
typed_message!(
    VoteResponse {
        self_vote: bool,
        voters: u32,
        votes_for: u32,
    },
    "stately.tck.VoteResponse"
);

typed_message!(
    MapSetCounter {
        key: String,
        increment: u64,
    },
    "stately.tck.MapSetCounter"
);
typed_message!(MapResponse { keys: Vec<String> }, "stately.tck.MapResponse");

fn register_messages() {
    codec::register_type::<Get>();
    codec::register_type::<DeleteEntity>();
    codec::register_type::<EmptyResponse>();
    codec::register_type::<FailWith>();
    codec::register_type::<GCounterIncrement>();
    codec::register_type::<GCounterResponse>();
    codec::register_type::<PNCounterIncrement>();
    codec::register_type::<PNCounterDecrement>();
    codec::register_type::<PNCounterResponse>();
    codec::register_type::<FlagResponse>();
    codec::register_type::<LwwSet>();
    codec::register_type::<LwwResponse>();
    codec::register_type::<SetAdd>();
    codec::register_type::<SetRemove>();
    codec::register_type::<SetResponse>();
    codec::register_type::<VoteCast>();
    codec::register_type::<VoteResponse>();
    codec::register_type::<MapSetCounter>();
    codec::register_type::<MapResponse>();
}

/// A server with the synthetic entity registered and all message types
/// known to the process-wide codec.
pub fn synthetic_server() -> Arc<Server> {
    register_messages();
    let server = Server::new();
    server
        .register(EntityDescriptor::new(SERVICE_NAME, |_id| {
            Box::new(SyntheticEntity::default())
        }))
        .expect("fresh server accepts the synthetic descriptor");
    Arc::new(server)
}

#[derive(Default)]
pub struct SyntheticEntity {
    configured_kind: Option<&'static str>,
}

impl SyntheticEntity {
    fn fail_no_state<T>() -> Result<T, CommandError> {
        Err(CommandError::failure("entity has no state"))
    }

    fn lww_value(crdt: Option<&Crdt>) -> Option<String> {
        match crdt {
            Some(Crdt::LwwRegister(register)) => register
                .value()
                .and_then(|payload| payload.to_str().ok())
                .map(str::to_string),
            _ => None,
        }
    }

    fn sorted_items(set_items: Vec<Payload>) -> Vec<String> {
        let mut values: Vec<String> = set_items
            .iter()
            .filter_map(|payload| payload.to_str().ok())
            .map(str::to_string)
            .collect();
        values.sort();
        values
    }
}

#[async_trait]
impl EntityHandler for SyntheticEntity {
    fn configure(&mut self, _ctx: &Context, crdt: &Crdt) {
        self.configured_kind = Some(crdt.kind());
    }

    fn default_crdt(&mut self, ctx: &Context) -> Option<Crdt> {
        let kind = ctx.entity_id().as_str().split('-').next()?;
        match kind {
            "gcounter" => Some(Crdt::GCounter(GCounter::new())),
            "pncounter" => Some(Crdt::PNCounter(PNCounter::new())),
            "gset" => Some(Crdt::GSet(GSet::new())),
            "orset" => Some(Crdt::ORSet(ORSet::new())),
            "flag" => Some(Crdt::Flag(Flag::new())),
            "lwwregister" => Some(Crdt::LwwRegister(LwwRegister::new(None))),
            "vote" => Some(Crdt::Vote(Vote::new())),
            "ormap" => Some(Crdt::ORMap(ORMap::new())),
            _ => None,
        }
    }

    async fn handle_command(
        &mut self,
        ctx: &mut CommandContext<'_>,
        name: &str,
        message: &(dyn Any + Send + Sync),
    ) -> Result<Option<Payload>, CommandError> {
        match name {
            "IncrementGCounter" => {
                let request = expect::<GCounterIncrement>(message)?;
                let Some(Crdt::GCounter(counter)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                counter.increment(request.value);
                reply(&GCounterResponse {
                    value: counter.value(),
                })
            }
            "GetGCounter" => {
                let Some(Crdt::GCounter(counter)) = ctx.crdt() else {
                    return Self::fail_no_state();
                };
                reply(&GCounterResponse {
                    value: counter.value(),
                })
            }
            "IncrementPNCounter" => {
                let request = expect::<PNCounterIncrement>(message)?;
                let Some(Crdt::PNCounter(counter)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                counter.increment(request.value);
                reply(&PNCounterResponse {
                    value: counter.value(),
                })
            }
            "DecrementPNCounter" => {
                let request = expect::<PNCounterDecrement>(message)?;
                let Some(Crdt::PNCounter(counter)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                counter.decrement(request.value);
                reply(&PNCounterResponse {
                    value: counter.value(),
                })
            }
            "GetPNCounter" => {
                let Some(Crdt::PNCounter(counter)) = ctx.crdt() else {
                    return Self::fail_no_state();
                };
                reply(&PNCounterResponse {
                    value: counter.value(),
                })
            }
            "GetFlag" => {
                let Some(Crdt::Flag(flag)) = ctx.crdt() else {
                    return Self::fail_no_state();
                };
                reply(&FlagResponse { value: flag.value() })
            }
            "EnableFlag" => {
                let Some(Crdt::Flag(flag)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                flag.enable();
                reply(&FlagResponse { value: flag.value() })
            }
            "SetLww" => {
                let request = expect::<LwwSet>(message)?;
                let Some(Crdt::LwwRegister(register)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                register.set(Payload::from_string(request.value.clone()));
                reply(&LwwResponse {
                    value: Self::lww_value(ctx.crdt()),
                })
            }
            "GetLww" => {
                if ctx.streamed() {
                    ctx.on_change(|change_ctx| {
                        let value = SyntheticEntity::lww_value(change_ctx.crdt());
                        Ok(Some(codec::encode(&LwwResponse { value }).map_err(
                            |err| CommandError::failure(err.to_string()),
                        )?))
                    });
                    ctx.on_cancel(|cancel_ctx| {
                        cancel_ctx.side_effect(SideEffect {
                            service_name: SERVICE_NAME.to_string(),
                            command_name: "SubscriptionCancelled".to_string(),
                            payload: None,
                            synchronous: false,
                        });
                        Ok(())
                    });
                }
                reply(&LwwResponse {
                    value: Self::lww_value(ctx.crdt()),
                })
            }
            "WatchAndMutate" => {
                // A change callback that illegally writes to the register.
                if ctx.streamed() {
                    ctx.on_change(|change_ctx| {
                        if let Some(Crdt::LwwRegister(register)) = change_ctx.crdt_mut() {
                            register.set(Payload::from_string("illegal"));
                        }
                        Ok(None)
                    });
                }
                reply(&EmptyResponse {})
            }
            "WatchOnce" => {
                // A change callback that ends the subscription after its
                // first firing.
                if ctx.streamed() {
                    ctx.on_change(|change_ctx| {
                        let value = SyntheticEntity::lww_value(change_ctx.crdt());
                        change_ctx.end();
                        Ok(Some(codec::encode(&LwwResponse { value }).map_err(
                            |err| CommandError::failure(err.to_string()),
                        )?))
                    });
                }
                reply(&EmptyResponse {})
            }
            "AddSet" => {
                let request = expect::<SetAdd>(message)?;
                match ctx.crdt_mut() {
                    Some(Crdt::GSet(set)) => {
                        set.add(Payload::from_string(request.value.clone()));
                        let values = Self::sorted_items(set.iter().cloned().collect());
                        reply(&SetResponse { values })
                    }
                    Some(Crdt::ORSet(set)) => {
                        set.add(Payload::from_string(request.value.clone()));
                        let values = Self::sorted_items(set.iter().cloned().collect());
                        reply(&SetResponse { values })
                    }
                    _ => Self::fail_no_state(),
                }
            }
            "RemoveSet" => {
                let request = expect::<SetRemove>(message)?;
                let Some(Crdt::ORSet(set)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                set.remove(&Payload::from_string(request.value.clone()));
                let values = Self::sorted_items(set.iter().cloned().collect());
                reply(&SetResponse { values })
            }
            "GetSet" => match ctx.crdt() {
                Some(Crdt::GSet(set)) => reply(&SetResponse {
                    values: Self::sorted_items(set.iter().cloned().collect()),
                }),
                Some(Crdt::ORSet(set)) => reply(&SetResponse {
                    values: Self::sorted_items(set.iter().cloned().collect()),
                }),
                _ => Self::fail_no_state(),
            },
            "CastVote" => {
                let request = expect::<VoteCast>(message)?;
                let Some(Crdt::Vote(vote)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                vote.vote(request.value);
                reply(&VoteResponse {
                    self_vote: vote.self_vote(),
                    voters: vote.voters(),
                    votes_for: vote.votes_for(),
                })
            }
            "SetMapCounter" => {
                let request = expect::<MapSetCounter>(message)?;
                let Some(Crdt::ORMap(map)) = ctx.crdt_mut() else {
                    return Self::fail_no_state();
                };
                let key = Payload::from_string(request.key.clone());
                match map.get_mut(&key) {
                    Some(Crdt::GCounter(counter)) => counter.increment(request.increment),
                    Some(_) => return Err(CommandError::failure("key holds a different kind")),
                    None => {
                        let mut counter = GCounter::new();
                        counter.increment(request.increment);
                        map.set(key, Crdt::GCounter(counter));
                    }
                }
                let mut keys: Vec<String> = map
                    .keys()
                    .filter_map(|payload| payload.to_str().ok())
                    .map(str::to_string)
                    .collect();
                keys.sort();
                reply(&MapResponse { keys })
            }
            "DeleteEntity" => {
                ctx.delete();
                reply(&EmptyResponse {})
            }
            "Fail" => {
                let request = expect::<FailWith>(message)?;
                Err(CommandError::Failure(request.description.clone()))
            }
            "Effect" => {
                for command_name in ["first", "second"] {
                    ctx.side_effect(SideEffect {
                        service_name: SERVICE_NAME.to_string(),
                        command_name: command_name.to_string(),
                        payload: None,
                        synchronous: false,
                    });
                }
                reply(&EmptyResponse {})
            }
            "ForwardIt" => {
                ctx.forward(Forward {
                    service_name: "stately.tck.OtherService".to_string(),
                    command_name: "Receive".to_string(),
                    payload: None,
                })?;
                Ok(None)
            }
            "ReplyAndForward" => {
                ctx.forward(Forward {
                    service_name: "stately.tck.OtherService".to_string(),
                    command_name: "Receive".to_string(),
                    payload: None,
                })?;
                reply(&EmptyResponse {})
            }
            "Boom" => panic!("synthetic entity exploded"),
            _ => Err(CommandError::Unknown(name.to_string())),
        }
    }
}

fn expect<T: TypedMessage>(message: &(dyn Any + Send + Sync)) -> Result<&T, CommandError> {
    message
        .downcast_ref::<T>()
        .ok_or_else(|| CommandError::failure("unexpected message type"))
}

fn reply<T: TypedMessage>(message: &T) -> Result<Option<Payload>, CommandError> {
    codec::encode(message)
        .map(Some)
        .map_err(|err| CommandError::failure(err.to_string()))
}
