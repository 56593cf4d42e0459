//! Typed payload codec and the process-wide type registry.
//!
//! Commands arrive as opaque payloads. The runner resolves the payload's
//! type URL against a process-wide registry of message decoders and hands
//! the handler the decoded message to downcast. Registration happens once at
//! process start, before any stream is served.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use stately_proto::payload::{Payload, DEFAULT_TYPE_URL_PREFIX};

use crate::error::CodecError;

/// A message that can cross the stream inside a payload envelope.
///
/// `TYPE_NAME` is the fully qualified name without the
/// `type.googleapis.com/` prefix; it is what the registry dispatches on.
pub trait TypedMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Fully qualified message name, e.g. `example.shop.AddLineItem`.
    const TYPE_NAME: &'static str;
}

type DecodeFn = fn(&[u8]) -> Result<Box<dyn Any + Send + Sync>, serde_json::Error>;

/// Process-wide mapping from message names to decoders.
pub struct TypeRegistry {
    decoders: RwLock<HashMap<&'static str, DecodeFn>>,
}

impl TypeRegistry {
    fn new() -> Self {
        Self {
            decoders: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(TypeRegistry::new)
    }

    /// Registers a message type. Re-registering the same type is a no-op.
    pub fn register<T: TypedMessage>(&self) {
        let decode: DecodeFn =
            |bytes| serde_json::from_slice::<T>(bytes).map(|m| Box::new(m) as Box<dyn Any + Send + Sync>);
        self.decoders
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(T::TYPE_NAME, decode);
    }

    /// Decodes a payload into its registered message type.
    pub fn decode(&self, payload: &Payload) -> Result<Box<dyn Any + Send + Sync>, CodecError> {
        let name = payload.type_name();
        let decode = {
            let decoders = self
                .decoders
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            decoders.get(name).copied()
        };
        let decode = decode.ok_or_else(|| CodecError::UnknownType(payload.type_url.clone()))?;
        decode(&payload.value).map_err(|source| CodecError::Malformed {
            type_url: payload.type_url.clone(),
            source,
        })
    }
}

/// Registers a message type with the process-wide registry.
pub fn register_type<T: TypedMessage>() {
    TypeRegistry::global().register::<T>();
}

/// Decodes a payload against the process-wide registry.
pub fn decode(payload: &Payload) -> Result<Box<dyn Any + Send + Sync>, CodecError> {
    TypeRegistry::global().decode(payload)
}

/// Encodes a message into its payload envelope.
pub fn encode<T: TypedMessage>(message: &T) -> Result<Payload, CodecError> {
    let value = serde_json::to_vec(message).map_err(|source| CodecError::Encode {
        type_name: T::TYPE_NAME,
        source,
    })?;
    Ok(Payload::new(
        format!("{DEFAULT_TYPE_URL_PREFIX}/{}", T::TYPE_NAME),
        value,
    ))
}
