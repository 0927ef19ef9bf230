//! Correlation identifiers and the reply capability that exposes them.
//!
//! Servers stamp every inbound call with a [`CorrelationId`]. A response
//! message may carry that ID back as raw bytes; reply types opt in to
//! exposing it by implementing [`Reply::context_id_getter`].

use std::fmt;

use rand::{rngs::OsRng, TryRngCore as _};
use uuid::Uuid;

use crate::error::IdError;

/// Key under which the correlation ID is stored and logged.
pub const CONTEXT_ID_KEY: &str = "ctx_id";

/// A 128-bit identifier assigned to a single inbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Build an ID from raw payload bytes.
    ///
    /// The first 16 bytes are used verbatim. Shorter input is zero-padded and
    /// anything past 16 bytes is ignored, so this never fails.
    pub fn from_slice_lossy(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 16];
        let n = bytes.len().min(raw.len());
        raw[..n].copy_from_slice(&bytes[..n]);
        Self(Uuid::from_bytes(raw))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Source of fresh correlation IDs.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Result<CorrelationId, IdError>;
}

/// Random (version 4) UUIDs drawn from the OS entropy source.
///
/// Unlike [`Uuid::new_v4`], a failing entropy source is reported as an
/// [`IdError`] instead of a panic.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> Result<CorrelationId, IdError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| IdError::Entropy(Box::new(e)))?;
        Ok(CorrelationId(uuid::Builder::from_random_bytes(bytes).into_uuid()))
    }
}

/// Capability: a message that carries the correlation ID the server assigned.
pub trait ContextIdGetter {
    /// Raw ID bytes as found in the payload.
    fn get_context_id(&self) -> &[u8];
}

/// A reply value the call logger can inspect.
///
/// The default implementation exposes nothing. Messages that carry a
/// correlation ID override [`context_id_getter`](Self::context_id_getter):
///
/// ```rust,ignore
/// impl Reply for CreateOrderResponse {
///     fn context_id_getter(&self) -> Option<&dyn ContextIdGetter> {
///         Some(self)
///     }
/// }
/// ```
pub trait Reply {
    fn context_id_getter(&self) -> Option<&dyn ContextIdGetter> {
        None
    }
}

impl Reply for () {}

impl<T: Reply> Reply for tonic::Response<T> {
    fn context_id_getter(&self) -> Option<&dyn ContextIdGetter> {
        self.get_ref().context_id_getter()
    }
}
