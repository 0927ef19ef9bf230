//! Request-scoped call context.
//!
//! A [`CallContext`] travels with one call. It carries the correlation ID
//! assigned on arrival, the log fields registered along the way and the
//! logger those fields should be written to. Every `with_*` method returns a
//! new context and leaves the receiver untouched, so a parent context can be
//! read concurrently while children are derived from it.

use std::sync::Arc;

use crate::{
    fields::LogFields,
    ids::CorrelationId,
    logger::{Entry, Logger},
};

#[derive(Debug, Clone, Default)]
struct Inner {
    correlation_id: Option<CorrelationId>,
    fields: LogFields<'static>,
    logger: Option<Logger>,
}

/// Immutable, append-only carrier for per-call state.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    inner: Arc<Inner>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context stored on a tonic request, or an empty one.
    pub fn from_request<T>(request: &tonic::Request<T>) -> Self {
        request
            .extensions()
            .get::<CallContext>()
            .cloned()
            .unwrap_or_default()
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.inner.correlation_id
    }

    /// Fields registered on this context so far.
    pub fn fields(&self) -> &LogFields<'static> {
        &self.inner.fields
    }

    /// Child context carrying `id`.
    pub fn with_correlation_id(&self, id: CorrelationId) -> Self {
        self.derive(|inner| inner.correlation_id = Some(id))
    }

    /// Child context with `fields` added; on key collisions the new value wins.
    pub fn with_fields(&self, fields: LogFields<'static>) -> Self {
        self.derive(|inner| inner.fields.extend(fields))
    }

    /// Child context that logs through `logger`.
    pub fn with_logger(&self, logger: Logger) -> Self {
        self.derive(|inner| inner.logger = Some(logger))
    }

    /// Log entry preloaded with this context's fields.
    ///
    /// Falls back to a discarding logger when none was attached, so call
    /// paths can log unconditionally.
    pub fn logger(&self) -> Entry<'static> {
        self.inner
            .logger
            .clone()
            .unwrap_or_else(Logger::discard)
            .with_fields(self.inner.fields.clone())
    }

    fn derive(&self, update: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = (*self.inner).clone();
        update(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }
}
