//! Structured log fields and the client call field extractor.
//!
//! [`LogFields`] is a fresh, ordered key/value set built per log event. Keys
//! are unique: inserting an existing key replaces its value. Values may
//! borrow from the call being logged, which lets the `error` field hold the
//! caller's error by reference instead of a copy of its message.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    error::Error,
    fmt,
    time::{Duration, Instant},
};

use tonic::Code;
use uuid::Uuid;

use crate::{
    ids::{CorrelationId, Reply, CONTEXT_ID_KEY},
    level::code_name,
};

/// Well-known field names.
pub mod keys {
    pub const SYSTEM: &str = "system";
    pub const SPAN_KIND: &str = "span.kind";
    pub const GRPC_SERVICE: &str = "grpc.service";
    pub const GRPC_METHOD: &str = "grpc.method";
    pub const GRPC_DURATION: &str = "grpc.duration";
    pub const GRPC_CODE: &str = "grpc.code";
    pub const CTX_ID: &str = crate::ids::CONTEXT_ID_KEY;
    pub const ERROR: &str = "error";
    pub const PANIC: &str = "panic";
}

/// A single field value.
#[derive(Debug, Clone)]
pub enum FieldValue<'a> {
    Str(Cow<'a, str>),
    Duration(Duration),
    Uuid(Uuid),
    /// The error value itself; formatting is left to the sink.
    Error(&'a (dyn Error + Send + Sync + 'static)),
}

impl FieldValue<'_> {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            Self::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Duration(d) => write!(f, "{d:?}"),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Error(e) => write!(f, "{e}"),
        }
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }
}

impl From<String> for FieldValue<'_> {
    fn from(s: String) -> Self {
        Self::Str(Cow::Owned(s))
    }
}

impl<'a> From<Cow<'a, str>> for FieldValue<'a> {
    fn from(s: Cow<'a, str>) -> Self {
        Self::Str(s)
    }
}

impl From<Duration> for FieldValue<'_> {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

impl From<Uuid> for FieldValue<'_> {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<CorrelationId> for FieldValue<'_> {
    fn from(id: CorrelationId) -> Self {
        Self::Uuid(*id.as_uuid())
    }
}

/// Ordered mapping from field name to value.
#[derive(Debug, Clone, Default)]
pub struct LogFields<'a>(BTreeMap<Cow<'static, str>, FieldValue<'a>>);

impl<'a> LogFields<'a> {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a field, returning the value it replaced.
    pub fn insert(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<FieldValue<'a>>,
    ) -> Option<FieldValue<'a>> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<FieldValue<'a>>) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge `other` into `self`; keys in `other` win.
    pub fn extend(&mut self, other: LogFields<'a>) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue<'a>> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of the entries for which `keep` returns true.
    pub fn filtered(&self, mut keep: impl FnMut(&str, &FieldValue<'a>) -> bool) -> LogFields<'a> {
        Self(
            self.0
                .iter()
                .filter(|&(k, v)| keep(k, v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue<'a>)> {
        self.0.iter().map(|(k, v)| (&**k, v))
    }
}

/// Renders as `key=value` pairs separated by spaces, quoting values that
/// contain whitespace, quotes or `=`.
impl fmt::Display for LogFields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let rendered = value.to_string();
            if rendered.is_empty()
                || rendered.contains(|c: char| c.is_whitespace() || c == '"' || c == '=')
            {
                write!(f, "{key}={rendered:?}")?;
            } else {
                write!(f, "{key}={rendered}")?;
            }
        }
        Ok(())
    }
}

/// Split a full gRPC method path (`/package.Service/Method`) into service and
/// method.
///
/// The service is everything before the last `/` without its leading `/`;
/// the method is everything after it. A path with no `/` is treated as a bare
/// method name with an empty service.
pub fn split_method(full_method: &str) -> (&str, &str) {
    match full_method.rsplit_once('/') {
        Some((service, method)) => (service.strip_prefix('/').unwrap_or(service), method),
        None => ("", full_method),
    }
}

/// Build the field set for a finished client unary call.
///
/// `ctx_id` is included only when `reply` exposes a correlation ID, and
/// `error` only when the call failed. `grpc.duration` is measured here, so
/// call this right after the invocation returns.
pub fn client_logger_fields<'a>(
    full_method: &'a str,
    reply: Option<&dyn Reply>,
    err: Option<&'a (dyn Error + Send + Sync + 'static)>,
    code: Code,
    start: Instant,
) -> LogFields<'a> {
    let (service, method) = split_method(full_method);

    let mut fields = LogFields::new()
        .with(keys::SYSTEM, "grpc")
        .with(keys::SPAN_KIND, "client")
        .with(keys::GRPC_SERVICE, service)
        .with(keys::GRPC_METHOD, method)
        .with(keys::GRPC_DURATION, start.elapsed())
        .with(keys::GRPC_CODE, code_name(code));

    if let Some(getter) = reply.and_then(|r| r.context_id_getter()) {
        let id = CorrelationId::from_slice_lossy(getter.get_context_id());
        fields.insert(CONTEXT_ID_KEY, id);
    }

    if let Some(err) = err {
        fields.insert(keys::ERROR, FieldValue::Error(err));
    }

    fields
}
