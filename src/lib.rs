//! Correlation IDs and structured call logging for unary gRPC calls.
//!
//! Two interceptors make up the crate:
//!
//! - [`CtxIdInterceptor`] runs on the server. It gives every inbound call a
//!   fresh random [`CorrelationId`] and attaches it, as the `ctx_id` log
//!   field, to the [`CallContext`] the handler receives.
//! - [`CallLogger`] runs on the client. It times each outbound call and writes
//!   one `finished client unary call` record whose severity follows the gRPC
//!   status code. When the reply carries the server's correlation ID (see
//!   [`Reply`]) that ID is logged too, which ties client and server logs
//!   together.
//!
//! Records go through a [`Logger`], which defaults to [`TracingSink`]. Call
//! [`telemetry::init_tracing`] once at startup to install a subscriber.

pub mod config;
pub mod context;
pub mod error;
pub mod fields;
pub mod ids;
pub mod interceptor;
pub mod level;
pub mod logger;
pub mod telemetry;

pub use config::{ClientConfig, Config, LogFormat, LoggingConfig, PanicPolicy};
pub use context::CallContext;
pub use error::{IdError, NewIdError};
pub use fields::{FieldValue, LogFields};
pub use ids::{ContextIdGetter, CorrelationId, IdGenerator, RandomIdGenerator, Reply, CONTEXT_ID_KEY};
pub use interceptor::{CallLogger, CtxIdInterceptor, UnaryServerInfo};
pub use level::Level;
pub use logger::{DiscardSink, Entry, LogSink, Logger, TracingSink};
