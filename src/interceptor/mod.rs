//! Unary interceptors: correlation ID injection on the server, call logging
//! on the client.

pub mod client;
pub mod server;

pub use client::{CallLogger, FINISHED_MESSAGE};
pub use server::{CtxIdInterceptor, UnaryServerInfo};
