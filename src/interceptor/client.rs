//! Client-side call logging.
//!
//! [`CallLogger`] wraps one outbound unary call and writes exactly one record
//! when it finishes, whatever the outcome:
//!
//! ```text
//! finished client unary call  system=grpc span.kind=client grpc.service=orders.v1.Orders
//!   grpc.method=Create grpc.duration=3.2ms grpc.code=OK ctx_id=…
//! ```
//!
//! The record is purely observational. The invoker runs once, and its result
//! (reply or error) is handed back to the caller untouched.

use std::{error::Error, future::Future, panic::AssertUnwindSafe, time::Instant};

use futures_util::FutureExt as _;
use tonic::Code;

use crate::{
    config::{ClientConfig, PanicPolicy},
    context::CallContext,
    fields::{client_logger_fields, keys},
    ids::Reply,
    level::{code_to_level, error_to_code, level_logf, Level},
    logger::Logger,
};

/// Message of every call record.
pub const FINISHED_MESSAGE: &str = "finished client unary call";

/// Logs one structured record per outbound unary call.
#[derive(Debug, Clone)]
pub struct CallLogger {
    logger: Logger,
    panic_policy: PanicPolicy,
}

impl CallLogger {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            panic_policy: PanicPolicy::default(),
        }
    }

    pub fn from_config(cfg: &ClientConfig, logger: Logger) -> Self {
        Self::new(logger).with_panic_policy(cfg.panic_policy)
    }

    pub fn with_panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }

    /// Invoke `invoker` once and log the outcome.
    ///
    /// `method` is the full method path (`/package.Service/Method`). The
    /// invoker receives a clone of `ctx` and the request; the channel and any
    /// call options are whatever it captures:
    ///
    /// ```rust,ignore
    /// let reply = call_logger
    ///     .intercept(&ctx, "/orders.v1.Orders/Create", req, |_ctx, req| async move {
    ///         client.create(req).await
    ///     })
    ///     .await?;
    /// ```
    pub async fn intercept<Req, Resp, E, F, Fut>(
        &self,
        ctx: &CallContext,
        method: &str,
        req: Req,
        invoker: F,
    ) -> Result<Resp, E>
    where
        F: FnOnce(CallContext, Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
        Resp: Reply,
        E: Error + Send + Sync + 'static,
    {
        let start = Instant::now();
        let ctx = ctx.clone();
        let call = async move { invoker(ctx, req).await };

        let result = match self.panic_policy {
            PanicPolicy::Propagate => call.await,
            PanicPolicy::LogAndPropagate => match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    self.log_panic(method, start, panic_message(payload.as_ref()));
                    std::panic::resume_unwind(payload)
                }
            },
        };

        self.log_result(method, &result, start);
        result
    }

    fn log_result<Resp, E>(&self, method: &str, result: &Result<Resp, E>, start: Instant)
    where
        Resp: Reply,
        E: Error + Send + Sync + 'static,
    {
        let (reply, err): (Option<&dyn Reply>, Option<&(dyn Error + Send + Sync + 'static)>) =
            match result {
                Ok(reply) => (Some(reply as &dyn Reply), None),
                Err(err) => (None, Some(err as &(dyn Error + Send + Sync + 'static))),
            };

        let code = error_to_code(err.map(|e| e as &(dyn Error + 'static)));
        let level = code_to_level(code);
        let fields = client_logger_fields(method, reply, err, code, start);

        level_logf(
            &self.logger.with_fields(fields),
            level,
            format_args!("{FINISHED_MESSAGE}"),
        );
    }

    fn log_panic(&self, method: &str, start: Instant, message: &str) {
        let mut fields = client_logger_fields(method, None, None, Code::Unknown, start);
        fields.insert(keys::PANIC, message.to_owned());

        level_logf(
            &self.logger.with_fields(fields),
            Level::Error,
            format_args!("{FINISHED_MESSAGE}"),
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
