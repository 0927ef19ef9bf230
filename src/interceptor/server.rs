//! Server-side correlation ID injection.
//!
//! Every inbound call gets a fresh [`CorrelationId`]. The ID is:
//!
//! - Stored on a child [`CallContext`] that the handler receives
//! - Registered as the `ctx_id` log field on that context, so anything logged
//!   through [`CallContext::logger`] carries it
//! - Attached to a [`tracing`] span around the handler, so plain `tracing`
//!   events inside the handler carry it too
//!
//! If no ID can be generated the call is rejected before the handler runs.
//!
//! With tonic, install the interceptor on the generated server and read the
//! context back in the handler:
//!
//! ```rust,ignore
//! let svc = OrdersServer::with_interceptor(orders, CtxIdInterceptor::new(logger));
//!
//! async fn create(&self, req: Request<CreateOrder>) -> Result<Response<Order>, Status> {
//!     let ctx = CallContext::from_request(&req);
//!     ctx.logger().info(format_args!("creating order"));
//!     // ...
//! }
//! ```

use std::{future::Future, sync::Arc};

use tonic::{service::Interceptor, Request, Status};
use tracing::Instrument as _;

use crate::{
    context::CallContext,
    error::NewIdError,
    fields::LogFields,
    ids::{CorrelationId, IdGenerator, RandomIdGenerator, CONTEXT_ID_KEY},
    logger::Logger,
};

/// Details of the call being served.
#[derive(Debug, Clone)]
pub struct UnaryServerInfo {
    /// Full method path, e.g. `/package.Service/Method`.
    pub full_method: String,
}

impl UnaryServerInfo {
    pub fn new(full_method: impl Into<String>) -> Self {
        Self {
            full_method: full_method.into(),
        }
    }
}

/// Assigns a correlation ID to every inbound unary call.
#[derive(Clone)]
pub struct CtxIdInterceptor {
    generator: Arc<dyn IdGenerator>,
    logger: Logger,
}

impl CtxIdInterceptor {
    /// Interceptor using random v4 UUIDs.
    pub fn new(logger: Logger) -> Self {
        Self::with_generator(Arc::new(RandomIdGenerator), logger)
    }

    pub fn with_generator(generator: Arc<dyn IdGenerator>, logger: Logger) -> Self {
        Self { generator, logger }
    }

    /// Derive the child context for one call.
    ///
    /// The child carries a new ID, the `ctx_id` field and this interceptor's
    /// logger. `parent` is not modified.
    pub fn derive_context(&self, parent: &CallContext) -> Result<CallContext, NewIdError> {
        self.assign(parent).map(|(_, ctx)| ctx)
    }

    /// Run `handler` under a fresh correlation ID.
    ///
    /// The handler's result is returned as is. When ID generation fails the
    /// handler is not called and the [`NewIdError`] is converted into `E`.
    pub async fn intercept<Req, Resp, E, H, Fut>(
        &self,
        ctx: &CallContext,
        req: Req,
        info: &UnaryServerInfo,
        handler: H,
    ) -> Result<Resp, E>
    where
        H: FnOnce(CallContext, Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>>,
        E: From<NewIdError>,
    {
        let (id, ctx) = self.assign(ctx)?;
        let span = tracing::info_span!("grpc_call", grpc.method = %info.full_method, ctx_id = %id);

        handler(ctx, req).instrument(span).await
    }

    fn assign(&self, parent: &CallContext) -> Result<(CorrelationId, CallContext), NewIdError> {
        let id = self.generator.generate().map_err(NewIdError)?;

        let ctx = parent
            .with_correlation_id(id)
            .with_logger(self.logger.clone())
            .with_fields(LogFields::new().with(CONTEXT_ID_KEY, id));
        Ok((id, ctx))
    }
}

/// tonic hook: stores the derived [`CallContext`] in the request extensions.
///
/// A context already present on the request (from an outer layer) is used as
/// the parent. Generation failure rejects the call with `INTERNAL`.
///
/// tonic interceptors run before the handler and never see its future, so
/// unlike [`CtxIdInterceptor::intercept`] no `grpc_call` span is opened here.
/// Plain `tracing` events inside the handler do not carry `ctx_id`. Log
/// through [`CallContext::logger`] instead, or instrument the handler body
/// with a span built from [`CallContext::correlation_id`].
impl Interceptor for CtxIdInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let parent = CallContext::from_request(&request);
        let ctx = self.derive_context(&parent)?;
        request.extensions_mut().insert(ctx);
        Ok(request)
    }
}
