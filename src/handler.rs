//! Handler trait and type erasure.
//!
//! # Views and middlewares share one shape
//!
//! A view and a middleware are both an async function that borrows the
//! request context mutably and reports success or failure:
//!
//! ```text
//! fn auth(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { … }
//!        ↓ router.use_before(auth)
//! Middleware { id: TypeId::of::<auth>, handler: Arc::new(auth) }
//!        ↓ stored in Middlewares::before / after
//! handler.call(ctx) at request time           ← one vtable dispatch
//! ```
//!
//! The future borrows `ctx` for `'a`, so the chain can run the next step on
//! the same context as soon as the previous future resolves. No context is
//! cloned or moved between steps.

use std::any::TypeId;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestCtx;
use crate::error::BoxError;
use crate::request::Request;
use crate::response::Response;

// ── Types ─────────────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future borrowing from its caller for `'a`.
///
/// `Send` lets tokio move the connection task across worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every view and middleware resolves to.
///
/// `Err` halts the chain and hands the error to the error view.
pub type HandlerResult = Result<(), BoxError>;

/// A heap-allocated, type-erased handler shared by every chain it appears in.
pub(crate) type BoxedHandler = Arc<dyn Handler>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every view and middleware.
///
/// Satisfied automatically by any function with the signature:
///
/// ```text
/// fn name(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult>
/// ```
///
/// Implement it by hand for middlewares that carry state:
///
/// ```rust
/// use trellis::{BoxFuture, Handler, HandlerResult, RequestCtx};
///
/// struct ApiVersion(&'static str);
///
/// impl Handler for ApiVersion {
///     fn call<'a>(&'a self, ctx: &'a mut RequestCtx) -> BoxFuture<'a, HandlerResult> {
///         Box::pin(async move {
///             ctx.response_mut().set_header("x-api-version", self.0)?;
///             ctx.next()
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestCtx) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut RequestCtx) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestCtx) -> BoxFuture<'a, HandlerResult> {
        (self)(ctx)
    }
}

/// A plain synchronous request handler used as a view.
///
/// It sees only the request and the response and cannot fail, so the after
/// middlewares always run.
/// Registered through `request_handler_path` on [`Router`](crate::Router)
/// and [`Group`](crate::Group).
pub(crate) struct RequestHandler<F>(pub(crate) F);

impl<F> Handler for RequestHandler<F>
where
    F: Fn(&Request, &mut Response) + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestCtx) -> BoxFuture<'a, HandlerResult> {
        let (req, res) = ctx.split_mut();
        (self.0)(req, res);
        Box::pin(std::future::ready(Ok(())))
    }
}

// ── Middleware identity ───────────────────────────────────────────────────────

/// A registered middleware together with its identity.
///
/// Identity is the concrete Rust type of the handler. Every `fn` item and
/// every closure has a distinct type, so skipping `auth` skips exactly the
/// `auth` function wherever it was registered. For hand-written `Handler`
/// structs, all instances of the struct share one identity.
#[derive(Clone)]
pub(crate) struct Middleware {
    pub(crate) id: TypeId,
    pub(crate) handler: BoxedHandler,
}

impl Middleware {
    pub(crate) fn new<H: Handler>(handler: H) -> Self {
        Self { id: TypeId::of::<H>(), handler: Arc::new(handler) }
    }
}

/// Before, after and skip middlewares, in the order they should run.
///
/// Used both for route groups and for single routes (filters):
///
/// ```rust
/// use trellis::{BoxFuture, HandlerResult, Middlewares, RequestCtx};
///
/// fn audit(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
///     Box::pin(async move { ctx.next() })
/// }
/// fn rate_limit(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
///     Box::pin(async move { ctx.next() })
/// }
///
/// let filters = Middlewares::new().after(audit).skip(rate_limit);
/// ```
#[derive(Clone, Default)]
pub struct Middlewares {
    pub(crate) before: Vec<Middleware>,
    pub(crate) after: Vec<Middleware>,
    pub(crate) skip: Vec<TypeId>,
}

impl Middlewares {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware that runs before the view.
    pub fn before<H: Handler>(mut self, handler: H) -> Self {
        self.before.push(Middleware::new(handler));
        self
    }

    /// Appends a middleware that runs after the view.
    pub fn after<H: Handler>(mut self, handler: H) -> Self {
        self.after.push(Middleware::new(handler));
        self
    }

    /// Marks a middleware as skipped. Only the type of `handler` is used.
    pub fn skip<H: Handler>(mut self, _handler: H) -> Self {
        self.skip.push(TypeId::of::<H>());
        self
    }
}
