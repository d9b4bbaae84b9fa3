//! The per-route handler chain and how it runs.
//!
//! A chain is the flat list `before… view after…` computed once at startup.
//! Running it is a plain loop:
//!
//! 1. call the step;
//! 2. `Err` → infer a status, render the error view, stop;
//! 3. `Ok` without `ctx.next()` → stop, the step owns the response;
//! 4. otherwise continue.
//!
//! The view step calls `next` on the view's behalf, so views never have to.

use http::header::{ALLOW, HeaderValue};
use http::StatusCode;
use tracing::{error, info, warn};

use crate::config::ErrorView;
use crate::context::RequestCtx;
use crate::handler::{BoxFuture, BoxedHandler, Handler, HandlerResult, Middlewares};
use crate::router::Timeout;

enum Step {
    Middleware(BoxedHandler),
    View(BoxedHandler),
}

pub(crate) struct Chain {
    steps: Vec<Step>,
    timeout: Option<Timeout>,
    error_view: ErrorView,
}

impl Chain {
    pub(crate) fn new(
        middlewares: Middlewares,
        view: BoxedHandler,
        timeout: Option<Timeout>,
        error_view: ErrorView,
    ) -> Self {
        let mut steps = Vec::with_capacity(middlewares.before.len() + 1 + middlewares.after.len());
        steps.extend(middlewares.before.into_iter().map(|mw| Step::Middleware(mw.handler)));
        steps.push(Step::View(view));
        steps.extend(middlewares.after.into_iter().map(|mw| Step::Middleware(mw.handler)));
        Self { steps, timeout, error_view }
    }

    /// Runs the chain, bounded by the route timeout if one is set.
    pub(crate) async fn execute(&self, ctx: &mut RequestCtx) {
        let Some(timeout) = &self.timeout else {
            return self.run(ctx).await;
        };

        if tokio::time::timeout(timeout.duration, self.run(ctx)).await.is_err() {
            warn!(
                method = %ctx.method(),
                path = ctx.path(),
                timeout = ?timeout.duration,
                "chain timed out"
            );
            ctx.error(&timeout.message, timeout.status);
        }
    }

    async fn run(&self, ctx: &mut RequestCtx) {
        for step in &self.steps {
            let result = match step {
                Step::Middleware(mw) => mw.call(ctx).await,
                Step::View(view) => run_view(view.as_ref(), ctx).await,
            };

            match result {
                Err(err) => {
                    let status = match ctx.response().status() {
                        StatusCode::OK => StatusCode::INTERNAL_SERVER_ERROR,
                        status => status,
                    };
                    error!(method = %ctx.method(), path = ctx.path(), %status, "error view: {err}");
                    self.error_view.render(ctx, &err, status);
                    break;
                }
                Ok(()) if !ctx.take_next() => break,
                Ok(()) => {}
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }
}

async fn run_view(view: &dyn Handler, ctx: &mut RequestCtx) -> HandlerResult {
    if !ctx.is_view_skipped() {
        view.call(ctx).await?;
    }
    ctx.next()
}

// ── Built-in steps ────────────────────────────────────────────────────────────

/// Adds `Allow` before delegating to the wrapped view.
pub(crate) struct AllowHeader {
    pub(crate) allow: HeaderValue,
    pub(crate) view: BoxedHandler,
}

impl Handler for AllowHeader {
    fn call<'a>(&'a self, ctx: &'a mut RequestCtx) -> BoxFuture<'a, HandlerResult> {
        ctx.response_mut().headers_mut().insert(ALLOW, self.allow.clone());
        self.view.call(ctx)
    }
}

/// View of automatic OPTIONS routes.
pub(crate) fn empty_view(_ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async { Ok(()) })
}

/// Prepended to every chain in debug mode.
pub(crate) fn debug_log(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        info!(
            method = %ctx.method(),
            uri = %ctx.request().uri(),
            peer = %ctx.request().remote_addr(),
            "request"
        );
        ctx.next()
    })
}
