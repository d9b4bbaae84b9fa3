//! Global middlewares plus route filters.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example middlewares_filters
//!
//! Try:
//!   curl -i http://localhost:8000/
//!   curl -i -X OPTIONS http://localhost:8000/
//!   curl -i http://localhost:8000/admin/stats
//!   curl -i -H 'authorization: Bearer x' http://localhost:8000/admin/stats

use http::StatusCode;
use trellis::{BoxFuture, Config, HandlerResult, Middlewares, RequestCtx, Router, Server, logging, middleware};

#[tokio::main]
async fn main() -> Result<(), trellis::Error> {
    let config = Config::default().with_debug(true);
    logging::init(&config.logging)?;

    let mut router = Router::new();
    router.use_before(middleware::request_id).use_before(before_middleware);
    router.use_after(after_middleware);

    router
        .get("/", index)
        .middlewares(Middlewares::new().before(before_filter).after(after_filter));

    let mut admin = router.new_group_path("/admin");
    admin.use_before(require_token);
    admin.get("/stats", stats);

    Server::new(config).serve(router).await
}

// GET /
fn index(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { ctx.text_response("Middlewares and view filters") })
}

// GET /admin/stats
fn stats(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { ctx.json_response(&serde_json::json!({ "requests": 42 })) })
}

fn before_middleware(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tracing::info!(path = ctx.path(), "before middleware");
        ctx.next()
    })
}

fn after_middleware(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tracing::info!(status = %ctx.response().status(), "after middleware");
        ctx.next()
    })
}

fn before_filter(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tracing::info!("before filter");
        ctx.next()
    })
}

fn after_filter(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tracing::info!("after filter");
        ctx.next()
    })
}

// Rejected requests go through the error view with status 401.
fn require_token(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        if ctx.request().header("authorization").is_none() {
            ctx.response_mut().set_status(StatusCode::UNAUTHORIZED);
            return Err("missing authorization header".into());
        }
        ctx.next()
    })
}
