//! # trellis
//!
//! Middleware chains, route groups and filters on top of hyper and matchit.
//!
//! hyper parses HTTP and owns the connections. matchit matches paths. What
//! trellis adds is the part that changes between applications: deciding
//! which functions run for a request, and in what order.
//!
//! ## The chain
//!
//! Every route compiles to one flat list, built once at startup:
//!
//! ```text
//! root.before… group.before… route.before…  VIEW  route.after… group.after… root.after…
//! ```
//!
//! minus every middleware marked *skip* at any of those levels. Steps run one
//! after the other on the same [`RequestCtx`]:
//!
//! - a step returning `Err` stops the chain and renders the error view, with
//!   the status the step set (or `500` if it left `200`);
//! - a middleware returning `Ok` without calling [`RequestCtx::next`] stops
//!   the chain and its response is sent;
//! - the view continues to the after middlewares on its own.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use trellis::{BoxFuture, Config, HandlerResult, RequestCtx, Router, Server, middleware};
//! use http::StatusCode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trellis::Error> {
//!     let mut router = Router::new();
//!     router.use_before(middleware::request_id);
//!     router.get("/", index);
//!
//!     let mut admin = router.new_group_path("/admin");
//!     admin.use_before(require_token);
//!     admin.get("/users/{id}", get_user);
//!
//!     Server::new(Config::default().with_addr("0.0.0.0:3000"))
//!         .serve(router)
//!         .await
//! }
//!
//! fn index(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move { ctx.text_response("hello") })
//! }
//!
//! fn get_user(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move {
//!         let id = ctx.param("id").unwrap_or_default().to_owned();
//!         ctx.json_response(&serde_json::json!({ "id": id }))
//!     })
//! }
//!
//! fn require_token(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move {
//!         if ctx.request().header("authorization").is_none() {
//!             ctx.response_mut().set_status(StatusCode::UNAUTHORIZED);
//!             return Err("missing token".into());
//!         }
//!         ctx.next()
//!     })
//! }
//! ```

mod app;
mod chain;
mod config;
mod context;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;

pub mod logging;
pub mod middleware;

pub use app::App;
pub use config::{Config, ErrorView, LogFormat, LoggingConfig};
pub use context::RequestCtx;
pub use error::{BoxError, Error};
pub use handler::{BoxFuture, Handler, HandlerResult, Middlewares};
pub use method::ANY;
pub use request::Request;
pub use response::{ContentType, Response};
pub use router::{Group, Path, Router};
pub use server::Server;
