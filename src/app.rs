//! The built application: route trees plus the context pool.
//!
//! [`App::new`] freezes a [`Router`]. Every route gets its middlewares
//! flattened into a [`Chain`], automatic OPTIONS routes are added, and each
//! chain is inserted into the `matchit` tree of its method. After that the
//! app is immutable and shared by every connection.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use matchit::Router as MatchitRouter;
use tracing::warn;

use crate::chain::{AllowHeader, Chain, debug_log, empty_view};
use crate::config::Config;
use crate::context::CtxPool;
use crate::error::{BoxError, Error};
use crate::handler::{BoxedHandler, Middleware};
use crate::method::RouteMethod;
use crate::response::plain;
use crate::router::Router;

/// A router compiled into dispatchable chains.
///
/// [`Server`](crate::Server) builds one for you. Build it yourself to drive
/// requests without a socket, e.g. in tests:
///
/// ```rust
/// # use trellis::{App, BoxFuture, Config, HandlerResult, RequestCtx, Router};
/// # fn hello(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
/// #     Box::pin(async move { ctx.text_response("hello") })
/// # }
/// # async fn demo() -> Result<(), trellis::Error> {
/// let mut router = Router::new();
/// router.get("/", hello);
/// let app = App::new(router, &Config::default())?;
///
/// let req = http::Request::get("/").body(http_body_util::Full::new(bytes::Bytes::new())).unwrap();
/// let res = app.call(req, "127.0.0.1:1234".parse().unwrap()).await;
/// assert_eq!(res.status(), http::StatusCode::OK);
/// # Ok(())
/// # }
/// ```
pub struct App {
    trees: HashMap<Method, MatchitRouter<Chain>>,
    any: MatchitRouter<Chain>,
    pool: CtxPool,
}

impl App {
    /// Compiles `router`. Fails if two routes conflict in the same tree or a
    /// path is not valid `matchit` syntax.
    pub fn new(router: Router, config: &Config) -> Result<Self, Error> {
        let debug = config.debug.then(|| Middleware::new(debug_log));

        // Methods per URL for the Allow header, ANY listed as `*`. Also the
        // last non-OPTIONS route per URL, which owns the automatic OPTIONS chain.
        let mut allowed: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        let mut custom_options: HashSet<&str> = HashSet::new();
        let mut options_owner: HashMap<&str, usize> = HashMap::new();
        for (index, route) in router.routes().iter().enumerate() {
            if route.method.is_options() {
                custom_options.insert(&route.url);
                continue;
            }
            allowed.entry(&route.url).or_default().insert(route.method.as_str());
            options_owner.insert(&route.url, index);
        }

        let mut app = Self {
            trees: HashMap::new(),
            any: MatchitRouter::new(),
            pool: CtxPool::new(config.pool_capacity),
        };

        for (index, route) in router.routes().iter().enumerate() {
            let middlewares = router.build_middlewares(route, debug.clone());

            let view: BoxedHandler = if route.method.is_options() {
                Arc::new(AllowHeader { allow: allow_value(allowed.get(route.url.as_str())), view: Arc::clone(&route.view) })
            } else {
                Arc::clone(&route.view)
            };
            let chain = Chain::new(middlewares.clone(), view, route.timeout.clone(), config.error_view.clone());
            app.insert(&route.method, &route.url, chain)?;

            let owns_options = config.handle_options
                && options_owner.get(route.url.as_str()) == Some(&index)
                && !custom_options.contains(route.url.as_str());

            if owns_options {
                let view = Arc::new(AllowHeader {
                    allow: allow_value(allowed.get(route.url.as_str())),
                    view: Arc::new(empty_view),
                });
                let chain = Chain::new(middlewares, view, None, config.error_view.clone());
                app.insert(&RouteMethod::Exact(Method::OPTIONS), &route.url, chain)?;
            }
        }

        Ok(app)
    }

    /// Routes one request through its chain and returns the response.
    ///
    /// The body is buffered before the chain runs. A body that fails to read
    /// is answered with `400 Bad Request` without touching any handler.
    pub async fn call<B>(&self, req: http::Request<B>, remote_addr: SocketAddr) -> http::Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();

        let Some((chain, params)) = self.lookup(&parts.method, parts.uri.path()) else {
            return self.fallback(&parts.method, parts.uri.path());
        };

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let e: BoxError = e.into();
                warn!(peer = %remote_addr, "failed to read request body: {e}");
                return plain(StatusCode::BAD_REQUEST);
            }
        };

        let mut ctx = self.pool.acquire();
        ctx.fill(parts, body, params.into_iter(), remote_addr);
        chain.execute(&mut ctx).await;
        let response = ctx.response_mut().take_http();
        self.pool.release(ctx);

        response
    }

    fn insert(&mut self, method: &RouteMethod, url: &str, chain: Chain) -> Result<(), Error> {
        let tree = match method {
            RouteMethod::Any => &mut self.any,
            RouteMethod::Exact(m) => self.trees.entry(m.clone()).or_insert_with(MatchitRouter::new),
        };
        tree.insert(url, chain).map_err(|source| Error::Route {
            method: method.to_string(),
            path: url.to_owned(),
            source,
        })
    }

    /// Exact-method tree first, then the ANY tree.
    fn lookup(&self, method: &Method, path: &str) -> Option<(&Chain, Vec<(String, String)>)> {
        let matched = self.trees.get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }

    /// `405` with `Allow` if other methods match the path, `404` otherwise.
    fn fallback(&self, method: &Method, path: &str) -> http::Response<Full<Bytes>> {
        let allowed: BTreeSet<&str> = self.trees.iter()
            .filter(|(m, tree)| *m != method && tree.at(path).is_ok())
            .map(|(m, _)| m.as_str())
            .collect();

        if allowed.is_empty() {
            return plain(StatusCode::NOT_FOUND);
        }

        let mut res = plain(StatusCode::METHOD_NOT_ALLOWED);
        res.headers_mut().insert(ALLOW, allow_value(Some(&allowed)));
        res
    }
}

/// Sorted, comma-separated methods; `OPTIONS` alone when there are none.
fn allow_value(methods: Option<&BTreeSet<&str>>) -> HeaderValue {
    match methods {
        Some(methods) if !methods.is_empty() => {
            let joined = methods.iter().copied().collect::<Vec<_>>().join(", ");
            HeaderValue::from_str(&joined).unwrap_or_else(|_| HeaderValue::from_static("OPTIONS"))
        }
        _ => HeaderValue::from_static("OPTIONS"),
    }
}
