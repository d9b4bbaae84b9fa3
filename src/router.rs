//! Route registration: groups, filters and per-route settings.
//!
//! Nothing is matched here. The [`Router`] records route definitions and a
//! tree of groups; [`App::new`](crate::App::new) turns them into one
//! `matchit` tree per method once every middleware is known. Middlewares
//! added to a group after its routes were registered therefore still apply.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};

use crate::handler::{BoxedHandler, Handler, Middleware, Middlewares, RequestHandler};
use crate::request::Request;
use crate::response::Response;
use crate::method::RouteMethod;

const ROOT: usize = 0;

/// The application router.
///
/// Holds the root group. Every registration method returns a handle, so
/// settings chain naturally:
///
/// ```rust
/// # use trellis::{BoxFuture, HandlerResult, RequestCtx, Router};
/// # use std::time::Duration;
/// # fn get_user(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { Ok(()) }) }
/// # fn create_user(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { Ok(()) }) }
/// # fn auth(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { ctx.next() }) }
/// let mut router = Router::new();
/// router.use_before(auth);
///
/// let mut api = router.new_group_path("/api");
/// api.get("/users/{id}", get_user).timeout(Duration::from_secs(2), "too slow");
/// api.post("/users", create_user);
/// ```
pub struct Router {
    groups: Vec<GroupNode>,
    routes: Vec<RouteDef>,
}

struct GroupNode {
    parent: Option<usize>,
    prefix: String,
    middlewares: Middlewares,
}

pub(crate) struct RouteDef {
    pub(crate) method: RouteMethod,
    pub(crate) url: String,
    pub(crate) view: BoxedHandler,
    pub(crate) group: usize,
    pub(crate) middlewares: Middlewares,
    pub(crate) timeout: Option<Timeout>,
}

/// Deadline for a whole chain. On expiry the chain is dropped and the
/// response replaced by `message` with `status`.
#[derive(Clone, Debug)]
pub(crate) struct Timeout {
    pub(crate) duration: Duration,
    pub(crate) message: String,
    pub(crate) status: StatusCode,
}

impl Router {
    pub fn new() -> Self {
        Self {
            groups: vec![GroupNode { parent: None, prefix: String::new(), middlewares: Middlewares::new() }],
            routes: Vec::new(),
        }
    }

    /// Returns a handle to a new child group of the root.
    pub fn new_group_path(&mut self, prefix: &str) -> Group<'_> {
        let id = self.add_group(ROOT, prefix);
        Group { router: self, id }
    }

    /// Replaces the root middlewares. Previous `use_*` calls are discarded.
    pub fn middlewares(&mut self, middlewares: Middlewares) -> &mut Self {
        self.groups[ROOT].middlewares = middlewares;
        self
    }

    /// Middleware run before the view of every route.
    pub fn use_before<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.groups[ROOT].middlewares.before.push(Middleware::new(handler));
        self
    }

    /// Middleware run after the view of every route.
    pub fn use_after<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.groups[ROOT].middlewares.after.push(Middleware::new(handler));
        self
    }

    /// Removes `handler` from every chain. Only its type is used.
    pub fn skip_middlewares<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.groups[ROOT].middlewares = std::mem::take(&mut self.groups[ROOT].middlewares).skip(handler);
        self
    }

    pub fn get(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::GET, url, view)
    }

    pub fn head(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::HEAD, url, view)
    }

    pub fn options(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::OPTIONS, url, view)
    }

    pub fn post(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::POST, url, view)
    }

    pub fn put(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::PUT, url, view)
    }

    pub fn patch(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::PATCH, url, view)
    }

    pub fn delete(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::DELETE, url, view)
    }

    /// Registers `view` for every method that has no route of its own at `url`.
    pub fn any(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        let index = self.add_route(ROOT, RouteMethod::Any, url, Arc::new(view));
        Path { router: self, index }
    }

    /// Registers `view` for `method` at `url`. Use it for custom methods.
    ///
    /// # Panics
    ///
    /// Panics if `method` is not uppercase.
    pub fn path(&mut self, method: Method, url: &str, view: impl Handler) -> Path<'_> {
        let index = self.add_route(ROOT, RouteMethod::exact(method), url, Arc::new(view));
        Path { router: self, index }
    }

    /// Registers a plain synchronous handler as the view for `method` at
    /// `url`.
    ///
    /// ```rust
    /// # use trellis::Router;
    /// let mut router = Router::new();
    /// router.request_handler_path(http::Method::GET, "/ping", |_req, res| res.set_body("pong"));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `method` is not uppercase.
    pub fn request_handler_path<F>(&mut self, method: Method, url: &str, handler: F) -> Path<'_>
    where
        F: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.path(method, url, RequestHandler(handler))
    }

    /// Registered URLs grouped by method, in registration order.
    ///
    /// ANY routes are listed under [`ANY`](crate::ANY). Automatic OPTIONS
    /// routes are not listed.
    pub fn list_paths(&self) -> BTreeMap<String, Vec<String>> {
        let mut paths: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for route in &self.routes {
            paths.entry(route.method.as_str().to_owned()).or_default().push(route.url.clone());
        }
        paths
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn add_group(&mut self, parent: usize, prefix: &str) -> usize {
        self.groups.push(GroupNode {
            parent: Some(parent),
            prefix: prefix.to_owned(),
            middlewares: Middlewares::new(),
        });
        self.groups.len() - 1
    }

    fn add_route(&mut self, group: usize, method: RouteMethod, url: &str, view: BoxedHandler) -> usize {
        let url = self.full_path(group, url);
        self.routes.push(RouteDef {
            method,
            url,
            view,
            group,
            middlewares: Middlewares::new(),
            timeout: None,
        });
        self.routes.len() - 1
    }

    /// Ancestor prefixes, then the group prefix, then `url`.
    fn full_path(&self, group: usize, url: &str) -> String {
        let mut prefixes = Vec::new();
        let mut current = Some(group);
        while let Some(id) = current {
            prefixes.push(self.groups[id].prefix.as_str());
            current = self.groups[id].parent;
        }
        let mut full: String = prefixes.into_iter().rev().collect();
        full.push_str(url);
        full
    }

    pub(crate) fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    /// Flattens the middlewares a route runs with.
    ///
    /// Walking from the route's group up to the root, each level's before
    /// middlewares are put in front and its after middlewares at the back.
    /// Skips accumulate from every level and are applied last, so a group can
    /// opt out of a middleware registered on any of its ancestors. `debug` is
    /// prepended before skipping and cannot be skipped.
    pub(crate) fn build_middlewares(&self, route: &RouteDef, debug: Option<Middleware>) -> Middlewares {
        let mut acc = route.middlewares.clone();
        let mut current = Some(route.group);

        while let Some(id) = current {
            let level = &self.groups[id].middlewares;
            let mut before = level.before.clone();
            before.append(&mut acc.before);
            acc.before = before;
            acc.after.extend(level.after.iter().cloned());
            acc.skip.extend(level.skip.iter().copied());
            current = self.groups[id].parent;
        }

        if let Some(debug) = debug {
            acc.before.insert(0, debug);
        }

        let skip = std::mem::take(&mut acc.skip);
        acc.before.retain(|mw| !skip.contains(&mw.id));
        acc.after.retain(|mw| !skip.contains(&mw.id));
        acc.skip = skip;
        acc
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// A route group: a URL prefix plus middlewares shared by its routes and
/// every nested group.
///
/// Borrowing the router mutably, a group handle lives only while routes are
/// being registered. The group itself persists inside the router.
pub struct Group<'r> {
    router: &'r mut Router,
    id: usize,
}

impl Group<'_> {
    /// Returns a handle to a child group. Its prefix is appended to this one.
    pub fn new_group_path(&mut self, prefix: &str) -> Group<'_> {
        let id = self.router.add_group(self.id, prefix);
        Group { router: &mut *self.router, id }
    }

    /// Replaces this group's middlewares.
    pub fn middlewares(&mut self, middlewares: Middlewares) -> &mut Self {
        self.node().middlewares = middlewares;
        self
    }

    pub fn use_before<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.node().middlewares.before.push(Middleware::new(handler));
        self
    }

    pub fn use_after<H: Handler>(&mut self, handler: H) -> &mut Self {
        self.node().middlewares.after.push(Middleware::new(handler));
        self
    }

    /// Removes `handler` from the chains of this group, including middlewares
    /// inherited from ancestors.
    pub fn skip_middlewares<H: Handler>(&mut self, handler: H) -> &mut Self {
        let node = self.node();
        node.middlewares = std::mem::take(&mut node.middlewares).skip(handler);
        self
    }

    pub fn get(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::GET, url, view)
    }

    pub fn head(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::HEAD, url, view)
    }

    pub fn options(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::OPTIONS, url, view)
    }

    pub fn post(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::POST, url, view)
    }

    pub fn put(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::PUT, url, view)
    }

    pub fn patch(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::PATCH, url, view)
    }

    pub fn delete(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        self.path(Method::DELETE, url, view)
    }

    pub fn any(&mut self, url: &str, view: impl Handler) -> Path<'_> {
        let index = self.router.add_route(self.id, RouteMethod::Any, url, Arc::new(view));
        Path { router: &mut *self.router, index }
    }

    /// # Panics
    ///
    /// Panics if `method` is not uppercase.
    pub fn path(&mut self, method: Method, url: &str, view: impl Handler) -> Path<'_> {
        let index = self.router.add_route(self.id, RouteMethod::exact(method), url, Arc::new(view));
        Path { router: &mut *self.router, index }
    }

    pub fn request_handler_path<F>(&mut self, method: Method, url: &str, handler: F) -> Path<'_>
    where
        F: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.path(method, url, RequestHandler(handler))
    }

    fn node(&mut self) -> &mut GroupNode {
        &mut self.router.groups[self.id]
    }
}

// ── Path ──────────────────────────────────────────────────────────────────────

/// Handle to a registered route, for route-scoped settings (filters,
/// timeout). Returned by every registration method.
pub struct Path<'r> {
    router: &'r mut Router,
    index: usize,
}

impl Path<'_> {
    /// Replaces the route's filters.
    pub fn middlewares(self, middlewares: Middlewares) -> Self {
        self.router.routes[self.index].middlewares = middlewares;
        self
    }

    /// Filter run before the view, after every inherited before middleware.
    pub fn use_before<H: Handler>(self, handler: H) -> Self {
        self.router.routes[self.index].middlewares.before.push(Middleware::new(handler));
        self
    }

    /// Filter run after the view, before every inherited after middleware.
    pub fn use_after<H: Handler>(self, handler: H) -> Self {
        self.router.routes[self.index].middlewares.after.push(Middleware::new(handler));
        self
    }

    /// Removes `handler` from this route's chain only.
    pub fn skip_middlewares<H: Handler>(self, handler: H) -> Self {
        let route = &mut self.router.routes[self.index];
        route.middlewares = std::mem::take(&mut route.middlewares).skip(handler);
        self
    }

    /// Answers `408 Request Timeout` with `message` if the chain takes longer
    /// than `duration`.
    pub fn timeout(self, duration: Duration, message: &str) -> Self {
        self.timeout_code(duration, message, StatusCode::REQUEST_TIMEOUT)
    }

    /// Like [`timeout`](Path::timeout) with a custom status.
    pub fn timeout_code(self, duration: Duration, message: &str, status: StatusCode) -> Self {
        self.router.routes[self.index].timeout = Some(Timeout {
            duration,
            message: message.to_owned(),
            status,
        });
        self
    }

    /// The full URL this route was registered under, group prefixes included.
    pub fn url(&self) -> &str {
        &self.router.routes[self.index].url
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use super::*;
    use crate::context::RequestCtx;
    use crate::handler::{BoxFuture, HandlerResult};

    fn view(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move { ctx.text_response("view") })
    }

    fn a(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { ctx.next() }) }
    fn b(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { ctx.next() }) }
    fn c(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { ctx.next() }) }
    fn d(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> { Box::pin(async move { ctx.next() }) }

    fn id_of<H: Handler>(_: H) -> TypeId {
        TypeId::of::<H>()
    }

    fn ids(list: &[Middleware]) -> Vec<TypeId> {
        list.iter().map(|mw| mw.id).collect()
    }

    #[test]
    fn nested_groups_concatenate_prefixes() {
        let mut router = Router::new();
        let mut api = router.new_group_path("/api");
        let mut v1 = api.new_group_path("/v1");
        assert_eq!(v1.get("/users/{id}", view).url(), "/api/v1/users/{id}");
        assert_eq!(api.get("/status", view).url(), "/api/status");
        assert_eq!(router.get("/", view).url(), "/");
    }

    #[test]
    fn parents_wrap_children() {
        let mut router = Router::new();
        router.use_before(a).use_after(a);
        {
            let mut group = router.new_group_path("/g");
            group.use_before(b).use_after(b);
            group.get("/x", view).use_before(c).use_after(c);
        }

        let route = &router.routes()[0];
        let mw = router.build_middlewares(route, None);
        assert_eq!(ids(&mw.before), vec![id_of(a), id_of(b), id_of(c)]);
        assert_eq!(ids(&mw.after), vec![id_of(c), id_of(b), id_of(a)]);
    }

    #[test]
    fn skips_from_any_level_apply_last() {
        let mut router = Router::new();
        router.use_before(a).use_before(b).use_after(d);
        {
            let mut group = router.new_group_path("/g");
            group.skip_middlewares(a);
            group.get("/x", view).skip_middlewares(d).use_before(c);
            group.get("/y", view);
        }
        router.get("/z", view);

        let routes = router.routes();
        let x = router.build_middlewares(&routes[0], None);
        assert_eq!(ids(&x.before), vec![id_of(b), id_of(c)]);
        assert!(x.after.is_empty());

        let y = router.build_middlewares(&routes[1], None);
        assert_eq!(ids(&y.before), vec![id_of(b)]);
        assert_eq!(ids(&y.after), vec![id_of(d)]);

        let z = router.build_middlewares(&routes[2], None);
        assert_eq!(ids(&z.before), vec![id_of(a), id_of(b)]);
    }

    #[test]
    fn debug_middleware_runs_first() {
        let mut router = Router::new();
        router.use_before(a);
        router.get("/", view);

        let mw = router.build_middlewares(&router.routes()[0], Some(Middleware::new(d)));
        assert_eq!(ids(&mw.before), vec![id_of(d), id_of(a)]);
    }

    #[test]
    fn group_middlewares_replace_previous_registrations() {
        let mut router = Router::new();
        {
            let mut group = router.new_group_path("/g");
            group.use_before(a);
            group.middlewares(Middlewares::new().before(b).after(c));
            group.get("/", view);
        }

        let mw = router.build_middlewares(&router.routes()[0], None);
        assert_eq!(ids(&mw.before), vec![id_of(b)]);
        assert_eq!(ids(&mw.after), vec![id_of(c)]);
    }

    #[test]
    fn list_paths_groups_by_method() {
        let mut router = Router::new();
        router.get("/a", view);
        router.post("/a", view);
        router.get("/b", view);
        router.any("/c", view);

        let paths = router.list_paths();
        assert_eq!(paths["GET"], vec!["/a", "/b"]);
        assert_eq!(paths["POST"], vec!["/a"]);
        assert_eq!(paths["*"], vec!["/c"]);
        assert!(!paths.contains_key("OPTIONS"));
    }

    #[test]
    fn timeouts_default_to_request_timeout() {
        let mut router = Router::new();
        router.get("/slow", view).timeout(Duration::from_millis(5), "slow");
        router.get("/slower", view).timeout_code(Duration::from_millis(5), "slower", StatusCode::GATEWAY_TIMEOUT);

        let routes = router.routes();
        assert_eq!(routes[0].timeout.as_ref().unwrap().status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(routes[1].timeout.as_ref().unwrap().status, StatusCode::GATEWAY_TIMEOUT);
    }
}
