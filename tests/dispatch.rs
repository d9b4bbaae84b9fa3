//! Dispatch through `App::call`, no socket involved.

use std::time::Duration;

use bytes::Bytes;
use http::header::ALLOW;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use trellis::{App, BoxFuture, Config, HandlerResult, Middlewares, RequestCtx, Router, middleware};

macro_rules! marker {
    ($name:ident, $mark:literal) => {
        fn $name(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
            Box::pin(async move {
                ctx.response_mut().append_body($mark);
                ctx.next()
            })
        }
    };
}

marker!(global_before, b"[gb]");
marker!(global_after, b"[ga]");
marker!(group_before, b"[pb]");
marker!(group_after, b"[pa]");
marker!(filter_before, b"[fb]");
marker!(filter_after, b"[fa]");

fn view(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.response_mut().append_body(b"[view]");
        Ok(())
    })
}

fn echo_id(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let id = ctx.param("id").unwrap_or("none").to_owned();
        ctx.text_response(id)
    })
}

fn echo_body(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let body = ctx.request().body().to_vec();
        ctx.raw_response(trellis::ContentType::OctetStream, body)
    })
}

fn forbidden(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.response_mut().set_status(StatusCode::FORBIDDEN);
        Err("not allowed".into())
    })
}

fn slow(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        ctx.text_response("finally")
    })
}

fn slow_pass(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        ctx.next()
    })
}

fn request(method: Method, uri: &str, body: &'static [u8]) -> http::Request<Full<Bytes>> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::from_static(body)))
        .unwrap()
}

async fn send(app: &App, method: Method, uri: &str) -> (StatusCode, http::HeaderMap, String) {
    let res = app.call(request(method, uri, b""), "127.0.0.1:40000".parse().unwrap()).await;
    let (parts, body) = res.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, String::from_utf8(body.to_vec()).unwrap())
}

fn layered_router() -> Router {
    let mut router = Router::new();
    router.use_before(global_before).use_after(global_after);

    let mut group = router.new_group_path("/api");
    group.use_before(group_before).use_after(group_after);
    group.get("/layered", view).use_before(filter_before).use_after(filter_after);
    group.get("/filters", view).middlewares(Middlewares::new().before(filter_before).skip(global_after));
    group.get("/users/{id}", echo_id);

    let mut public = group.new_group_path("/public");
    public.skip_middlewares(global_before).skip_middlewares(group_before);
    public.get("/open", view);

    router
}

#[tokio::test]
async fn chain_order_follows_group_nesting() {
    let app = App::new(layered_router(), &Config::default()).unwrap();
    let (status, _, body) = send(&app, Method::GET, "/api/layered").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[gb][pb][fb][view][fa][pa][ga]");
}

#[tokio::test]
async fn route_filters_can_skip_inherited_middlewares() {
    let app = App::new(layered_router(), &Config::default()).unwrap();
    let (_, _, body) = send(&app, Method::GET, "/api/filters").await;
    assert_eq!(body, "[gb][pb][fb][view][pa]");
}

#[tokio::test]
async fn nested_group_skips_ancestor_middlewares() {
    let app = App::new(layered_router(), &Config::default()).unwrap();
    let (_, _, body) = send(&app, Method::GET, "/api/public/open").await;
    assert_eq!(body, "[view][pa][ga]");
}

#[tokio::test]
async fn path_params_reach_the_view() {
    let app = App::new(layered_router(), &Config::default()).unwrap();
    let (_, _, body) = send(&app, Method::GET, "/api/users/42").await;
    assert_eq!(body, "42[pa][ga]");
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let app = App::new(layered_router(), &Config::default()).unwrap();
    let (status, _, _) = send(&app, Method::GET, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_method_is_not_allowed_with_allow_header() {
    let app = App::new(layered_router(), &Config::default()).unwrap();
    let (status, headers, _) = send(&app, Method::DELETE, "/api/layered").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[ALLOW], "GET, OPTIONS");
}

#[tokio::test]
async fn automatic_options_lists_methods_and_runs_middlewares() {
    let mut router = Router::new();
    router.use_before(global_before);
    router.post("/items", view);
    router.get("/items", view);
    router.put("/items", view);

    let app = App::new(router, &Config::default()).unwrap();
    let (status, headers, body) = send(&app, Method::OPTIONS, "/items").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[ALLOW], "GET, POST, PUT");
    assert_eq!(body, "[gb]");
}

#[tokio::test]
async fn automatic_options_runs_the_last_registered_chain() {
    let mut router = Router::new();
    router.get("/x", view);
    router.post("/x", view).use_before(filter_before);

    let app = App::new(router, &Config::default()).unwrap();
    let (status, headers, body) = send(&app, Method::OPTIONS, "/x").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[ALLOW], "GET, POST");
    assert_eq!(body, "[fb]");
}

#[tokio::test(start_paused = true)]
async fn automatic_options_ignores_route_timeout() {
    let mut router = Router::new();
    router.get("/slow", view).use_before(slow_pass).timeout(Duration::from_millis(100), "gave up");

    let app = App::new(router, &Config::default()).unwrap();
    assert_eq!(send(&app, Method::GET, "/slow").await.0, StatusCode::REQUEST_TIMEOUT);

    let (status, headers, _) = send(&app, Method::OPTIONS, "/slow").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[ALLOW], "GET");
}

#[tokio::test]
async fn any_routes_get_automatic_options() {
    let mut router = Router::new();
    router.any("/y", view);
    router.get("/z", view);
    router.any("/z", view);

    let app = App::new(router, &Config::default()).unwrap();
    let (status, headers, body) = send(&app, Method::OPTIONS, "/y").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[ALLOW], "*");
    assert_eq!(body, "");

    let (_, headers, _) = send(&app, Method::OPTIONS, "/z").await;
    assert_eq!(headers[ALLOW], "*, GET");
}

#[tokio::test]
async fn custom_options_view_gets_allow_header() {
    let mut router = Router::new();
    router.get("/items", view);
    router.options("/items", view);
    router.options("/lonely", view);

    let app = App::new(router, &Config::default()).unwrap();
    let (_, headers, body) = send(&app, Method::OPTIONS, "/items").await;
    assert_eq!(headers[ALLOW], "GET");
    assert_eq!(body, "[view]");

    let (_, headers, _) = send(&app, Method::OPTIONS, "/lonely").await;
    assert_eq!(headers[ALLOW], "OPTIONS");
}

#[tokio::test]
async fn automatic_options_can_be_disabled() {
    let mut router = Router::new();
    router.get("/items", view);

    let app = App::new(router, &Config::default().with_handle_options(false)).unwrap();
    let (status, headers, _) = send(&app, Method::OPTIONS, "/items").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[ALLOW], "GET");
}

#[tokio::test]
async fn any_route_is_a_fallback_for_unregistered_methods() {
    let mut router = Router::new();
    router.get("/thing", echo_id);
    router.any("/thing", view);

    let app = App::new(router, &Config::default()).unwrap();
    assert_eq!(send(&app, Method::GET, "/thing").await.2, "none");
    assert_eq!(send(&app, Method::PATCH, "/thing").await.2, "[view]");
}

#[tokio::test]
async fn failing_middleware_renders_error_view_and_stops() {
    let mut router = Router::new();
    router.use_after(global_after);
    router.get("/secret", view).use_before(forbidden);

    let config = Config::default().with_error_view(|ctx, err, status| {
        ctx.error(&format!("{} {err}", status.as_u16()), status);
    });
    let app = App::new(router, &config).unwrap();

    let (status, _, body) = send(&app, Method::GET, "/secret").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "403 not allowed");
}

#[tokio::test(start_paused = true)]
async fn route_timeout_answers_with_configured_status() {
    let mut router = Router::new();
    router.get("/slow", slow).timeout_code(Duration::from_millis(100), "gave up", StatusCode::SERVICE_UNAVAILABLE);

    let app = App::new(router, &Config::default()).unwrap();
    let (status, _, body) = send(&app, Method::GET, "/slow").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "gave up");
}

#[tokio::test]
async fn plain_request_handlers_run_as_views() {
    let mut router = Router::new();
    router.use_after(global_after);
    router.request_handler_path(Method::GET, "/ping", |_req, res| res.set_body("pong"));
    router.new_group_path("/v1").request_handler_path(Method::GET, "/whoami", |req, res| {
        res.set_body(req.header("x-user").unwrap_or("anonymous").to_owned());
    });

    let app = App::new(router, &Config::default()).unwrap();
    assert_eq!(send(&app, Method::GET, "/ping").await.2, "pong[ga]");
    assert_eq!(send(&app, Method::GET, "/v1/whoami").await.2, "anonymous[ga]");
}

#[tokio::test]
async fn request_body_is_buffered_for_the_view() {
    let mut router = Router::new();
    router.post("/echo", echo_body);

    let app = App::new(router, &Config::default()).unwrap();
    let res = app.call(request(Method::POST, "/echo", b"ping"), "127.0.0.1:40000".parse().unwrap()).await;
    assert_eq!(res.into_body().collect().await.unwrap().to_bytes(), Bytes::from_static(b"ping"));
}

#[tokio::test]
async fn request_id_middleware_tags_responses() {
    let mut router = Router::new();
    router.use_before(middleware::request_id);
    router.get("/", view);

    let app = App::new(router, &Config::default()).unwrap();
    let (_, headers, _) = send(&app, Method::GET, "/").await;
    assert!(!headers[middleware::X_REQUEST_ID].is_empty());
}

#[tokio::test]
async fn debug_mode_keeps_responses_unchanged() {
    let app = App::new(layered_router(), &Config::default().with_debug(true)).unwrap();
    let (_, _, body) = send(&app, Method::GET, "/api/layered").await;
    assert_eq!(body, "[gb][pb][fb][view][fa][pa][ga]");
}

#[tokio::test]
async fn contexts_do_not_leak_between_requests() {
    let mut router = Router::new();
    router.get("/a", view);
    router.get("/users/{id}", echo_id);

    let app = App::new(router, &Config::default()).unwrap();
    for _ in 0..3 {
        assert_eq!(send(&app, Method::GET, "/a").await.2, "[view]");
        assert_eq!(send(&app, Method::GET, "/users/7").await.2, "7");
    }
}
