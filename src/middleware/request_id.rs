use http::HeaderValue;
use uuid::Uuid;

use crate::context::RequestCtx;
use crate::handler::{BoxFuture, HandlerResult};

pub const X_REQUEST_ID: &str = "x-request-id";

/// The id of the current request, stored in the request extensions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestId(pub String);

/// Tags every request with an id.
///
/// Reuses the incoming `X-Request-ID` header when the client (or a proxy in
/// front) sent one, otherwise mints a UUID v4. The id is echoed on the
/// response and available to later steps as `ctx.extensions().get::<RequestId>()`.
pub fn request_id(ctx: &mut RequestCtx) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let id = match ctx.request().header(X_REQUEST_ID) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => Uuid::new_v4().to_string(),
        };

        ctx.response_mut().headers_mut().insert(X_REQUEST_ID, HeaderValue::from_str(&id)?);
        ctx.extensions_mut().insert(RequestId(id));
        ctx.next()
    })
}
