//! Per-request context and its pool.
//!
//! A [`RequestCtx`] carries the request, the response being built, typed
//! extensions, and two flags the chain reads between steps: `next` (keep
//! going) and `skip_view`. Contexts are recycled through a [`CtxPool`] so the
//! parameter vector and extension map keep their capacity from one request
//! to the next. Header maps and bodies are moved in from hyper and back out
//! to it, so they are never reused.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use http::{Extensions, HeaderValue, Method, StatusCode, header::LOCATION};
use serde::Serialize;

use crate::handler::HandlerResult;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// Everything a view or middleware can see and change about one request.
#[derive(Default)]
pub struct RequestCtx {
    request: Request,
    response: Response,
    extensions: Extensions,
    next: bool,
    skip_view: bool,
}

impl RequestCtx {
    pub fn request(&self) -> &Request { &self.request }
    #[cfg(test)]
    pub(crate) fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }
    pub(crate) fn split_mut(&mut self) -> (&Request, &mut Response) { (&self.request, &mut self.response) }

    pub fn method(&self) -> &Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }

    /// Shortcut for `ctx.request().param(key)`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.request.param(key)
    }

    /// Typed per-request values shared between middlewares and the view.
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Lets the chain continue with the following step.
    ///
    /// A middleware that returns `Ok(())` without calling `next` stops the
    /// chain: whatever it wrote to the response is sent as is. Write
    /// `return ctx.next();` at the end of a middleware that passes through.
    pub fn next(&mut self) -> HandlerResult {
        self.next = true;
        Ok(())
    }

    /// Skips the view. Remaining before-middlewares and all after-middlewares
    /// still run.
    pub fn skip_view(&mut self) {
        self.skip_view = true;
    }

    pub fn is_view_skipped(&self) -> bool {
        self.skip_view
    }

    // ── Response shortcuts ────────────────────────────────────────────────────

    /// `text/plain; charset=utf-8` body.
    pub fn text_response(&mut self, body: impl Into<String>) -> HandlerResult {
        self.raw_response(ContentType::Text, body.into().into_bytes())
    }

    /// `text/html; charset=utf-8` body.
    pub fn html_response(&mut self, body: impl Into<String>) -> HandlerResult {
        self.raw_response(ContentType::Html, body.into().into_bytes())
    }

    /// Serialises `value` with serde_json into an `application/json` body.
    pub fn json_response<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value)?;
        self.raw_response(ContentType::Json, body)
    }

    /// Body with an explicit content type. XML, binary, SSE, etc.
    pub fn raw_response(&mut self, content_type: ContentType, body: impl Into<Vec<u8>>) -> HandlerResult {
        self.response.set_content_type(content_type);
        self.response.set_body(body);
        Ok(())
    }

    /// Redirects to `location` with a 3xx `status`.
    pub fn redirect_response(&mut self, location: &str, status: StatusCode) -> HandlerResult {
        let location = HeaderValue::from_str(location)?;
        self.response.headers_mut().insert(LOCATION, location);
        self.response.set_status(status);
        Ok(())
    }

    /// Replaces the response with a plain-text error message.
    pub fn error(&mut self, message: &str, status: StatusCode) {
        self.response.reset();
        self.response.set_status(status);
        self.response.set_content_type(ContentType::Text);
        self.response.set_body(message);
    }

    // ── Chain plumbing ────────────────────────────────────────────────────────

    /// Reads and clears the `next` flag.
    pub(crate) fn take_next(&mut self) -> bool {
        std::mem::take(&mut self.next)
    }

    pub(crate) fn fill(
        &mut self,
        parts: http::request::Parts,
        body: Bytes,
        params: impl Iterator<Item = (String, String)>,
        remote_addr: SocketAddr,
    ) {
        self.request.method = parts.method;
        self.request.uri = parts.uri;
        self.request.version = parts.version;
        self.request.headers = parts.headers;
        self.request.body = body;
        self.request.params.extend(params);
        self.request.remote_addr = remote_addr;
    }

    fn reset(&mut self) {
        self.request.reset();
        self.response.reset();
        self.extensions.clear();
        self.next = false;
        self.skip_view = false;
    }
}

// ── Pool ──────────────────────────────────────────────────────────────────────

/// Free list of boxed contexts.
///
/// `acquire` pops a recycled context or allocates a new one; `release`
/// resets it and keeps it unless the pool already holds `capacity` entries.
/// The lock is only held for the push or pop, never across an `.await`.
pub(crate) struct CtxPool {
    free: Mutex<Vec<Box<RequestCtx>>>,
    capacity: usize,
}

impl CtxPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { free: Mutex::new(Vec::new()), capacity }
    }

    pub(crate) fn acquire(&self) -> Box<RequestCtx> {
        self.free.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default()
    }

    pub(crate) fn release(&self, mut ctx: Box<RequestCtx>) {
        ctx.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(ctx);
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
