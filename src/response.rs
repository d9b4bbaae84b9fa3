//! Outgoing HTTP response type.
//!
//! Every step of a chain writes into the same [`Response`]. Views usually go
//! through the shortcuts on [`RequestCtx`](crate::RequestCtx) (`text_response`,
//! `json_response`, …); middlewares reach in here to add headers or inspect
//! what the view produced.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

use crate::handler::HandlerResult;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`RequestCtx::raw_response`](crate::RequestCtx::raw_response).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The response half of a [`RequestCtx`](crate::RequestCtx).
///
/// Starts every request as `200 OK` with no headers and an empty body.
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
}

impl Response {
    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Appends to the body. After-middlewares use this to decorate what the
    /// view wrote.
    pub fn append_body(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    /// Sets (replaces) a header. Fails on an invalid name or value.
    pub fn set_header(&mut self, name: &str, value: &str) -> HandlerResult {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Drops status, headers and body.
    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }

    /// Moves the response out into the shape hyper writes to the wire. The
    /// header map and body buffer leave with it.
    pub(crate) fn take_http(&mut self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(std::mem::take(&mut self.body))));
        *res.status_mut() = self.status;
        *res.headers_mut() = std::mem::take(&mut self.headers);
        res
    }
}

impl Default for Response {
    fn default() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: Vec::new() }
    }
}

/// A body-only response outside of any chain (404, 405, unreadable body).
pub(crate) fn plain(status: StatusCode) -> http::Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or_default();
    let mut res = http::Response::new(Full::new(Bytes::from_static(reason.as_bytes())));
    *res.status_mut() = status;
    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(ContentType::Text.as_str()));
    res
}
