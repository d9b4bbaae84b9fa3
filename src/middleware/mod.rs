//! Built-in middlewares.
//!
//! Register them like any other middleware:
//!
//! ```rust
//! use trellis::{Router, middleware};
//!
//! let mut router = Router::new();
//! router.use_before(middleware::request_id);
//! ```

mod request_id;

pub use request_id::{RequestId, X_REQUEST_ID, request_id};
