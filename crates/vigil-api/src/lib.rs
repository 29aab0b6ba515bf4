#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! HTTP surface for the Vigil fleet console: the admin configuration API and
//! the device-facing poll/acknowledge endpoints.
//!
//! Layout: `models.rs` (request/response DTOs), `state.rs` (shared handler
//! state), `http/` (router, error mapping, handlers).

pub mod error;
pub mod http;
pub mod models;

mod config;
mod state;

pub use config::SharedConfig;
pub use error::ApiServerError;
pub use http::router::ApiServer;
