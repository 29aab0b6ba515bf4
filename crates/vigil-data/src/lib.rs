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

//! Data access layer for Vigil: schema migrations, row projections, and the
//! SQL behind device configuration state, history, and profiles.

pub mod devices;
pub mod error;

pub use error::{DataError, Result as DataResult};
