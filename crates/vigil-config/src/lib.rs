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

//! Device configuration management for the Vigil fleet console.
//!
//! Layout: `tree.rs` (typed section/parameter value trees), `schema.rs`
//! (canonical defaults + declarative validation rules), `validate.rs` and
//! `merge.rs` (rule evaluation, completion, diff summaries), `model.rs`
//! (domain models), `service.rs` (`ConfigService` + `DeviceSettingsFacade`).

pub mod error;
pub mod merge;
pub mod model;
pub mod schema;
pub mod service;
pub mod tree;

mod validate;

pub use error::{ConfigError, ConfigResult};
pub use merge::summarize_changes;
pub use model::{
    Ack, ChangeKind, ChangeReceipt, ConfigHistoryEntry, ConfigProfile, DeviceConfig,
    DuplicateReport, FleetDevice,
};
pub use schema::{ConfigSchema, ParamType, ValidationRule};
pub use service::{ConfigService, DeviceSettingsFacade};
pub use tree::{ConfigTree, ParamValue};
