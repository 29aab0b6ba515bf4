//! Problem type identifiers and header names shared across the HTTP stack.

pub(crate) const PROBLEM_BAD_REQUEST: &str = "about:blank#bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "about:blank#not-found";
pub(crate) const PROBLEM_CONFLICT: &str = "about:blank#conflict";
pub(crate) const PROBLEM_CONFIG_INVALID: &str = "about:blank#config-invalid";
pub(crate) const PROBLEM_INTERNAL: &str = "about:blank#internal";

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
