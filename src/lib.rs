//! Quillpress: a single-tenant blog server.
//!
//! Posts are addressed by canonical slug URLs, authoring is gated by
//! server-side sessions, and every public page carries deterministic SEO
//! metadata derived from the same post data.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
