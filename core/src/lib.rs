//! Blocking client for the Scrapyd JSON API.
//!
//! # Overview
//! `ScrapydApi` maps one method onto each Scrapyd endpoint: it resolves the
//! endpoint URL against the configured target, performs a single request
//! through an `HttpDelegate`, and returns the interesting field of the
//! response.
//!
//! ```no_run
//! use scrapyd_api::ScrapydApi;
//!
//! # fn main() -> scrapyd_api::Result<()> {
//! let api = ScrapydApi::builder()
//!     .target("http://localhost:6800")
//!     .auth("admin", "secret")
//!     .build();
//! for project in api.list_projects()? {
//!     println!("{project}: {:?}", api.list_spiders(&project)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - The transport is a trait (`HttpDelegate`) so tests and callers can
//!   inject their own; `UreqDelegate` is the default.
//! - Each client owns its endpoint map, seeded from `default_endpoints()` and
//!   overlaid with caller overrides.
//! - Errors from the delegate are returned as-is; the client adds only
//!   unknown-endpoint and missing-field errors of its own.

pub mod client;
pub mod delegate;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod types;

pub use client::{ScrapydApi, ScrapydApiBuilder, DEFAULT_TARGET};
pub use delegate::UreqDelegate;
pub use endpoints::default_endpoints;
pub use error::{Result, ScrapydError};
pub use http::{decode_response, encode_multipart, FilePart, FormData, HttpDelegate};
pub use types::{Credentials, DaemonStatus, JobState};
