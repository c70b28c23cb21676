//! CouchDB HTTP client implementation.
//!
//! This module provides the driver side of the crate, enabling clients to:
//!
//! - **Connect** to a server from a DSN, with cookie or Basic authentication
//! - **Read and write documents**, streaming attachments as `multipart/related`
//! - **Query** `_all_docs` and views
//! - **Administer** databases (stats, compaction, security)
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── transport - CouchClient, request options, status handling
//! ├── db        - Database operations
//! ├── auth      - Basic and cookie authenticators
//! ├── config    - Client configuration
//! └── utils     - Error classification and path helpers
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CouchClient`] | Connection to a server |
//! | [`Database`] | Document and admin operations on one database |
//! | [`RequestOptions`] | Per-request headers, body and query |
//! | [`Authenticator`] | Pluggable authentication |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ## Configuring a Client
//!
//! ```
//! use couchdb_stream_http::client::ClientConfig;
//!
//! let config = ClientConfig {
//!     request_timeout_ms: 10_000,
//!     pipe_capacity: 4,
//!     ..Default::default()
//! };
//! assert!(config.enable_logging);
//! ```
//!
//! ## Path Helpers
//!
//! ```
//! use couchdb_stream_http::client::doc_id_segments;
//!
//! // Design document IDs keep their slash.
//! assert_eq!(doc_id_segments("_design/app"), ["_design", "app"]);
//! ```

mod auth;
mod config;
mod db;
mod transport;
mod utils;

pub use auth::{Authenticator, BasicAuth, CookieAuth};
pub use config::ClientConfig;
pub use db::Database;
pub use transport::{etag, get_rev, CouchClient, RequestOptions};
pub use utils::*;
