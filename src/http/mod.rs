//! Local HTTP surface over the published snapshot.
//!
//! # Routes
//! ```text
//! GET /            → HTML index (Accept: text/html) or all .repo snippets
//! GET /{id}.repo   → .repo snippet pointing back at this server
//! GET /healthz     → "ok" when every repo proxy URL answers
//! ```
//!
//! Every route answers 503 "not ready" until the first successful load.

pub mod handlers;
pub mod server;

pub use server::HttpServer;
