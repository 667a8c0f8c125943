//! proxy-admin-rpc: JSON-RPC administrative control plane for a network proxy
//!
//! Operators and tools send JSON-RPC 2.0 requests over a local Unix socket to
//! inspect and change the proxy's configuration records at runtime.
//!
//! # Architecture
//!
//! - **Dispatch core** ([`rpc`]): decodes requests, routes them to registered
//!   handlers, applies per-handler access policy, encodes responses
//! - **Record store** ([`records`]): named, typed configuration and metric
//!   values, with validity checks on writes
//! - **Admin handlers** ([`handlers`]): the methods operators call
//! - **Transports** ([`transport`]): Unix socket server and a stdio loop
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use proxy_admin_rpc::handlers::register_admin_handlers;
//! use proxy_admin_rpc::records::MemoryRecordStore;
//! use proxy_admin_rpc::rpc::Engine;
//!
//! let engine = Engine::new();
//! register_admin_handlers(&engine, Arc::new(MemoryRecordStore::new()));
//! let reply = engine.handle_call(r#"{"method":"show_registered_handlers","id":1}"#);
//! assert!(reply.is_some());
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`rpc`]: JSON-RPC dispatch engine
//! - [`records`]: Record store
//! - [`handlers`]: Admin handlers
//! - [`transport`]: Socket and stdio transports (Unix only)

pub mod config;
pub mod error;
pub mod handlers;
pub mod records;
pub mod rpc;
pub mod transport;
