//! Proxy service module
//!
//! This module implements the forward proxy itself: the accept loop, the
//! per-connection handler, the HTTP relay and CONNECT tunnels.
//!
//! The service is controlled through a message channel (`ProxyHandle`), so
//! certificate reloads and shutdown never need a lock on the server.

pub mod forwarder;
pub mod handler;
pub mod message;
pub mod relay;
pub mod response;
pub mod server;
pub mod target;
pub mod tunnel;
pub mod upstream;

pub use handler::ProxyContext;
pub use message::{ProxyHandle, ProxyMessage};
pub use server::{Proxy, SHUTDOWN_GRACE};
pub use target::{Scheme, Target};
