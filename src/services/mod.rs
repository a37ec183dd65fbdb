//! Domain services used by the HTTP and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on request parsing, auth plumbing and status
//! mapping.

pub mod auth;
pub mod cart;
pub mod demo;
pub mod feed;
pub mod menu;
pub mod order;
pub mod persistence;
pub mod sales;
pub mod session;
pub mod stall;
