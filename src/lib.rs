//! Chat client for the campus ambassador platform: REST transport, live
//! updates over Socket.IO, and an egui front end.

pub mod common;
pub mod config;
pub mod error;
pub mod network;
pub mod security;
pub mod session;
pub mod storage;
pub mod ui;

pub use error::{ChatError, Result};
