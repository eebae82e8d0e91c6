//! Symposium registration backend: participants, event catalog, enrollments
//! and payment review over MongoDB, plus the client session library.

pub mod api;
pub mod config;
pub mod database;
pub mod middleware;
pub mod models;
pub mod seeds;
pub mod services;
pub mod session;
pub mod state;
pub mod utils;
