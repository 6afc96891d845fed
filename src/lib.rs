//! Client for the vessel charter-rate dashboard backend: credential
//! persistence, token refresh, route guarding and display statistics.

pub mod api;
pub mod config;
pub mod form;
pub mod logging;
pub mod models;
pub mod route;
pub mod session;
pub mod stats;
pub mod store;
