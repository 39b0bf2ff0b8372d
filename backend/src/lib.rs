//! Article CMS backend: a JSON-document article store with image uploads,
//! exposed over HTTP with actix-web.

pub mod config;
pub mod error;
pub mod maintenance;
pub mod services;
pub mod store;
