//! Data model shared by the article backend and its clients.

pub mod model;
pub mod requests;
pub mod responses;
