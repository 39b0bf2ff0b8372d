pub mod article;
pub mod timestamp;
