pub mod aggregate;
pub mod classify;
pub mod code;
pub mod config;
pub mod error;
pub mod extract;
pub mod finding;
pub mod patterns;
pub mod report;
pub mod segment;
pub mod text;
pub mod validate;
