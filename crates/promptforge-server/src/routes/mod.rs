//! API route handlers

pub mod admin;
pub mod render;
pub mod templates;
