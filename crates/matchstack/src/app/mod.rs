//! Application layer orchestrating domain logic and infrastructure.

pub mod locate;
pub mod pipeline;
pub mod render;
