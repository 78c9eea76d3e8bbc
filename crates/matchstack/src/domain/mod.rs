//! Core types shared by every stage of a lookup.

pub mod errors;
pub mod model;
