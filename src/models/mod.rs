//! Domain model module declarations.

pub mod sample;
pub mod session;
