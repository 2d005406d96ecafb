//! Compiled-in defaults shared by the preprocessing tools.

pub mod class;
pub mod record_layout;
