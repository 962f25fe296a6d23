pub mod core;
pub mod error;
pub mod math;
pub mod notice;
