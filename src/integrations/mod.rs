//! 框架集成

#[cfg(feature = "tower")]
pub mod tower;
