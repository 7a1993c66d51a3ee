//! Caption timing and ASS rendering.

pub mod ass;
pub mod segment;
