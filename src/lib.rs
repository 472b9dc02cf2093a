//! Storyboard preview for AI-generated anime scripts: parses the bracket-tag
//! shot format, resolves generated assets, and plays the shots back on a
//! duration-proportional timeline.

pub mod config;
pub mod error;
pub mod playback;
pub mod script;
pub mod timeline;
pub mod video;

pub use error::{PreviewError, Result};
