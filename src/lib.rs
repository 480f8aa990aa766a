//! Settings synchronization, page styling and backend relay for an
//! accessibility shopping overlay.

pub mod assets;
pub mod background;
pub mod config;
pub mod content;
pub mod diagnostics;
pub mod protocol;
pub mod settings;
