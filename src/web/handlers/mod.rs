//! HTTP handlers, grouped by concern.

pub mod audio;
pub mod campaigns;
pub mod hooks;
pub mod system;
