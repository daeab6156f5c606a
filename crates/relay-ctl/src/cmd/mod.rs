//! CLI command modules.

pub mod http;
pub mod share;
pub mod status;
