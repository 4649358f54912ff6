//! HTTP adapters.

pub mod billing;
