//! Signaldesk - Marketplace backend connecting analysts with traders.
//!
//! This crate implements the subscription lifecycle and payment
//! reconciliation engine: checkout, discounting, webhook-driven state
//! transitions, retry/grace scheduling, and analyst payouts.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
