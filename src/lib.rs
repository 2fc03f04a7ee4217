//! Bitcoin net-worth projections under a power-law price model.
//!
//! `core` holds the deterministic engine, `api` the HTTP JSON surface over it,
//! and `config` the process settings both share.

pub mod api;
pub mod config;
pub mod core;
