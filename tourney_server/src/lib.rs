//! HTTP front end for the tournament points ledger.
//!
//! The binary wires [`config`], [`logging`] and [`metrics`] around the
//! router built by [`api::create_router`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
