//! Order lifecycle backend: order orchestration, assembly simulation and
//! user notifications connected by at-least-once events.

pub mod actors;
pub mod api;
pub mod app;
pub mod clients;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod messaging;
pub mod metrics;
pub mod services;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;
