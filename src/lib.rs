// src/lib.rs
pub mod cache;
pub mod config;
pub mod events;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod retry;
pub mod server;
