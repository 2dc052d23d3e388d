pub mod activity;
pub mod api;
pub mod cache;
pub mod chain;
pub mod classify;
pub mod config;
pub mod engine_stats;
pub mod error;
pub mod eth;
pub mod explorer;
pub mod feed;
pub mod hydrate;
pub mod models;
pub mod reconcile;
pub mod registry;
pub mod retry;
pub mod stats;
