pub mod app;
pub mod app_state;
pub mod auth;
pub mod compliance;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod modules;
pub mod services;
pub mod telemetry;
