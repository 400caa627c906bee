//! News portal
//!
//! Filtered and paginated news lists, cached post detail pages, permission
//! gated editing and per-category subscriptions, served as a JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
