//! Local-first journal and habit tracker with an offline asset cache proxy.
//!
//! Two components that share no state:
//!
//! | Component | Stores | Backing |
//! |-----------|--------|---------|
//! | **Local store** | Notes and habits, keyed by `id` | SQLite, one table per collection |
//! | **Cache proxy** | Static app assets, one namespace per version | SQLite or in-memory |
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: journal database opening and schema
//! - [`store`]: asynchronous CRUD over the `notes` and `habits` collections
//! - [`cache`]: cache-first request interceptor with install/activate lifecycle
//! - [`insights`]: remote summary and suggestions for recent notes
//! - [`server`]: HTTP listener that puts the cache proxy in front of an app

pub mod cache;
pub mod config;
pub mod db;
pub mod insights;
pub mod server;
pub mod store;
