//! Clicktrail - click attribution and postback delivery engine
//!
//! Records partner clicks and downstream conversion events, then relays them
//! to external tracking systems through owner-configured postback profiles.
//!
//! # Features
//! - **server**: HTTP server mode (default)
//!
//! # Architecture
//! - `tracking`: click/event ingestion, click ids, landing URLs, enrichment
//! - `postback`: template rendering, profile resolution, signing, delivery and retry
//! - `services`: profile registry and blacklist
//! - `storage`: domain models, repository traits and the sea-orm backend
//! - `api`: HTTP routes and middleware
//! - `config`: static configuration
//! - `runtime`: application lifecycle and execution modes
//! - `system`: logging and panic handling

pub mod api;
pub mod config;
pub mod errors;
pub mod postback;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod tracking;
pub mod utils;
