//! Shopify ChatBI Core - Shared types and result shaping.
//!
//! This crate provides the pieces used by every ChatBI component:
//! - `server` - HTTP service running the question → GraphQL → answer pipeline
//! - `cli` - Command-line tools for migrations and one-shot queries
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here is safe to call concurrently from
//! independent requests.
//!
//! # Modules
//!
//! - [`normalize`] - Locate the tabular array inside a GraphQL result
//! - [`chart`] - Pick category/measure keys from normalized rows
//! - [`sanitize`] - Repair model-generated GraphQL before execution
//! - [`event`] - NDJSON stream events emitted by the chat pipeline
//! - [`types`] - Newtype IDs, shop domains and message roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod chart;
pub mod event;
pub mod normalize;
pub mod sanitize;
pub mod types;

pub use chart::{ChartKeys, ChartPoint, chart_points, pick_keys};
pub use event::ChatStreamEvent;
pub use normalize::{NormalizedRows, normalize};
pub use sanitize::{sanitize, sanitize_at};
pub use types::*;
