//! Shopify ChatBI server library.
//!
//! Answers natural-language questions about a Shopify store: Claude writes a
//! GraphQL query, the Shopify Admin API runs it, Claude explains the result,
//! and every stage is streamed to the caller as NDJSON.
//!
//! # Security
//!
//! This crate holds per-shop offline Admin API tokens and the Shopify app
//! secret. Tokens never leave the server: they are not serialized, and their
//! `Debug` output is redacted.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod claude;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
