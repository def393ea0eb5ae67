//! Core types for Shopify ChatBI.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod role;
pub mod shop_domain;

pub use id::*;
pub use role::MessageRole;
pub use shop_domain::{ShopDomain, ShopDomainError};
