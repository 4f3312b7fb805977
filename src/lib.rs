//! # aPix Server
//!
//! Local image storage backend for the aPix image generation client.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (categories, stored image records)
//! - **storage**: Sandboxed filesystem layout, path resolution, filename
//!   allocation and legacy migration
//! - **api**: REST API endpoints and static file mounts
//! - **genai**: Generative AI client handle
//! - **config**: Configuration loading and validation

pub mod api;
pub mod config;
pub mod genai;
pub mod models;
pub mod storage;

pub use models::*;
