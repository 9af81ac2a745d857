//! # TaskHub API Server Library
//!
//! HTTP surface for TaskHub: account management and per-user tasks on top
//! of the `taskhub-shared` services.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Environment configuration
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Validated JSON extractor
//! - `middleware`: Security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
