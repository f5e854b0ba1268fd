//! services/api/src/lib.rs
//!
//! The outer shell around `fitlog_core`: configuration, the PostgreSQL and
//! OpenAI adapters, and the REST surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
