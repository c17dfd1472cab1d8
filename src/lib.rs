//! agora: view ingestion, trending threads, tag similarity and cache
//! coherence for a forum backend.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
