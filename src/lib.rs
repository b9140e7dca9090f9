//! # jarvis-rs
//!
//! Postgres-backed memory engine for the Jarvis personal assistant.
//!
//! Provides episodic memory (pgvector via sqlx), a chat-history import
//! pipeline, chat-embedded directive routing, LLM provider setup
//! (rig-core), and OpenTelemetry observability.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod llm;
pub mod memory;
pub mod model;
pub mod telemetry;
