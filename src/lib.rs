//! MCP server that gives AI agents a semantic memory backed by a Qdrant vector database.
//!
//! Agents call two tools: `qdrant-store` saves free text (plus optional JSON metadata) and
//! `qdrant-find` returns the stored entries closest in meaning to a query. Text is turned
//! into vectors locally with ONNX Runtime; the model is fetched and loaded on first use, so
//! the server starts and answers protocol requests even without network access.
//!
//! # Modules
//!
//! - [`config`] — Settings loading from TOML files and environment variables
//! - [`embedding`] — The [`embedding::EmbeddingProvider`] trait and the lazily loaded local model
//! - [`qdrant`] — Qdrant REST connector: collections, upserts, similarity queries
//! - [`tools`] — MCP tool handler exposing `qdrant-store` and `qdrant-find`
//! - [`server`] — stdio and HTTP transport bootstrap

pub mod cli;
pub mod config;
pub mod embedding;
pub mod qdrant;
pub mod server;
pub mod tools;
