//! # Session Index
//!
//! Session-scoped semantic indexing and retrieval for virtual files.
//!
//! Editors push file revisions for a chat session; each revision is split
//! into overlapping line windows, embedded, and upserted into a vector
//! collection under deterministic ids. Searches embed the query and return
//! the nearest chunks of that session only.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ HTTP / CLI  │──▶│   Indexer     │──▶│   VectorStore     │
//! │   (sidx)    │   │ Chunk+Embed  │   │ memory/sqlite/    │
//! └─────────────┘   └──────────────┘   │ chroma            │
//!        │          ┌──────────────┐   │                   │
//!        └─────────▶│  Retriever   │──▶│                   │
//!                   └──────────────┘   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sidx init                                   # create / connect the store
//! sidx index src/app.ts --session chat-1      # index one file
//! sidx search "router setup" --session chat-1
//! sidx serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`commands`] | `sidx` command implementations |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`chroma_store`] | Chroma vector store |
//! | [`services`] | Store, embedder, and pipeline wiring |
//! | [`protocol`] | HTTP request/response format |
//! | [`server`] | HTTP server |

pub mod chroma_store;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod protocol;
pub mod server;
pub mod services;
pub mod sqlite_store;
