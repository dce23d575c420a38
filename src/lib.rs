//! # kb-rag
//!
//! A retrieval-augmented knowledge base over PDF documents.
//!
//! PDFs under a global root and per-organization directories are extracted,
//! split into overlapping windows, de-duplicated, embedded, and stored in a
//! SQLite vector store. An HTTP service answers questions and writes
//! organization summaries from the stored chunks, always filtered to the
//! requesting organization, using a hosted LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  documents/ │──▶│ Ingest       │──▶│ SQLite       │
//! │  *.pdf      │   │ split+dedup  │   │ chunks+vecs  │
//! └─────────────┘   │ +embed       │   └──────┬───────┘
//!        ▲          └──────┬───────┘          │
//!        │                 ▼                  ▼
//!  processed_files.json (manifest)    ┌──────────────┐   ┌─────┐
//!                                     │ HTTP service │──▶│ LLM │
//!                                     │ /api/chat    │   └─────┘
//!                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb init                         # create the vector store
//! kb ingest                       # ingest new and changed PDFs
//! kb search "budget" --org acme   # inspect retrieval
//! kb serve                        # start the HTTP service
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`manifest`] | File hashing and the processed-file manifest |
//! | [`discovery`] | Knowledge-base directory walk |
//! | [`extract`] | PDF text extraction |
//! | [`splitter`] | Overlapping character splitter |
//! | [`dedup`] | Run-scoped chunk de-duplication |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`index`] | Embedder + store handle |
//! | [`ingest`] | Ingestion pipeline |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`llm`] | Chat-completion providers |
//! | [`answer`] | Grounded chat and summaries |
//! | [`server`] | HTTP service |
//! | [`search`] | `kb search` output |
//! | [`stats`] | `kb stats` output |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod answer;
pub mod config;
pub mod db;
pub mod dedup;
pub mod discovery;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod manifest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod search;
pub mod server;
pub mod splitter;
pub mod stats;
pub mod store;
