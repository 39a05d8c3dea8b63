//! # corpus-chat
//!
//! A streamed, corpus-grounded chat client and server for local document
//! Q&A.
//!
//! The server turns a chat request into a line-framed event stream over a
//! long-lived HTTP response; the client consumes that byte stream,
//! reassembles frames across network chunk boundaries, routes control
//! frames, and incrementally re-segments answer text into presentable
//! units — with cooperative mid-stream cancellation throughout.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  data: frames   ┌──────────────┐
//! │  server  │────────────────▶│ reassembler  │
//! │ producer │  (HTTP stream)  │   classifier │
//! └────┬─────┘                 │   segmenter  │
//!      │                       │   session    │
//! ┌────▼─────┐                 └──────┬───────┘
//! │  SQLite  │                        ▼
//! │  corpus  │                 display units
//! └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cchat init                        # create database
//! cchat serve                       # start the HTTP server
//! cchat docs add notes.md           # add a document
//! cchat sync                        # or bulk-ingest a folder
//! cchat chat "what do my notes say about deployment?" --grounded
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`wire`] | Line reassembly and frame encoding |
//! | [`frame`] | Frame classification |
//! | [`segment`] | Incremental text segmentation into display units |
//! | [`session`] | Stream session state machine |
//! | [`consumer`] | Cancellable streaming chat client |
//! | [`server`] | HTTP producer and document API |
//! | [`corpus`] | Document store and retrieval |
//! | [`generate`] | Generator seam and grounding prompt |
//! | [`sync`] | Folder-scan bulk ingestion |
//! | [`extract`] | Plain-text and PDF file reading |
//! | [`config`] | TOML configuration parsing |

pub mod chat_cmd;
pub mod chunk;
pub mod config;
pub mod consumer;
pub mod corpus;
pub mod db;
pub mod docs_cmd;
pub mod extract;
pub mod frame;
pub mod generate;
pub mod migrate;
pub mod models;
pub mod segment;
pub mod server;
pub mod session;
pub mod sync;
pub mod wire;
