//! Version store — durable, queryable record of all content versions.
//!
//! ## Overview
//!
//! Every transformation in the pipeline produces an immutable
//! `ContentVersion`; this subsystem is the single source of truth for
//! "what is the latest X for chapter Y". Versions are persisted to one
//! SQLite table together with a content fingerprint and a local embedding
//! vector, so the store can answer exact lookups, lineage queries, and
//! semantic similarity searches without any external service.
//!
//! ## Module Map
//!
//! | Module      | Responsibility                                         |
//! |-------------|--------------------------------------------------------|
//! | `db`        | `VersionStore` (sync SQLite core) + `StoreHandle`      |
//! |             | (async wrapper running calls on the blocking pool)     |
//! | `embedding` | Deterministic hashed bag-of-words embeddings + cosine  |

pub mod db;
pub mod embedding;

pub use db::{StoreHandle, VersionStore};
