//! # Memory Core
//!
//! Long-term memory lifecycle engine for conversational agents: ingests free-form
//! text, segments it into semantically cohesive units, deduplicates and
//! arbitrates conflicts against prior content, and exposes hybrid (vector +
//! lexical) retrieval together with graph-style traversal over supersession
//! and sequence edges.
//!
//! This crate is the engine only. Tool routing, auth, and process wiring live
//! in the `memory-mcp` binary crate; this crate exposes the primitives that
//! binary composes: [`Store`](store::Store), [`Config`](config::Config),
//! [`llm::LlmGateway`], the [`pipeline`], [`retrieval`], [`primer`],
//! [`worker`], and [`ttl_daemon`] modules.

pub mod config;
pub mod error;
pub mod identity;
pub mod llm;
pub mod pipeline;
pub mod primer;
pub mod retrieval;
pub mod store;
pub mod testing;
pub mod ttl_daemon;
pub mod types;
pub mod worker;

pub use config::Config;
pub use error::{EngineError, Result};
pub use store::Store;
