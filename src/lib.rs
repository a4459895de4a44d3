//! Cotton Advisor - grounded question answering for cotton pest and disease management
//!
//! Retrieves advisory passages nearest to a question, assembles a citation-annotated
//! prompt, and asks a hosted LLM for an answer, retrying transient failures and
//! translating the rest into plain user-facing messages.

pub mod cli;
pub mod config;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod server;

pub use error::{AdvisorError, Result};
