//! Velin Client
//!
//! Typed async client for the document-intelligence service. It is the
//! single point of contact with the external API and hides transport
//! details, authentication, and the two polling protocols: waiting for an
//! uploaded file to become searchable, and waiting for a long-running
//! document analysis job to finish.
//!
//! Polling is expressed as a bounded retry loop over an injected
//! [`Sleeper`], so tests can simulate time without real delays.

mod client;
mod error;
mod poll;
mod types;

pub use client::{
  AnalyzeOptions, ChatOptions, ChunkFilter, ChunkQuery, DocumentClient, FileVisibility,
  SearchOptions, DEFAULT_CHAT_MODEL, DEFAULT_FALLBACK_TOOL, DEFAULT_SEARCH_TOOL,
};
pub use error::ClientError;
pub use poll::{poll_until, PollSchedule, PollState, Sleeper, TokioSleeper};
pub use types::{Citation, FileInfo, RemoteFile, SearchOutcome};
