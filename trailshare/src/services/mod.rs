//! Outbound collaborators, each behind a trait so tests can swap in fakes.

pub mod geocoding;
pub mod llm;
pub mod mailer;
pub mod scoring;
pub mod storage;

pub use geocoding::{Coordinates, DisabledGeocoder, GeocodeError, Geocoder, MapboxGeocoder};
pub use llm::{AnthropicClient, LlmError};
pub use mailer::{Email, LogMailer, MailError, Mailer, ResendMailer, notify};
pub use scoring::{
    Candidate, KeywordScorer, LlmRelevanceScorer, RelevanceScorer, ScoringError, query_terms,
};
pub use storage::{LocalObjectStore, ObjectStore, StorageError};
