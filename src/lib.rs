//! Email normalization and meeting extraction.
//!
//! The core is two pure components: [`normalizer::Normalizer`] turns raw
//! bodies into canonical text and [`extractor::MeetingExtractor`] finds a
//! meeting slot in that text. [`pipeline::Pipeline`] runs them over batches
//! and talks to calendar and notification collaborators.

pub mod collaborators;
pub mod error;
pub mod extractor;
pub mod intent;
pub mod json_store;
pub mod mime;
pub mod normalizer;
pub mod notification;
pub mod pipeline;
pub mod state;
pub mod thread;
pub mod types;

pub use error::{CollaboratorError, ConfigError, CoreError};
pub use extractor::{extract_meeting, MeetingExtractor};
pub use normalizer::{normalize, Normalizer};
pub use types::{Config, MeetingCandidate, ProcessedEmail, RawEmail};
