//! Generation and delivery pipeline for StickerMe.
//!
//! `Dispatcher::handle` resolves a request, submits it to an [`ImageGenerator`],
//! persists the bytes through the [`ArtifactStore`] and composes the reply.

pub mod compose;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod generator;
pub mod stability;
pub mod store;

pub use compose::{ArtifactRef, PresentationPayload, ResponseComposer, RetrievalAction, SummaryField};
pub use config::{ApiKey, ConfigError, EngineConfig};
pub use dispatch::Dispatcher;
pub use error::{DispatchError, GenerationError, StorageError};
pub use generator::{DryrunGenerator, ImageBytes, ImageGenerator};
pub use stability::StabilityClient;
pub use store::{ArtifactStore, GeneratedArtifact};
