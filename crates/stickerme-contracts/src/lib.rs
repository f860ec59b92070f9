//! Pure request-side types for StickerMe: preset tables, the generation request,
//! the parameter resolver and its validation errors, plus the audit event log.

pub mod error;
pub mod events;
pub mod presets;
pub mod request;
pub mod resolver;

pub use error::ValidationError;
pub use events::{AuditEvent, EventWriter};
pub use presets::{list_presets, lookup, quality_matching, PresetDefinition, PresetFamily, PresetListing};
pub use request::{
    AppliedPresets, GenerationRequest, ParameterField, ParameterOverrides, ParameterRange,
    ResolvedParameters,
};
pub use resolver::{GenerationDefaults, ParameterResolver};
