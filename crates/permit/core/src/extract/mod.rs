//! Property extraction SPI.
//!
//! A [`PropertyExtractor`] reads named properties out of one kind of source
//! value. The [`PropertyExtractorRegistry`] picks the most specific extractor
//! for a source type and falls back to reflective accessor lookup.

mod json;
mod map;
mod reflective;
mod registry;

pub use json::JsonPropertyExtractor;
pub use map::MapPropertyExtractor;
pub use reflective::ReflectivePropertyExtractor;
pub use registry::PropertyExtractorRegistry;

use crate::value::{Value, ValueType};

/// Static feasibility of extracting a property from a source type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Ok,
    /// The source type cannot provide the property.
    Unavailable,
    /// The source type provides the property with an incompatible type.
    TypeMismatch,
}

/// Result of extracting one property from a source value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extraction {
    Found(Value),
    Absent,
    TypeMismatch,
}

/// Extracts properties from sources of one supported type.
pub trait PropertyExtractor: Send + Sync {
    /// Sources assignable to this type are handled by this extractor.
    fn supported_type(&self) -> ValueType;

    /// Check, before any source exists, whether `property` can be read with
    /// the `declared` type. Extractors that can only tell at extraction time
    /// report [`Validation::Ok`].
    fn validate(&self, _property: &str, _declared: &ValueType) -> Validation {
        Validation::Ok
    }

    /// Read `property` from `source`, converted to `declared`.
    fn extract(&self, source: &Value, property: &str, declared: &ValueType) -> Extraction;
}
