//! # permit-core
//!
//! Statically-checked permissions. An *intent* is a strongly-typed view of
//! some source value (a map, a JSON document, a reflective object, a plain
//! scalar) bound to the principal it was created for. Intents can only be
//! obtained from the [`PermissionEngine`], which runs every applicable access
//! policy first, so code that accepts an intent type knows its permission
//! checks have already passed.
//!
//! ## Core Components
//!
//! - **MethodRoleClassifier** — Classifies the methods of an intent type into roles
//! - **PropertyExtractorRegistry** — Pluggable per-source-type property extraction
//!   with a reflective fallback
//! - **ExtractorFactory** — Validated, cached extraction plans per
//!   (source type, intent type)
//! - **AccessPolicyRegistry** — Policies ordered from the most general intent
//!   type to the most specific
//! - **IntentSynthesizer** — Immutable intent records answering every declared method
//! - **PermissionEngine** — `require` / `request` orchestration
//!
//! ## Declaring intents
//!
//! Typed intents are declared with [`intent!`]; intent types can also be
//! assembled at runtime with [`IntentType::builder`] and used through the
//! engine's `*_dyn` entry points.

pub mod cache;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod extract;
pub mod factory;
pub mod intent;
pub mod intent_type;
mod macros;
pub mod naming;
pub mod plan;
pub mod policy;
pub mod principal;
pub mod reflect;
pub mod role;
pub mod value;

pub use cache::AppendOnlyCache;
pub use config::{EqualDepthOrder, PermitConfig};
pub use convert::{ConversionService, DefaultConversionService};
pub use engine::{Outcome, PermissionEngine, PermissionEngineBuilder, Stage};
pub use error::{
    BoxError, ConfigurationError, ConversionError, DenialError, ExtractionError, InvokeError,
    MethodShapeError, PermitError,
};
pub use extract::{
    Extraction, JsonPropertyExtractor, MapPropertyExtractor, PropertyExtractor,
    PropertyExtractorRegistry, ReflectivePropertyExtractor, Validation,
};
pub use factory::IntentFactory;
pub use intent::{Intent, IntentData};
pub use intent_type::{ClassifiedMethod, IntentType, IntentTypeBuilder, IntentTypeId, PropertySpec};
pub use naming::{NamingConvention, PrefixNamingConvention};
pub use plan::{Extractor, ExtractorFactory, Property};
pub use policy::{AccessPolicy, AccessPolicyRegistry, Denial, RegisteredPolicy};
pub use principal::{Principal, PrincipalContext, PrincipalScope, ThreadLocalPrincipalContext};
pub use reflect::{AccessorShape, ObjectShape, ObjectShapeBuilder, Reflect};
pub use role::{
    IdentityMethod, MethodBody, MethodDecl, MethodRole, MethodRoleClassifier, AUTH_ACCESSOR,
    DATA_ACCESSOR,
};
pub use value::{FromValue, Value, ValueType};
