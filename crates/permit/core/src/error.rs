use std::error::Error as StdError;

use thiserror::Error;

/// Boxed application error carried by a denial.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by the permission engine entry points.
#[derive(Debug, Error)]
pub enum PermitError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Denied(#[from] DenialError),
}

impl PermitError {
    /// True when this error is an access-policy denial.
    pub fn is_denial(&self) -> bool {
        matches!(self, PermitError::Denied(_))
    }

    /// The denial, if this error is one.
    pub fn as_denial(&self) -> Option<&DenialError> {
        match self {
            PermitError::Denied(denial) => Some(denial),
            _ => None,
        }
    }
}

/// Fatal, never-retried errors in intent declarations or engine setup.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("invalid intent type method '{intent_type}::{method}': {reason}")]
    InvalidMethod {
        intent_type: String,
        method: String,
        reason: MethodShapeError,
    },

    #[error("{source_type} is not a valid source for {intent_type}")]
    InvalidSource {
        source_type: String,
        intent_type: String,
    },

    #[error(
        "ambiguous policy order: {policy} and {existing} both target {intent_type} at depth {depth}"
    )]
    AmbiguousPolicyOrder {
        intent_type: String,
        policy: String,
        existing: String,
        depth: usize,
    },

    #[error("{actual} is not a subtype of {expected}")]
    IncompatibleIntentType { actual: String, expected: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a method declaration cannot appear on an intent type.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MethodShapeError {
    #[error("reserved method name is not one of __auth__ or __data__")]
    UnknownReservedName,

    #[error("reserved method must not take arguments")]
    ReservedNameWithArguments,

    #[error("zero-argument method without a body cannot be classified")]
    AbstractProperty,

    #[error("non-property method must provide a body")]
    AbstractNonProperty,
}

/// Per-call failures while extracting an intent's properties from a source.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("couldn't find a value for '{property}' in {source_value}")]
    MissingProperty {
        property: String,
        source_value: String,
    },

    #[error("value for '{property}' in {source_value} is not the correct type (expected {expected})")]
    TypeMismatch {
        property: String,
        source_value: String,
        expected: String,
    },
}

/// An access policy refused to let an intent exist.
///
/// Carries the application-chosen error produced by the policy's denial.
#[derive(Debug, Error)]
#[error("{intent_type} denied by {policy}: {source}")]
pub struct DenialError {
    policy: String,
    intent_type: String,
    source: BoxError,
}

impl DenialError {
    pub(crate) fn new(policy: impl Into<String>, intent_type: impl Into<String>, source: BoxError) -> Self {
        Self {
            policy: policy.into(),
            intent_type: intent_type.into(),
            source,
        }
    }

    /// Name of the policy that denied the intent.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Name of the intent type that was denied.
    pub fn intent_type(&self) -> &str {
        &self.intent_type
    }

    /// The application error produced by the denial.
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Recover the application error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    /// Take ownership of the application error.
    pub fn into_error(self) -> BoxError {
        self.source
    }
}

/// A value could not be converted between two types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("no conversion from {from} to {to}")]
    Unsupported { from: String, to: String },

    #[error("cannot convert {value} to {to}: {reason}")]
    Invalid {
        value: String,
        to: String,
        reason: String,
    },
}

/// Dynamic dispatch against an intent instance failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("{intent_type} declares no method '{method}'")]
    NoSuchMethod { intent_type: String, method: String },

    #[error("method '{method}' takes {expected} argument(s), got {actual}")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },
}
