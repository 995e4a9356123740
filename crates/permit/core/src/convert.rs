//! The conversion capability used by the mono and reflective paths and the
//! built-in extractors.

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::engine::PermissionEngine;
use crate::error::ConversionError;
use crate::intent_type::IntentType;
use crate::value::{Value, ValueType};

/// Converts values between declared types.
pub trait ConversionService: Send + Sync {
    /// Static feasibility check; may be optimistic when the outcome depends
    /// on the runtime value.
    fn can_convert(&self, source: &ValueType, target: &ValueType) -> bool;

    fn convert(
        &self,
        value: Value,
        source: &ValueType,
        target: &ValueType,
    ) -> Result<Value, ConversionError>;
}

/// Conversions between the plain data types.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConversionService;

fn is_plain(ty: &ValueType) -> bool {
    !matches!(
        ty,
        ValueType::Object(_) | ValueType::Principal | ValueType::Intent(_)
    )
}

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, source: &ValueType, target: &ValueType) -> bool {
        use ValueType as T;
        if target.is_assignable_from(source) {
            return true;
        }
        match (source, target) {
            (_, T::Any) | (T::Any, _) | (T::Null, _) => true,
            (_, T::Optional(inner)) => self.can_convert(source, inner),
            (T::Optional(inner), _) => self.can_convert(inner, target),
            (T::Int, T::Float) | (T::Float, T::Int) => true,
            (T::Str, T::Int | T::Float | T::Bool) => true,
            (T::Bool | T::Int | T::Float, T::Str) => true,
            // document scalars are only checked by `convert`
            (T::Json, T::Map | T::List(_)) => true,
            (source, T::Json) => is_plain(source),
            (T::List(from), T::List(to)) => self.can_convert(from, to),
            _ => false,
        }
    }

    fn convert(
        &self,
        value: Value,
        source: &ValueType,
        target: &ValueType,
    ) -> Result<Value, ConversionError> {
        use ValueType as T;
        if value.is_null() {
            return Ok(Value::Null);
        }
        if matches!(source, T::Any | T::Optional(_)) {
            let runtime = value.value_type();
            return self.convert(value, &runtime, target);
        }
        if target.is_assignable_from(source) || matches!(target, T::Any) {
            return Ok(value);
        }
        if let T::Optional(inner) = target {
            return self.convert(value, source, inner);
        }

        let invalid = |value: &Value, reason: &str| ConversionError::Invalid {
            value: value.to_string(),
            to: target.to_string(),
            reason: reason.to_string(),
        };

        match (value, target) {
            (Value::Int(i), T::Float) => Ok(Value::Float(i as f64)),
            (Value::Float(x), T::Int) => {
                if x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 {
                    Ok(Value::Int(x as i64))
                } else {
                    Err(invalid(&Value::Float(x), "not an integral number"))
                }
            }
            (Value::Str(s), T::Int) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| invalid(&Value::Str(s.clone()), &e.to_string())),
            (Value::Str(s), T::Float) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| invalid(&Value::Str(s.clone()), &e.to_string())),
            (Value::Str(s), T::Bool) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid(&Value::Str(s.clone()), "expected true or false")),
            },
            (v @ (Value::Bool(_) | Value::Int(_) | Value::Float(_)), T::Str) => {
                Ok(Value::Str(v.to_string()))
            }
            (Value::Json(json), target) if is_plain(target) => {
                let lifted = Value::from_json(json);
                let runtime = lifted.value_type();
                self.convert(lifted, &runtime, target)
            }
            (v, T::Json) => v
                .to_json()
                .map(Value::Json)
                .ok_or_else(|| invalid(&v, "value has no JSON form")),
            (Value::List(items), T::List(element)) => items
                .into_iter()
                .map(|item| {
                    let runtime = item.value_type();
                    self.convert(item, &runtime, element)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (v, target) => Err(ConversionError::Unsupported {
                from: v.value_type().to_string(),
                to: target.to_string(),
            }),
        }
    }
}

fn intent_target(target: &ValueType) -> Option<&Arc<IntentType>> {
    match target {
        ValueType::Intent(intent_type) => Some(intent_type),
        ValueType::Optional(inner) => intent_target(inner),
        _ => None,
    }
}

/// Conversion service of a built engine.
///
/// Targets that are intent types are produced by the engine itself, so any
/// valid source converts into an intent after its policies ran, and intent
/// typed properties can be read from nested sources. Every other conversion
/// goes to the wrapped service.
pub(crate) struct IntentConverter {
    engine: Weak<PermissionEngine>,
    delegate: Arc<dyn ConversionService>,
}

impl IntentConverter {
    pub(crate) fn new(engine: Weak<PermissionEngine>, delegate: Arc<dyn ConversionService>) -> Self {
        Self { engine, delegate }
    }
}

impl ConversionService for IntentConverter {
    fn can_convert(&self, source: &ValueType, target: &ValueType) -> bool {
        match intent_target(target) {
            Some(intent_type) if !self.delegate.can_convert(source, target) => self
                .engine
                .upgrade()
                .is_some_and(|engine| engine.is_source_for(source, intent_type)),
            _ => self.delegate.can_convert(source, target),
        }
    }

    fn convert(
        &self,
        value: Value,
        source: &ValueType,
        target: &ValueType,
    ) -> Result<Value, ConversionError> {
        let Some(intent_type) = intent_target(target) else {
            return self.delegate.convert(value, source, target);
        };
        if value.is_null() {
            return Ok(Value::Null);
        }
        let runtime = value.value_type();
        if ValueType::intent(intent_type.clone()).is_assignable_from(&runtime) {
            return Ok(value);
        }
        let engine = self.engine.upgrade().ok_or_else(|| ConversionError::Unsupported {
            from: runtime.to_string(),
            to: target.to_string(),
        })?;

        let shown = value.to_string();
        engine
            .require_dyn(value, intent_type)
            .map(Value::Intent)
            .map_err(|e| {
                debug!(intent_type = %intent_type.name(), error = %e, "Intent conversion failed");
                ConversionError::Invalid {
                    value: shown,
                    to: target.to_string(),
                    reason: e.to_string(),
                }
            })
    }
}
