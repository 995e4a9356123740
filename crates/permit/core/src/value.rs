//! Dynamic values and their types.
//!
//! Sources handed to the engine, extracted property values, and the
//! arguments of dynamic dispatch are all [`Value`]s. Every value has a
//! runtime [`ValueType`]; declared property types are `ValueType`s too.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::intent::IntentData;
use crate::intent_type::IntentType;
use crate::principal::Principal;
use crate::reflect::{ObjectShape, Reflect};

/// A dynamically-typed value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Json(serde_json::Value),
    Object(Arc<dyn Reflect>),
    Principal(Principal),
    Intent(IntentData),
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wrap a reflective object.
    pub fn object(object: impl Reflect + 'static) -> Self {
        Value::Object(Arc::new(object))
    }

    /// The runtime type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::List(_) => ValueType::List(Box::new(ValueType::Any)),
            Value::Map(_) => ValueType::Map,
            Value::Json(_) => ValueType::Json,
            Value::Object(object) => ValueType::Object(object.shape()),
            Value::Principal(_) => ValueType::Principal,
            Value::Intent(intent) => ValueType::Intent(intent.intent_type().clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Lift a JSON document into plain values.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(members) => Value::Map(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Lower plain data into a JSON document.
    ///
    /// Objects, principals and intents have no JSON form.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Option<Vec<_>>>()?,
            ),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            Value::Json(json) => json.clone(),
            Value::Object(_) | Value::Principal(_) | Value::Intent(_) => return None,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Value::Principal(a), Value::Principal(b)) => a == b,
            (Value::Intent(a), Value::Intent(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::List(items) => items.hash(state),
            Value::Map(entries) => entries.hash(state),
            Value::Json(json) => json.to_string().hash(state),
            Value::Object(object) => (Arc::as_ptr(object) as *const () as usize).hash(state),
            Value::Principal(p) => p.hash(state),
            Value::Intent(intent) => intent.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
            Value::Json(json) => write!(f, "{json}"),
            Value::Object(object) => write!(f, "{object:?}"),
            Value::Principal(p) => write!(f, "{p}"),
            Value::Intent(intent) => write!(f, "{intent}"),
        }
    }
}

/// A declared or runtime value type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Null,
    Bool,
    Int,
    Float,
    Str,
    List(Box<ValueType>),
    Map,
    Json,
    Object(Arc<ObjectShape>),
    Principal,
    Intent(Arc<IntentType>),
    /// A value that may be absent; absence is represented by omission.
    Optional(Box<ValueType>),
}

impl ValueType {
    pub fn list(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    pub fn optional(inner: ValueType) -> Self {
        ValueType::Optional(Box::new(inner))
    }

    pub fn intent(intent_type: Arc<IntentType>) -> Self {
        ValueType::Intent(intent_type)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, ValueType::Optional(_))
    }

    /// Direct supertypes. `Any` has none.
    pub fn supertypes(&self) -> Vec<ValueType> {
        match self {
            ValueType::Any => vec![],
            ValueType::Object(shape) if !shape.supertypes().is_empty() => shape
                .supertypes()
                .iter()
                .cloned()
                .map(ValueType::Object)
                .collect(),
            ValueType::Intent(intent_type) if !intent_type.supertypes().is_empty() => intent_type
                .supertypes()
                .iter()
                .cloned()
                .map(ValueType::Intent)
                .collect(),
            ValueType::List(element) if **element != ValueType::Any => {
                vec![ValueType::list(ValueType::Any)]
            }
            _ => vec![ValueType::Any],
        }
    }

    /// Inheritance depth: 0 for `Any`, otherwise one more than the deepest supertype.
    pub fn depth(&self) -> usize {
        self.supertypes()
            .iter()
            .map(|s| s.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// True if a value of type `other` is also a value of this type.
    pub fn is_assignable_from(&self, other: &ValueType) -> bool {
        self == other
            || other
                .supertypes()
                .iter()
                .any(|s| self.is_assignable_from(s))
    }

    /// True if `value` may be stored under this declared type. List
    /// elements are checked one by one; `Null` only fits optional types.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Any, _) => true,
            (ValueType::Optional(_), Value::Null) => true,
            (ValueType::Optional(inner), value) => inner.admits(value),
            (ValueType::List(element), Value::List(items)) => {
                items.iter().all(|item| element.admits(item))
            }
            (declared, value) => declared.is_assignable_from(&value.value_type()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Null => write!(f, "null"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Str => write!(f, "string"),
            ValueType::List(element) => write!(f, "list<{element}>"),
            ValueType::Map => write!(f, "map"),
            ValueType::Json => write!(f, "json"),
            ValueType::Object(shape) => write!(f, "{}", shape.name()),
            ValueType::Principal => write!(f, "principal"),
            ValueType::Intent(intent_type) => write!(f, "{}", intent_type.name()),
            ValueType::Optional(inner) => write!(f, "optional<{inner}>"),
        }
    }
}

/// Rust types that can be read back out of a [`Value`].
pub trait FromValue: Sized {
    /// The declared type this Rust type maps to.
    fn value_type() -> ValueType;

    /// The type recorded when this Rust type declares an intent property.
    /// Fails only for types whose own metadata cannot be built.
    fn declared_type() -> Result<ValueType, ConfigurationError> {
        Ok(Self::value_type())
    }

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn value_type() -> ValueType {
        ValueType::Str
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::list(T::value_type())
    }

    fn declared_type() -> Result<ValueType, ConfigurationError> {
        Ok(ValueType::list(T::declared_type()?))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl FromValue for BTreeMap<String, Value> {
    fn value_type() -> ValueType {
        ValueType::Map
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map(entries) => Some(entries.clone()),
            _ => None,
        }
    }
}

impl FromValue for serde_json::Value {
    fn value_type() -> ValueType {
        ValueType::Json
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Json(json) => Some(json.clone()),
            _ => None,
        }
    }
}

impl FromValue for Principal {
    fn value_type() -> ValueType {
        ValueType::Principal
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Principal(p) => Some(p.clone()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

impl From<Principal> for Value {
    fn from(p: Principal) -> Self {
        Value::Principal(p)
    }
}

impl From<IntentData> for Value {
    fn from(intent: IntentData) -> Self {
        Value::Intent(intent)
    }
}
