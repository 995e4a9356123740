//! Intent instances.
//!
//! An [`IntentData`] is the immutable record behind every intent: its type,
//! property map and bound principal. Only the engine can create one, so any
//! intent in hand has already passed every applicable access policy.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{ConfigurationError, ExtractionError, InvokeError, PermitError};
use crate::intent_type::{ClassifiedMethod, IntentType};
use crate::naming::NamingConvention;
use crate::principal::Principal;
use crate::role::{IdentityMethod, MethodRole};
use crate::value::{FromValue, Value};

/// The immutable record behind an intent instance.
#[derive(Clone)]
pub struct IntentData {
    inner: Arc<IntentInner>,
}

struct IntentInner {
    intent_type: Arc<IntentType>,
    values: BTreeMap<String, Value>,
    principal: Option<Principal>,
    naming: Arc<dyn NamingConvention>,
}

impl IntentData {
    pub fn intent_type(&self) -> &Arc<IntentType> {
        &self.inner.intent_type
    }

    /// The principal this intent was created for.
    pub fn principal(&self) -> Option<&Principal> {
        self.inner.principal.as_ref()
    }

    /// Read-only view of the property map, keyed by accessor name.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.inner.values
    }

    pub fn get(&self, method: &str) -> Option<&Value> {
        self.inner.values.get(method)
    }

    /// Read a property that must be present.
    pub fn read<T: FromValue>(&self, method: &str) -> Result<T, ExtractionError> {
        self.read_optional(method)?
            .ok_or_else(|| ExtractionError::MissingProperty {
                property: method.to_string(),
                source_value: self.to_string(),
            })
    }

    /// Read a property that may be absent.
    pub fn read_optional<T: FromValue>(&self, method: &str) -> Result<Option<T>, ExtractionError> {
        match self.get(method) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| ExtractionError::TypeMismatch {
                    property: method.to_string(),
                    source_value: value.to_string(),
                    expected: T::value_type().to_string(),
                }),
        }
    }

    /// Fail unless this intent is an instance of `expected`.
    pub fn ensure_instance_of(&self, expected: &IntentType) -> Result<(), ConfigurationError> {
        if self.inner.intent_type.is_subtype_of(expected) {
            Ok(())
        } else {
            Err(ConfigurationError::IncompatibleIntentType {
                actual: self.inner.intent_type.name().to_string(),
                expected: expected.name().to_string(),
            })
        }
    }

    /// Answer a declared method from the record.
    ///
    /// Property accessors return the stored value, falling back to the
    /// method's own body and then to `Null`. Non-property methods run their
    /// body.
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value, InvokeError> {
        let classified = self.inner.intent_type.method(method).ok_or_else(|| {
            InvokeError::NoSuchMethod {
                intent_type: self.inner.intent_type.name().to_string(),
                method: method.to_string(),
            }
        })?;
        if args.len() != classified.decl.params.len() {
            return Err(InvokeError::Arity {
                method: method.to_string(),
                expected: classified.decl.params.len(),
                actual: args.len(),
            });
        }

        Ok(match classified.role {
            MethodRole::Identity(IdentityMethod::Equals) => {
                Value::Bool(matches!(&args[0], Value::Intent(other) if other == self))
            }
            MethodRole::Identity(IdentityMethod::Hash) => {
                let mut hasher = DefaultHasher::new();
                self.hash(&mut hasher);
                Value::Int(hasher.finish() as i64)
            }
            MethodRole::Identity(IdentityMethod::ToString) => Value::Str(self.to_string()),
            MethodRole::AuthAccessor => self
                .principal()
                .cloned()
                .map(Value::Principal)
                .unwrap_or(Value::Null),
            MethodRole::DataMapAccessor => Value::Map(self.inner.values.clone()),
            MethodRole::RequiredProperty | MethodRole::OptionalProperty => match self.get(method) {
                Some(value) => value.clone(),
                None => self.run_body(classified, args),
            },
            MethodRole::NonProperty => self.run_body(classified, args),
        })
    }

    fn run_body(&self, method: &ClassifiedMethod, args: &[Value]) -> Value {
        match &method.decl.body {
            Some(body) => body(self, args),
            None => Value::Null,
        }
    }
}

impl PartialEq for IntentData {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.intent_type.id() == other.inner.intent_type.id()
                && self.inner.values == other.inner.values
                && self.inner.principal == other.inner.principal)
    }
}

impl Eq for IntentData {}

impl Hash for IntentData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.intent_type.id().hash(state);
        self.inner.values.hash(state);
        self.inner.principal.hash(state);
    }
}

impl fmt::Display for IntentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self
            .inner
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", self.inner.naming.normalize(k), v))
            .collect();
        entries.sort();
        write!(f, "{}[{}]", self.inner.intent_type.name(), entries.join(", "))
    }
}

impl fmt::Debug for IntentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentData")
            .field("intent_type", &self.inner.intent_type.name())
            .field("values", &self.inner.values)
            .field("principal", &self.inner.principal)
            .finish()
    }
}

/// Builds intent records. Reachable only through the permission engine.
#[derive(Clone)]
pub(crate) struct IntentSynthesizer {
    naming: Arc<dyn NamingConvention>,
}

impl IntentSynthesizer {
    pub(crate) fn new(naming: Arc<dyn NamingConvention>) -> Self {
        Self { naming }
    }

    pub(crate) fn build(
        &self,
        intent_type: Arc<IntentType>,
        values: BTreeMap<String, Value>,
        principal: Option<Principal>,
    ) -> IntentData {
        IntentData {
            inner: Arc::new(IntentInner {
                intent_type,
                values,
                principal,
                naming: self.naming.clone(),
            }),
        }
    }
}

/// A strongly-typed intent.
///
/// Implemented by the types generated with [`intent!`](crate::intent!).
/// Values can only be obtained from the permission engine, or by upcasting
/// another intent to one of its supertypes.
pub trait Intent: Sized + Send + Sync + 'static {
    /// Metadata for this intent type, derived once per process.
    fn intent_type() -> Result<Arc<IntentType>, ConfigurationError>;

    /// Wrap an engine-produced record. The record must be an instance of
    /// this intent type.
    #[doc(hidden)]
    fn from_data(data: IntentData) -> Result<Self, PermitError>;

    /// The record behind this intent.
    fn data(&self) -> &IntentData;

    /// The principal this intent was created for.
    fn __auth__(&self) -> Option<&Principal> {
        self.data().principal()
    }

    /// This intent's properties, keyed by accessor name.
    fn __data__(&self) -> &BTreeMap<String, Value> {
        self.data().values()
    }

    /// View this intent as one of its supertypes.
    fn upcast<S: Intent>(&self) -> Result<S, PermitError> {
        S::from_data(self.data().clone())
    }
}

/// Typed property values of a generated intent, read from its record.
#[doc(hidden)]
pub trait IntentFields: Intent {
    type Fields: Clone + Send + Sync + 'static;

    fn read_fields(data: &IntentData) -> Result<Self::Fields, PermitError>;
}

/// A record together with the typed values read from it.
///
/// The only way to obtain one is [`Sealed::new`], which reads the values
/// through [`IntentFields::read_fields`], so the two never disagree.
#[doc(hidden)]
pub struct Sealed<I: IntentFields> {
    data: IntentData,
    fields: I::Fields,
}

impl<I: IntentFields> Sealed<I> {
    pub fn new(data: IntentData) -> Result<Self, PermitError> {
        data.ensure_instance_of(&*I::intent_type()?)?;
        let fields = I::read_fields(&data)?;
        Ok(Self { data, fields })
    }

    pub fn data(&self) -> &IntentData {
        &self.data
    }

    pub fn fields(&self) -> &I::Fields {
        &self.fields
    }

    pub fn into_data(self) -> IntentData {
        self.data
    }
}

impl<I: IntentFields> Clone for Sealed<I> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            fields: self.fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent_type::IntentType;
    use crate::naming::PrefixNamingConvention;
    use crate::role::MethodDecl;
    use crate::value::ValueType;

    fn synthesizer() -> IntentSynthesizer {
        IntentSynthesizer::new(Arc::new(PrefixNamingConvention::default()))
    }

    fn order_type() -> Arc<IntentType> {
        IntentType::builder("Order")
            .required("get_quantity", ValueType::Int)
            .optional("note", ValueType::Str)
            .method(
                MethodDecl::property("priority", ValueType::Int)
                    .with_body(|intent, _| match intent.get("get_quantity") {
                        Some(Value::Int(q)) => Value::Int(q * 10),
                        _ => Value::Null,
                    }),
            )
            .method(MethodDecl::function(
                "scaled",
                vec![ValueType::Int],
                Some(ValueType::Int),
                |intent, args| match (intent.get("get_quantity"), &args[0]) {
                    (Some(Value::Int(q)), Value::Int(factor)) => Value::Int(q * factor),
                    _ => Value::Null,
                },
            ))
            .build()
            .unwrap()
    }

    fn order(quantity: i64, principal: Option<Principal>) -> IntentData {
        let mut values = BTreeMap::new();
        values.insert("get_quantity".to_string(), Value::Int(quantity));
        synthesizer().build(order_type_cached(), values, principal)
    }

    fn order_type_cached() -> Arc<IntentType> {
        use std::sync::OnceLock;
        static TYPE: OnceLock<Arc<IntentType>> = OnceLock::new();
        TYPE.get_or_init(order_type).clone()
    }

    #[test]
    fn property_accessors_answer_from_the_record() {
        let intent = order(3, None);
        assert_eq!(intent.invoke("get_quantity", &[]), Ok(Value::Int(3)));
        assert_eq!(intent.invoke("note", &[]), Ok(Value::Null));
        assert_eq!(intent.invoke("priority", &[]), Ok(Value::Int(30)));
        assert_eq!(intent.invoke("scaled", &[Value::Int(4)]), Ok(Value::Int(12)));
    }

    #[test]
    fn reserved_accessors() {
        let alice = Principal::new("alice");
        let intent = order(3, Some(alice.clone()));
        assert_eq!(intent.invoke("__auth__", &[]), Ok(Value::Principal(alice)));
        assert_eq!(
            intent.invoke("__data__", &[]),
            Ok(Value::map([("get_quantity", 3)]))
        );
    }

    #[test]
    fn identity_is_structural() {
        let a = order(3, Some(Principal::new("alice")));
        let b = order(3, Some(Principal::new("alice")));
        let c = order(3, Some(Principal::new("bob")));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.invoke("eq", &[Value::Intent(b.clone())]), Ok(Value::Bool(true)));
        assert_eq!(a.invoke("eq", &[Value::Int(3)]), Ok(Value::Bool(false)));
        assert_eq!(a.invoke("hash", &[]), b.invoke("hash", &[]));
    }

    #[test]
    fn display_uses_normalized_sorted_names() {
        let mut values = BTreeMap::new();
        values.insert("get_quantity".to_string(), Value::Int(3));
        values.insert("note".to_string(), Value::from("rush"));
        let intent = synthesizer().build(order_type_cached(), values, None);
        assert_eq!(intent.to_string(), "Order[note=rush, quantity=3]");
        assert_eq!(intent.invoke("to_string", &[]), Ok(Value::from("Order[note=rush, quantity=3]")));
    }

    #[test]
    fn dispatch_errors() {
        let intent = order(1, None);
        assert!(matches!(
            intent.invoke("missing", &[]),
            Err(InvokeError::NoSuchMethod { .. })
        ));
        assert!(matches!(
            intent.invoke("scaled", &[]),
            Err(InvokeError::Arity { expected: 1, actual: 0, .. })
        ));
    }

    #[test]
    fn typed_reads() {
        let intent = order(3, None);
        assert_eq!(intent.read::<i64>("get_quantity"), Ok(3));
        assert_eq!(intent.read_optional::<String>("note"), Ok(None));
        assert!(matches!(
            intent.read::<String>("get_quantity"),
            Err(ExtractionError::TypeMismatch { .. })
        ));
        assert!(matches!(
            intent.read::<String>("note"),
            Err(ExtractionError::MissingProperty { .. })
        ));
    }
}
