//! Intent type metadata, derived once per declared intent type.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::role::{base_methods, MethodDecl, MethodRole, MethodRoleClassifier};
use crate::value::ValueType;

static NEXT_INTENT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an intent type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntentTypeId(u64);

impl fmt::Display for IntentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent-type-{}", self.0)
    }
}

/// A declared method together with its classified role.
#[derive(Clone, Debug)]
pub struct ClassifiedMethod {
    pub decl: MethodDecl,
    pub role: MethodRole,
}

/// A property declared by an intent type, before name normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertySpec {
    /// Accessor name; the key in the intent's property map.
    pub method: String,
    pub declared: ValueType,
    pub optional: bool,
}

/// Metadata for one intent type: its classified methods, inherited ones
/// included, and its place in the intent type hierarchy.
pub struct IntentType {
    id: IntentTypeId,
    name: String,
    supertypes: Vec<Arc<IntentType>>,
    methods: BTreeMap<String, ClassifiedMethod>,
    depth: usize,
}

impl IntentType {
    pub fn builder(name: impl Into<String>) -> IntentTypeBuilder {
        IntentTypeBuilder {
            name: name.into(),
            supertypes: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn id(&self) -> IntentTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> &[Arc<IntentType>] {
        &self.supertypes
    }

    /// 0 for a type with no supertypes, else one more than the deepest supertype.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn method(&self, name: &str) -> Option<&ClassifiedMethod> {
        self.methods.get(name)
    }

    /// All methods, ordered by name.
    pub fn methods(&self) -> impl Iterator<Item = &ClassifiedMethod> {
        self.methods.values()
    }

    /// Required and optional properties, ordered by accessor name.
    pub fn properties(&self) -> Vec<PropertySpec> {
        self.methods
            .values()
            .filter(|m| m.role.is_property())
            .filter_map(|m| {
                m.decl.returns.clone().map(|declared| PropertySpec {
                    method: m.decl.name.clone(),
                    declared,
                    optional: m.role == MethodRole::OptionalProperty,
                })
            })
            .collect()
    }

    /// True if this type is `other` or inherits from it.
    pub fn is_subtype_of(&self, other: &IntentType) -> bool {
        self.id == other.id || self.supertypes.iter().any(|s| s.is_subtype_of(other))
    }
}

impl PartialEq for IntentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IntentType {}

impl Hash for IntentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field(
                "supertypes",
                &self.supertypes.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("depth", &self.depth)
            .finish()
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub struct IntentTypeBuilder {
    name: String,
    supertypes: Vec<Arc<IntentType>>,
    methods: Vec<MethodDecl>,
}

impl IntentTypeBuilder {
    pub fn extends(mut self, parent: Arc<IntentType>) -> Self {
        self.supertypes.push(parent);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// Shorthand for an abstract property of the given type.
    pub fn required(self, name: impl Into<String>, declared: ValueType) -> Self {
        self.method(MethodDecl::property(name, declared))
    }

    /// Shorthand for a property of optional type.
    pub fn optional(self, name: impl Into<String>, inner: ValueType) -> Self {
        self.method(MethodDecl::property(name, ValueType::optional(inner)))
    }

    /// Classify every method and freeze the type.
    ///
    /// Own declarations override inherited ones with the same name.
    pub fn build(self) -> Result<Arc<IntentType>, ConfigurationError> {
        let mut declared: BTreeMap<String, MethodDecl> = BTreeMap::new();
        for method in base_methods() {
            declared.insert(method.name.clone(), method);
        }
        for parent in &self.supertypes {
            for inherited in parent.methods() {
                declared.insert(inherited.decl.name.clone(), inherited.decl.clone());
            }
        }
        for method in self.methods {
            declared.insert(method.name.clone(), method);
        }

        let classifier = MethodRoleClassifier;
        let mut methods = BTreeMap::new();
        for (name, decl) in declared {
            let role = classifier
                .classify(&decl)
                .map_err(|reason| ConfigurationError::InvalidMethod {
                    intent_type: self.name.clone(),
                    method: name.clone(),
                    reason,
                })?;
            methods.insert(name, ClassifiedMethod { decl, role });
        }

        let depth = self
            .supertypes
            .iter()
            .map(|s| s.depth() + 1)
            .max()
            .unwrap_or(0);

        Ok(Arc::new(IntentType {
            id: IntentTypeId(NEXT_INTENT_TYPE_ID.fetch_add(1, Ordering::Relaxed)),
            name: self.name,
            supertypes: self.supertypes,
            methods,
            depth,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MethodShapeError;
    use crate::value::Value;

    #[test]
    fn properties_include_inherited_ones_sorted_by_name() {
        let resource = IntentType::builder("Resource")
            .required("owner", ValueType::Str)
            .build()
            .unwrap();
        let order = IntentType::builder("Order")
            .extends(resource.clone())
            .required("quantity", ValueType::Int)
            .optional("note", ValueType::Str)
            .build()
            .unwrap();

        let names: Vec<_> = order.properties().into_iter().map(|p| p.method).collect();
        assert_eq!(names, vec!["note", "owner", "quantity"]);
        assert_eq!(resource.depth(), 0);
        assert_eq!(order.depth(), 1);
        assert!(order.is_subtype_of(&resource));
        assert!(!resource.is_subtype_of(&order));
    }

    #[test]
    fn redeclaration_overrides_inherited_method() {
        let base = IntentType::builder("Base")
            .required("priority", ValueType::Int)
            .build()
            .unwrap();
        let child = IntentType::builder("Child")
            .extends(base)
            .method(MethodDecl::property("priority", ValueType::Int).with_body(|_, _| Value::Int(5)))
            .build()
            .unwrap();

        let priority = child.properties().into_iter().find(|p| p.method == "priority").unwrap();
        assert!(priority.optional);
    }

    #[test]
    fn invalid_method_is_a_configuration_error() {
        let result = IntentType::builder("Broken")
            .method(MethodDecl::property("__secret__", ValueType::Str))
            .build();
        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::InvalidMethod {
                intent_type: "Broken".into(),
                method: "__secret__".into(),
                reason: MethodShapeError::UnknownReservedName,
            }
        );
    }

    #[test]
    fn depth_uses_deepest_supertype() {
        let a = IntentType::builder("A").build().unwrap();
        let b = IntentType::builder("B").extends(a.clone()).build().unwrap();
        let c = IntentType::builder("C").extends(a).extends(b).build().unwrap();
        assert_eq!(c.depth(), 2);
    }
}
