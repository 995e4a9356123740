//! Method declarations on intent types and their classification into roles.

use std::fmt;
use std::sync::Arc;

use crate::error::MethodShapeError;
use crate::intent::IntentData;
use crate::value::{Value, ValueType};

/// Name of the reserved principal accessor.
pub const AUTH_ACCESSOR: &str = "__auth__";

/// Name of the reserved property-map accessor.
pub const DATA_ACCESSOR: &str = "__data__";

/// A method body evaluated against the intent it is invoked on.
pub type MethodBody = Arc<dyn Fn(&IntentData, &[Value]) -> Value + Send + Sync>;

/// One method of an intent type's declared capability set.
#[derive(Clone)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<ValueType>,
    /// `None` for methods returning nothing.
    pub returns: Option<ValueType>,
    /// `None` for abstract methods.
    pub body: Option<MethodBody>,
    /// Excludes a zero-argument method from being treated as a property.
    pub not_property: bool,
}

impl MethodDecl {
    /// An abstract zero-argument method returning `returns`.
    pub fn property(name: impl Into<String>, returns: ValueType) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Some(returns),
            body: None,
            not_property: false,
        }
    }

    /// A method with parameters and a body.
    pub fn function(
        name: impl Into<String>,
        params: Vec<ValueType>,
        returns: Option<ValueType>,
        body: impl Fn(&IntentData, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            body: Some(Arc::new(body)),
            not_property: false,
        }
    }

    pub fn with_body(
        mut self,
        body: impl Fn(&IntentData, &[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn not_property(mut self) -> Self {
        self.not_property = true;
        self
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("has_body", &self.body.is_some())
            .field("not_property", &self.not_property)
            .finish()
    }
}

/// Structural methods every intent answers itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityMethod {
    Equals,
    Hash,
    ToString,
}

/// The role a declared method plays on a synthesized intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodRole {
    Identity(IdentityMethod),
    AuthAccessor,
    DataMapAccessor,
    RequiredProperty,
    OptionalProperty,
    NonProperty,
}

impl MethodRole {
    pub fn is_property(&self) -> bool {
        matches!(self, MethodRole::RequiredProperty | MethodRole::OptionalProperty)
    }
}

/// Classifies intent type methods. Pure and exhaustive.
#[derive(Clone, Copy, Debug, Default)]
pub struct MethodRoleClassifier;

impl MethodRoleClassifier {
    pub fn classify(&self, method: &MethodDecl) -> Result<MethodRole, MethodShapeError> {
        if let Some(identity) = identity_method(method) {
            return Ok(MethodRole::Identity(identity));
        }
        if is_reserved(&method.name) {
            if !method.params.is_empty() {
                return Err(match method.name.as_str() {
                    AUTH_ACCESSOR | DATA_ACCESSOR => MethodShapeError::ReservedNameWithArguments,
                    _ => MethodShapeError::UnknownReservedName,
                });
            }
            return match method.name.as_str() {
                AUTH_ACCESSOR => Ok(MethodRole::AuthAccessor),
                DATA_ACCESSOR => Ok(MethodRole::DataMapAccessor),
                _ => Err(MethodShapeError::UnknownReservedName),
            };
        }
        if method.params.is_empty() && !method.not_property {
            if let Some(returns) = &method.returns {
                return Ok(if method.body.is_some() || returns.is_optional() {
                    MethodRole::OptionalProperty
                } else {
                    MethodRole::RequiredProperty
                });
            }
        }
        match (&method.body, method.params.is_empty()) {
            (Some(_), _) => Ok(MethodRole::NonProperty),
            (None, true) => Err(MethodShapeError::AbstractProperty),
            (None, false) => Err(MethodShapeError::AbstractNonProperty),
        }
    }
}

/// Exactly two leading and two trailing underscores.
fn is_reserved(name: &str) -> bool {
    name.len() >= 4 && name.starts_with("__") && name.ends_with("__")
}

fn identity_method(method: &MethodDecl) -> Option<IdentityMethod> {
    match (
        method.name.as_str(),
        method.params.as_slice(),
        method.returns.as_ref(),
    ) {
        ("eq", [ValueType::Any], Some(ValueType::Bool)) => Some(IdentityMethod::Equals),
        ("hash", [], Some(ValueType::Int)) => Some(IdentityMethod::Hash),
        ("to_string", [], Some(ValueType::Str)) => Some(IdentityMethod::ToString),
        _ => None,
    }
}

/// The methods every intent type inherits.
pub(crate) fn base_methods() -> Vec<MethodDecl> {
    vec![
        MethodDecl {
            name: "eq".into(),
            params: vec![ValueType::Any],
            returns: Some(ValueType::Bool),
            body: None,
            not_property: false,
        },
        MethodDecl {
            name: "hash".into(),
            params: vec![],
            returns: Some(ValueType::Int),
            body: None,
            not_property: false,
        },
        MethodDecl {
            name: "to_string".into(),
            params: vec![],
            returns: Some(ValueType::Str),
            body: None,
            not_property: false,
        },
        MethodDecl::property(AUTH_ACCESSOR, ValueType::optional(ValueType::Principal)).not_property(),
        MethodDecl::property(DATA_ACCESSOR, ValueType::Map).not_property(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(method: MethodDecl) -> Result<MethodRole, MethodShapeError> {
        MethodRoleClassifier.classify(&method)
    }

    #[test]
    fn base_methods_classify() {
        let roles: Vec<_> = base_methods()
            .iter()
            .map(|m| MethodRoleClassifier.classify(m))
            .collect();
        assert_eq!(
            roles,
            vec![
                Ok(MethodRole::Identity(IdentityMethod::Equals)),
                Ok(MethodRole::Identity(IdentityMethod::Hash)),
                Ok(MethodRole::Identity(IdentityMethod::ToString)),
                Ok(MethodRole::AuthAccessor),
                Ok(MethodRole::DataMapAccessor),
            ]
        );
    }

    #[test]
    fn properties() {
        assert_eq!(
            classify(MethodDecl::property("quantity", ValueType::Int)),
            Ok(MethodRole::RequiredProperty)
        );
        assert_eq!(
            classify(MethodDecl::property("note", ValueType::optional(ValueType::Str))),
            Ok(MethodRole::OptionalProperty)
        );
        assert_eq!(
            classify(MethodDecl::property("priority", ValueType::Int).with_body(|_, _| Value::Int(1))),
            Ok(MethodRole::OptionalProperty)
        );
    }

    #[test]
    fn non_properties() {
        let with_args = MethodDecl::function("scaled", vec![ValueType::Int], Some(ValueType::Int), |_, _| Value::Null);
        assert_eq!(classify(with_args), Ok(MethodRole::NonProperty));

        let void = MethodDecl::function("touch", vec![], None, |_, _| Value::Null);
        assert_eq!(classify(void), Ok(MethodRole::NonProperty));

        let excluded = MethodDecl::property("summary", ValueType::Str)
            .with_body(|_, _| Value::Null)
            .not_property();
        assert_eq!(classify(excluded), Ok(MethodRole::NonProperty));
    }

    #[test]
    fn invalid_shapes() {
        let abstract_void = MethodDecl {
            name: "void_method".into(),
            params: vec![],
            returns: None,
            body: None,
            not_property: false,
        };
        assert_eq!(classify(abstract_void), Err(MethodShapeError::AbstractProperty));

        let abstract_with_args = MethodDecl {
            name: "lookup".into(),
            params: vec![ValueType::Any],
            returns: Some(ValueType::Any),
            body: None,
            not_property: false,
        };
        assert_eq!(classify(abstract_with_args), Err(MethodShapeError::AbstractNonProperty));

        let mut auth_with_args = MethodDecl::property(AUTH_ACCESSOR, ValueType::Any);
        auth_with_args.params.push(ValueType::Any);
        assert_eq!(classify(auth_with_args), Err(MethodShapeError::ReservedNameWithArguments));

        assert_eq!(
            classify(MethodDecl::property("__unknown__", ValueType::Any)),
            Err(MethodShapeError::UnknownReservedName)
        );

        let excluded_abstract = MethodDecl::property("summary", ValueType::Str).not_property();
        assert_eq!(classify(excluded_abstract), Err(MethodShapeError::AbstractProperty));
    }
}
