//! Reflective source objects.
//!
//! Rust has no runtime reflection, so a source type that wants to be
//! readable by the reflective fallback extractor describes itself with an
//! [`ObjectShape`]: its name, declared supertypes and zero-argument
//! accessors. Shapes are built once and shared behind an `Arc`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::value::{Value, ValueType};

/// A type whose values expose named zero-argument accessors.
pub trait Reflect: fmt::Debug + Send + Sync {
    /// The static shape of this value's type.
    fn shape(&self) -> Arc<ObjectShape>;

    /// Invoke the accessor with the given name.
    ///
    /// Returns `None` when no such accessor exists.
    fn get(&self, accessor: &str) -> Option<Value>;
}

/// A zero-argument accessor on a reflective type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessorShape {
    pub name: String,
    pub returns: ValueType,
}

/// Static description of a reflective type. Identity is the type name.
#[derive(Debug)]
pub struct ObjectShape {
    name: String,
    supertypes: Vec<Arc<ObjectShape>>,
    accessors: Vec<AccessorShape>,
}

impl ObjectShape {
    pub fn builder(name: impl Into<String>) -> ObjectShapeBuilder {
        ObjectShapeBuilder {
            name: name.into(),
            supertypes: Vec::new(),
            accessors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> &[Arc<ObjectShape>] {
        &self.supertypes
    }

    /// Accessors declared on this type and inherited from its supertypes.
    pub fn accessors(&self) -> Vec<&AccessorShape> {
        let mut all: Vec<&AccessorShape> = self.accessors.iter().collect();
        for parent in &self.supertypes {
            for inherited in parent.accessors() {
                if !all.iter().any(|a| a.name == inherited.name) {
                    all.push(inherited);
                }
            }
        }
        all
    }
}

impl PartialEq for ObjectShape {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ObjectShape {}

impl Hash for ObjectShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

pub struct ObjectShapeBuilder {
    name: String,
    supertypes: Vec<Arc<ObjectShape>>,
    accessors: Vec<AccessorShape>,
}

impl ObjectShapeBuilder {
    pub fn extends(mut self, parent: Arc<ObjectShape>) -> Self {
        self.supertypes.push(parent);
        self
    }

    pub fn accessor(mut self, name: impl Into<String>, returns: ValueType) -> Self {
        self.accessors.push(AccessorShape {
            name: name.into(),
            returns,
        });
        self
    }

    pub fn build(self) -> Arc<ObjectShape> {
        Arc::new(ObjectShape {
            name: self.name,
            supertypes: self.supertypes,
            accessors: self.accessors,
        })
    }
}

impl fmt::Display for ObjectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
