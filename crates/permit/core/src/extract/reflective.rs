use std::sync::Arc;

use crate::cache::AppendOnlyCache;
use crate::convert::ConversionService;
use crate::extract::{Extraction, PropertyExtractor, Validation};
use crate::naming::NamingConvention;
use crate::reflect::AccessorShape;
use crate::value::{Value, ValueType};

/// Fallback extractor reading properties through an object's accessors.
///
/// An accessor matches a property when its normalized name equals the
/// property name; among several matches the lexicographically smallest
/// accessor name wins. Sources without a shape expose no accessors.
pub struct ReflectivePropertyExtractor {
    source_type: ValueType,
    accessors: Vec<AccessorShape>,
    conversion: Arc<dyn ConversionService>,
    naming: Arc<dyn NamingConvention>,
    lookups: AppendOnlyCache<String, Option<AccessorShape>>,
}

impl ReflectivePropertyExtractor {
    pub fn new(
        source_type: ValueType,
        conversion: Arc<dyn ConversionService>,
        naming: Arc<dyn NamingConvention>,
    ) -> Self {
        let accessors = match &source_type {
            ValueType::Object(shape) => shape.accessors().into_iter().cloned().collect(),
            _ => Vec::new(),
        };
        Self {
            source_type,
            accessors,
            conversion,
            naming,
            lookups: AppendOnlyCache::new(),
        }
    }

    fn accessor(&self, property: &str) -> Option<AccessorShape> {
        self.lookups.get_or_compute(property.to_string(), |property| {
            self.accessors
                .iter()
                .filter(|a| self.naming.normalize(&a.name) == *property)
                .min_by(|a, b| a.name.cmp(&b.name))
                .cloned()
        })
    }
}

impl PropertyExtractor for ReflectivePropertyExtractor {
    fn supported_type(&self) -> ValueType {
        self.source_type.clone()
    }

    fn validate(&self, property: &str, declared: &ValueType) -> Validation {
        match self.accessor(property) {
            None => Validation::Unavailable,
            Some(accessor) if !self.conversion.can_convert(&accessor.returns, declared) => {
                Validation::TypeMismatch
            }
            Some(_) => Validation::Ok,
        }
    }

    fn extract(&self, source: &Value, property: &str, declared: &ValueType) -> Extraction {
        let Value::Object(object) = source else {
            return Extraction::Absent;
        };
        let Some(accessor) = self.accessor(property) else {
            return Extraction::Absent;
        };
        if !self.conversion.can_convert(&accessor.returns, declared) {
            return Extraction::TypeMismatch;
        }
        match object.get(&accessor.name) {
            None | Some(Value::Null) => Extraction::Absent,
            Some(value) => {
                let runtime = value.value_type();
                match self.conversion.convert(value, &runtime, declared) {
                    Ok(Value::Null) => Extraction::Absent,
                    Ok(converted) => Extraction::Found(converted),
                    Err(_) => Extraction::TypeMismatch,
                }
            }
        }
    }
}
