use std::sync::Arc;

use crate::convert::ConversionService;
use crate::extract::{Extraction, PropertyExtractor};
use crate::value::{Value, ValueType};

/// Reads properties from map sources by key.
pub struct MapPropertyExtractor {
    conversion: Arc<dyn ConversionService>,
}

impl MapPropertyExtractor {
    pub fn new(conversion: Arc<dyn ConversionService>) -> Self {
        Self { conversion }
    }
}

impl PropertyExtractor for MapPropertyExtractor {
    fn supported_type(&self) -> ValueType {
        ValueType::Map
    }

    fn extract(&self, source: &Value, property: &str, declared: &ValueType) -> Extraction {
        let Value::Map(entries) = source else {
            return Extraction::Absent;
        };
        let Some(value) = entries.get(property).filter(|v| !v.is_null()) else {
            return Extraction::Absent;
        };
        let runtime = value.value_type();
        if !self.conversion.can_convert(&runtime, declared) {
            return Extraction::TypeMismatch;
        }
        match self.conversion.convert(value.clone(), &runtime, declared) {
            Ok(Value::Null) => Extraction::Absent,
            Ok(converted) => Extraction::Found(converted),
            Err(_) => Extraction::TypeMismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DefaultConversionService;

    fn extractor() -> MapPropertyExtractor {
        MapPropertyExtractor::new(Arc::new(DefaultConversionService))
    }

    #[test]
    fn finds_and_converts_entries() {
        let source = Value::map([("quantity", Value::from("3")), ("note", Value::Null)]);
        assert_eq!(
            extractor().extract(&source, "quantity", &ValueType::Int),
            Extraction::Found(Value::Int(3))
        );
        assert_eq!(
            extractor().extract(&source, "note", &ValueType::optional(ValueType::Str)),
            Extraction::Absent
        );
        assert_eq!(
            extractor().extract(&source, "missing", &ValueType::Int),
            Extraction::Absent
        );
    }

    #[test]
    fn reports_type_mismatch() {
        let source = Value::map([("quantity", Value::map([("nested", 1)])), ("count", Value::from("many"))]);
        assert_eq!(
            extractor().extract(&source, "quantity", &ValueType::Int),
            Extraction::TypeMismatch
        );
        assert_eq!(
            extractor().extract(&source, "count", &ValueType::Int),
            Extraction::TypeMismatch
        );
    }
}
