use std::sync::Arc;

use crate::convert::ConversionService;
use crate::extract::{Extraction, PropertyExtractor};
use crate::value::{Value, ValueType};

/// Reads properties from JSON object members.
///
/// Missing members and JSON `null` are absent.
pub struct JsonPropertyExtractor {
    conversion: Arc<dyn ConversionService>,
}

impl JsonPropertyExtractor {
    pub fn new(conversion: Arc<dyn ConversionService>) -> Self {
        Self { conversion }
    }
}

impl PropertyExtractor for JsonPropertyExtractor {
    fn supported_type(&self) -> ValueType {
        ValueType::Json
    }

    fn extract(&self, source: &Value, property: &str, declared: &ValueType) -> Extraction {
        let Value::Json(document) = source else {
            return Extraction::Absent;
        };
        match document.get(property) {
            None | Some(serde_json::Value::Null) => Extraction::Absent,
            Some(member) => {
                match self
                    .conversion
                    .convert(Value::Json(member.clone()), &ValueType::Json, declared)
                {
                    Ok(Value::Null) => Extraction::Absent,
                    Ok(converted) => Extraction::Found(converted),
                    Err(_) => Extraction::TypeMismatch,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DefaultConversionService;
    use serde_json::json;

    #[test]
    fn reads_object_members() {
        let extractor = JsonPropertyExtractor::new(Arc::new(DefaultConversionService));
        let source = Value::Json(json!({"quantity": 3, "note": null, "tags": ["a", "b"]}));

        assert_eq!(
            extractor.extract(&source, "quantity", &ValueType::Int),
            Extraction::Found(Value::Int(3))
        );
        assert_eq!(
            extractor.extract(&source, "tags", &ValueType::list(ValueType::Str)),
            Extraction::Found(Value::from(vec!["a", "b"]))
        );
        assert_eq!(
            extractor.extract(&source, "note", &ValueType::Str),
            Extraction::Absent
        );
        assert_eq!(
            extractor.extract(&source, "missing", &ValueType::Str),
            Extraction::Absent
        );
        assert_eq!(
            extractor.extract(&source, "tags", &ValueType::Int),
            Extraction::TypeMismatch
        );
    }

    #[test]
    fn non_object_documents_have_no_members() {
        let extractor = JsonPropertyExtractor::new(Arc::new(DefaultConversionService));
        assert_eq!(
            extractor.extract(&Value::Json(json!([1, 2])), "quantity", &ValueType::Int),
            Extraction::Absent
        );
    }
}
