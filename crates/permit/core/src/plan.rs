//! Extraction plans.
//!
//! An [`Extractor`] turns a source value into an intent's property map. The
//! [`ExtractorFactory`] validates one plan per (source type, intent type)
//! pair and caches the outcome, including the absence of a plan.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::AppendOnlyCache;
use crate::convert::ConversionService;
use crate::error::ExtractionError;
use crate::extract::{Extraction, PropertyExtractor, PropertyExtractorRegistry, Validation};
use crate::intent_type::{IntentType, IntentTypeId};
use crate::naming::NamingConvention;
use crate::value::{Value, ValueType};

/// A property as seen by extraction: the normalized name is what sources are
/// searched for, the accessor name is the key in the resulting map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub method: String,
    pub declared: ValueType,
    pub optional: bool,
}

enum Plan {
    /// The whole source becomes the single required property.
    Mono {
        property: Property,
        conversion: Arc<dyn ConversionService>,
    },
    /// Each property is read from the source by one resolved extractor.
    Poly {
        properties: Vec<Property>,
        extractor: Arc<dyn PropertyExtractor>,
    },
}

/// A validated strategy producing property maps from one source type.
pub struct Extractor {
    plan: Plan,
}

impl Extractor {
    pub fn is_mono(&self) -> bool {
        matches!(self.plan, Plan::Mono { .. })
    }

    /// The properties this extractor fills, ordered by accessor name.
    pub fn properties(&self) -> Vec<&Property> {
        match &self.plan {
            Plan::Mono { property, .. } => vec![property],
            Plan::Poly { properties, .. } => properties.iter().collect(),
        }
    }

    /// Build the property map for `source`. All-or-nothing; every stored
    /// value is checked against its declared type.
    pub fn extract(&self, source: &Value) -> Result<BTreeMap<String, Value>, ExtractionError> {
        match &self.plan {
            Plan::Mono {
                property,
                conversion,
            } => {
                let runtime = source.value_type();
                let value = conversion
                    .convert(source.clone(), &runtime, &property.declared)
                    .map_err(|_| type_mismatch(property, source))?;
                if value.is_null() {
                    return Err(missing(property, source));
                }
                if !property.declared.admits(&value) {
                    return Err(type_mismatch(property, source));
                }
                Ok(BTreeMap::from([(property.method.clone(), value)]))
            }
            Plan::Poly {
                properties,
                extractor,
            } => {
                let mut values = BTreeMap::new();
                for property in properties {
                    match extractor.extract(source, &property.name, &property.declared) {
                        Extraction::Found(value) if property.declared.admits(&value) => {
                            values.insert(property.method.clone(), value);
                        }
                        Extraction::Found(_) => return Err(type_mismatch(property, source)),
                        Extraction::Absent if property.optional => {}
                        Extraction::Absent => return Err(missing(property, source)),
                        Extraction::TypeMismatch => return Err(type_mismatch(property, source)),
                    }
                }
                Ok(values)
            }
        }
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_mono() { "mono" } else { "poly" };
        f.debug_struct("Extractor")
            .field("kind", &kind)
            .field("properties", &self.properties())
            .finish()
    }
}

fn missing(property: &Property, source: &Value) -> ExtractionError {
    ExtractionError::MissingProperty {
        property: property.name.clone(),
        source_value: source.to_string(),
    }
}

fn type_mismatch(property: &Property, source: &Value) -> ExtractionError {
    ExtractionError::TypeMismatch {
        property: property.name.clone(),
        source_value: source.to_string(),
        expected: property.declared.to_string(),
    }
}

/// Builds and caches extraction plans.
pub struct ExtractorFactory {
    registry: PropertyExtractorRegistry,
    conversion: Arc<dyn ConversionService>,
    naming: Arc<dyn NamingConvention>,
    plans: AppendOnlyCache<(ValueType, IntentTypeId), Option<Arc<Extractor>>>,
}

impl ExtractorFactory {
    pub fn new(
        registry: PropertyExtractorRegistry,
        conversion: Arc<dyn ConversionService>,
        naming: Arc<dyn NamingConvention>,
    ) -> Self {
        Self {
            registry,
            conversion,
            naming,
            plans: AppendOnlyCache::new(),
        }
    }

    /// The extractor for sources of `source_type`, or `None` when such
    /// sources cannot produce `intent_type`.
    pub fn apply(&self, source_type: &ValueType, intent_type: &IntentType) -> Option<Arc<Extractor>> {
        self.plans
            .get_or_compute((source_type.clone(), intent_type.id()), |(source_type, _)| {
                self.plan(source_type, intent_type).map(Arc::new)
            })
    }

    fn scan(&self, intent_type: &IntentType) -> Vec<Property> {
        intent_type
            .properties()
            .into_iter()
            .map(|spec| Property {
                name: self.naming.normalize(&spec.method),
                method: spec.method,
                declared: spec.declared,
                optional: spec.optional,
            })
            .collect()
    }

    fn plan(&self, source_type: &ValueType, intent_type: &IntentType) -> Option<Extractor> {
        let properties = self.scan(intent_type);

        let mut required = properties.iter().filter(|p| !p.optional);
        if let (Some(only), None) = (required.next(), required.next()) {
            if self.conversion.can_convert(source_type, &only.declared) {
                debug!(
                    intent_type = %intent_type.name(),
                    source_type = %source_type,
                    property = %only.name,
                    "Resolved mono extraction plan"
                );
                return Some(Extractor {
                    plan: Plan::Mono {
                        property: only.clone(),
                        conversion: self.conversion.clone(),
                    },
                });
            }
        }

        let extractor = self.registry.resolve(source_type);
        for property in &properties {
            match extractor.validate(&property.name, &property.declared) {
                Validation::Ok => {}
                Validation::Unavailable if property.optional => {}
                Validation::Unavailable => {
                    debug!(
                        intent_type = %intent_type.name(),
                        source_type = %source_type,
                        property = %property.name,
                        "Required property unavailable"
                    );
                    return None;
                }
                Validation::TypeMismatch => {
                    warn!(
                        intent_type = %intent_type.name(),
                        source_type = %source_type,
                        property = %property.name,
                        declared = %property.declared,
                        "Extraction plan rejected: property type mismatch"
                    );
                    return None;
                }
            }
        }

        debug!(
            intent_type = %intent_type.name(),
            source_type = %source_type,
            extractor_type = %extractor.supported_type(),
            properties = properties.len(),
            "Resolved poly extraction plan"
        );
        Some(Extractor {
            plan: Plan::Poly {
                properties,
                extractor,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::DefaultConversionService;
    use crate::error::ConversionError;
    use crate::extract::MapPropertyExtractor;
    use crate::naming::PrefixNamingConvention;
    use crate::reflect::{ObjectShape, Reflect};

    #[derive(Debug)]
    struct Account {
        balance: Value,
    }

    impl Reflect for Account {
        fn shape(&self) -> Arc<ObjectShape> {
            ObjectShape::builder("Account")
                .accessor("get_owner", ValueType::Str)
                .accessor("get_balance", ValueType::Map)
                .build()
        }

        fn get(&self, accessor: &str) -> Option<Value> {
            match accessor {
                "get_owner" => Some(Value::from("alice")),
                "get_balance" => Some(self.balance.clone()),
                _ => None,
            }
        }
    }

    fn account_source() -> Value {
        Value::object(Account {
            balance: Value::map([("amount", 5)]),
        })
    }

    fn factory() -> ExtractorFactory {
        let conversion: Arc<dyn ConversionService> = Arc::new(DefaultConversionService);
        let naming: Arc<dyn NamingConvention> = Arc::new(PrefixNamingConvention::default());
        let mut registry = PropertyExtractorRegistry::new(conversion.clone(), naming.clone());
        registry.register(Arc::new(MapPropertyExtractor::new(conversion.clone())));
        ExtractorFactory::new(registry, conversion, naming)
    }

    fn order() -> Arc<IntentType> {
        IntentType::builder("Order")
            .required("get_quantity", ValueType::Int)
            .optional("note", ValueType::Str)
            .build()
            .unwrap()
    }

    #[test]
    fn single_required_convertible_source_uses_mono_plan() {
        let factory = factory();
        let order = order();
        let extractor = factory.apply(&ValueType::Int, &order).unwrap();
        assert!(extractor.is_mono());
        assert_eq!(
            extractor.extract(&Value::Int(42)),
            Ok(BTreeMap::from([("get_quantity".to_string(), Value::Int(42))]))
        );
    }

    #[test]
    fn maps_use_poly_plan_with_normalized_names() {
        let factory = factory();
        let order = order();
        let extractor = factory.apply(&ValueType::Map, &order).unwrap();
        assert!(!extractor.is_mono());

        let values = extractor.extract(&Value::map([("quantity", 3)])).unwrap();
        assert_eq!(values, BTreeMap::from([("get_quantity".to_string(), Value::Int(3))]));

        let err = extractor.extract(&Value::map([("note", "hi")])).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::MissingProperty {
                property: "quantity".into(),
                source_value: "{note=hi}".into(),
            }
        );

        let err = extractor.extract(&Value::map([("quantity", "lots")])).unwrap_err();
        assert!(matches!(err, ExtractionError::TypeMismatch { ref property, .. } if property == "quantity"));
    }

    #[test]
    fn unusable_sources_have_no_plan() {
        let factory = factory();
        let pair = IntentType::builder("Pair")
            .required("left", ValueType::Int)
            .required("right", ValueType::Int)
            .build()
            .unwrap();
        assert!(factory.apply(&ValueType::Int, &pair).is_none());
        assert!(factory.apply(&ValueType::Bool, &order()).is_none());
    }

    #[test]
    fn accessor_type_mismatch_rejects_the_plan() {
        let factory = factory();
        let ledger = IntentType::builder("Ledger")
            .required("owner", ValueType::Str)
            .required("balance", ValueType::Int)
            .build()
            .unwrap();
        assert!(factory.apply(&account_source().value_type(), &ledger).is_none());

        // the mismatch is fatal for optional properties too
        let relaxed = IntentType::builder("Relaxed")
            .required("owner", ValueType::Str)
            .optional("balance", ValueType::Int)
            .build()
            .unwrap();
        assert!(factory.apply(&account_source().value_type(), &relaxed).is_none());
    }

    #[test]
    fn unavailable_optional_properties_keep_the_plan() {
        let factory = factory();
        let summary = IntentType::builder("Summary")
            .required("owner", ValueType::Str)
            .required("balance", ValueType::Map)
            .optional("nickname", ValueType::Str)
            .build()
            .unwrap();
        let source = account_source();
        let extractor = factory.apply(&source.value_type(), &summary).unwrap();
        assert!(!extractor.is_mono());

        let values = extractor.extract(&source).unwrap();
        assert_eq!(values.get("owner"), Some(&Value::from("alice")));
        assert_eq!(values.get("nickname"), None);
    }

    #[test]
    fn converted_values_must_fit_the_declared_type() {
        struct Careless;

        impl ConversionService for Careless {
            fn can_convert(&self, source: &ValueType, _target: &ValueType) -> bool {
                *source != ValueType::Map
            }

            fn convert(
                &self,
                value: Value,
                _source: &ValueType,
                _target: &ValueType,
            ) -> Result<Value, ConversionError> {
                Ok(value)
            }
        }

        let conversion: Arc<dyn ConversionService> = Arc::new(Careless);
        let naming: Arc<dyn NamingConvention> = Arc::new(PrefixNamingConvention::default());
        let mut registry = PropertyExtractorRegistry::new(conversion.clone(), naming.clone());
        registry.register(Arc::new(MapPropertyExtractor::new(conversion.clone())));
        let factory = ExtractorFactory::new(registry, conversion, naming);
        let order = order();

        let mono = factory.apply(&ValueType::Str, &order).unwrap();
        assert!(mono.is_mono());
        assert!(matches!(
            mono.extract(&Value::from("lots")),
            Err(ExtractionError::TypeMismatch { ref property, .. }) if property == "quantity"
        ));

        let poly = factory.apply(&ValueType::Map, &order).unwrap();
        assert!(!poly.is_mono());
        assert!(matches!(
            poly.extract(&Value::map([("quantity", "lots")])),
            Err(ExtractionError::TypeMismatch { ref property, .. }) if property == "quantity"
        ));
    }

    #[test]
    fn plans_are_cached_per_pair() {
        let factory = factory();
        let order = order();
        let first = factory.apply(&ValueType::Map, &order).unwrap();
        let second = factory.apply(&ValueType::Map, &order).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
