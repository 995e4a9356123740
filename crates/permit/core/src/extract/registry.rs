use std::sync::Arc;

use tracing::debug;

use crate::cache::AppendOnlyCache;
use crate::convert::ConversionService;
use crate::extract::{PropertyExtractor, ReflectivePropertyExtractor};
use crate::naming::NamingConvention;
use crate::value::ValueType;

struct RegisteredExtractor {
    supported: ValueType,
    depth: usize,
    extractor: Arc<dyn PropertyExtractor>,
}

/// Resolves the property extractor for a source type.
///
/// Registered extractors are tried from the deepest supported type to the
/// shallowest, ties in registration order. When none supports the source
/// type, a [`ReflectivePropertyExtractor`] for that type is used.
pub struct PropertyExtractorRegistry {
    extractors: Vec<RegisteredExtractor>,
    conversion: Arc<dyn ConversionService>,
    naming: Arc<dyn NamingConvention>,
    reflective: AppendOnlyCache<ValueType, Arc<dyn PropertyExtractor>>,
}

impl PropertyExtractorRegistry {
    pub fn new(conversion: Arc<dyn ConversionService>, naming: Arc<dyn NamingConvention>) -> Self {
        Self {
            extractors: Vec::new(),
            conversion,
            naming,
            reflective: AppendOnlyCache::new(),
        }
    }

    pub fn register(&mut self, extractor: Arc<dyn PropertyExtractor>) {
        let supported = extractor.supported_type();
        let depth = supported.depth();
        let position = self
            .extractors
            .iter()
            .position(|e| e.depth < depth)
            .unwrap_or(self.extractors.len());
        debug!(supported_type = %supported, depth, "Property extractor registered");
        self.extractors.insert(
            position,
            RegisteredExtractor {
                supported,
                depth,
                extractor,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// The extractor to use for sources of `source_type`.
    pub fn resolve(&self, source_type: &ValueType) -> Arc<dyn PropertyExtractor> {
        if let Some(registered) = self
            .extractors
            .iter()
            .find(|e| e.supported.is_assignable_from(source_type))
        {
            return registered.extractor.clone();
        }
        self.reflective.get_or_compute(source_type.clone(), |source_type| {
            debug!(source_type = %source_type, "Falling back to reflective extraction");
            Arc::new(ReflectivePropertyExtractor::new(
                source_type.clone(),
                self.conversion.clone(),
                self.naming.clone(),
            ))
        })
    }
}
