//! The permission engine.
//!
//! Every intent is produced here: the source is matched to an extraction
//! plan, its properties are extracted, the intent is synthesized for the
//! active principal, and the applicable access policies run from the most
//! general to the most specific. The first denial stops evaluation.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PermitConfig;
use crate::convert::{ConversionService, DefaultConversionService, IntentConverter};
use crate::error::{ConfigurationError, DenialError, PermitError};
use crate::extract::{
    JsonPropertyExtractor, MapPropertyExtractor, PropertyExtractor, PropertyExtractorRegistry,
};
use crate::factory::IntentFactory;
use crate::intent::{Intent, IntentData, IntentSynthesizer};
use crate::intent_type::IntentType;
use crate::naming::{NamingConvention, PrefixNamingConvention};
use crate::plan::ExtractorFactory;
use crate::policy::{AccessPolicy, AccessPolicyRegistry, Denial};
use crate::principal::{Principal, PrincipalContext, PrincipalScope, ThreadLocalPrincipalContext};
use crate::value::{Value, ValueType};

/// Steps of a single intent construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    ResolvePlan,
    Extract,
    Synthesize,
    Authorize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ResolvePlan => write!(f, "resolve_plan"),
            Stage::Extract => write!(f, "extract"),
            Stage::Synthesize => write!(f, "synthesize"),
            Stage::Authorize => write!(f, "authorize"),
        }
    }
}

/// Final state of an authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Granted,
    Denied,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Granted => write!(f, "granted"),
            Outcome::Denied => write!(f, "denied"),
        }
    }
}

struct PolicyDenial {
    policy: String,
    denial: Denial,
}

/// Builds intents from sources, enforcing access policies.
///
/// Engines are shared: [`PermissionEngineBuilder::build`] returns an `Arc`,
/// which the engine's own conversion service refers back to.
pub struct PermissionEngine {
    config: PermitConfig,
    conversion: Arc<dyn ConversionService>,
    naming: Arc<dyn NamingConvention>,
    principals: Arc<dyn PrincipalContext>,
    extractors: ExtractorFactory,
    policies: AccessPolicyRegistry,
    synthesizer: IntentSynthesizer,
}

impl PermissionEngine {
    pub fn builder() -> PermissionEngineBuilder {
        PermissionEngineBuilder::new()
    }

    pub fn config(&self) -> &PermitConfig {
        &self.config
    }

    pub fn policies(&self) -> &AccessPolicyRegistry {
        &self.policies
    }

    /// The configured conversion service, extended so that every intent
    /// type is a conversion target for the sources the engine accepts.
    pub fn conversion_service(&self) -> &Arc<dyn ConversionService> {
        &self.conversion
    }

    /// True if sources of `source_type` can produce `intent_type`.
    pub fn is_source_for(&self, source_type: &ValueType, intent_type: &IntentType) -> bool {
        self.extractors.apply(source_type, intent_type).is_some()
    }

    /// The property name an accessor name maps to.
    pub fn normalize_method_name(&self, method: &str) -> String {
        self.naming.normalize(method)
    }

    /// A handle producing intents of type `I`.
    pub fn factory<I: Intent>(&self) -> Result<IntentFactory<'_, I>, ConfigurationError> {
        Ok(IntentFactory::new(self, I::intent_type()?))
    }

    /// Build an `I` from `source` for the active principal, failing with the
    /// policy's error if any applicable policy denies it.
    pub fn require<I: Intent>(&self, source: impl Into<Value>) -> Result<I, PermitError> {
        let intent_type = I::intent_type()?;
        I::from_data(self.require_dyn(source, &intent_type)?)
    }

    /// Like [`require`](Self::require), but a denial yields `Ok(None)`.
    pub fn request<I: Intent>(&self, source: impl Into<Value>) -> Result<Option<I>, PermitError> {
        let intent_type = I::intent_type()?;
        self.request_dyn(source, &intent_type)?
            .map(I::from_data)
            .transpose()
    }

    /// [`require`](Self::require) with `principal` active for the duration
    /// of the call.
    pub fn require_as<I: Intent>(
        &self,
        source: impl Into<Value>,
        principal: impl Into<Option<Principal>>,
    ) -> Result<I, PermitError> {
        let _scope = PrincipalScope::enter(self.principals.as_ref(), principal.into());
        self.require(source)
    }

    /// [`request`](Self::request) with `principal` active for the duration
    /// of the call.
    pub fn request_as<I: Intent>(
        &self,
        source: impl Into<Value>,
        principal: impl Into<Option<Principal>>,
    ) -> Result<Option<I>, PermitError> {
        let _scope = PrincipalScope::enter(self.principals.as_ref(), principal.into());
        self.request(source)
    }

    /// Build an intent record of a builder-declared type.
    pub fn require_dyn(
        &self,
        source: impl Into<Value>,
        intent_type: &Arc<IntentType>,
    ) -> Result<IntentData, PermitError> {
        let intent = self.create(&source.into(), intent_type)?;
        match self.authorize(&intent)? {
            None => Ok(intent),
            Some(PolicyDenial { policy, denial }) => Err(DenialError::new(
                policy,
                intent_type.name(),
                denial.into_error(),
            )
            .into()),
        }
    }

    pub fn request_dyn(
        &self,
        source: impl Into<Value>,
        intent_type: &Arc<IntentType>,
    ) -> Result<Option<IntentData>, PermitError> {
        let intent = self.create(&source.into(), intent_type)?;
        Ok(match self.authorize(&intent)? {
            None => Some(intent),
            Some(_) => None,
        })
    }

    pub fn require_dyn_as(
        &self,
        source: impl Into<Value>,
        intent_type: &Arc<IntentType>,
        principal: impl Into<Option<Principal>>,
    ) -> Result<IntentData, PermitError> {
        let _scope = PrincipalScope::enter(self.principals.as_ref(), principal.into());
        self.require_dyn(source, intent_type)
    }

    pub fn request_dyn_as(
        &self,
        source: impl Into<Value>,
        intent_type: &Arc<IntentType>,
        principal: impl Into<Option<Principal>>,
    ) -> Result<Option<IntentData>, PermitError> {
        let _scope = PrincipalScope::enter(self.principals.as_ref(), principal.into());
        self.request_dyn(source, intent_type)
    }

    fn create(&self, source: &Value, intent_type: &Arc<IntentType>) -> Result<IntentData, PermitError> {
        let source_type = source.value_type();
        let extractor = self
            .extractors
            .apply(&source_type, intent_type)
            .ok_or_else(|| ConfigurationError::InvalidSource {
                source_type: source_type.to_string(),
                intent_type: intent_type.name().to_string(),
            })?;
        debug!(
            stage = %Stage::ResolvePlan,
            intent_type = %intent_type.name(),
            source_type = %source_type,
            mono = extractor.is_mono(),
            "Extraction plan resolved"
        );

        let values = extractor.extract(source).inspect_err(|e| {
            debug!(
                stage = %Stage::Extract,
                intent_type = %intent_type.name(),
                source_type = %source_type,
                error = %e,
                "Extraction failed"
            );
        })?;

        let principal = self.principals.current();
        debug!(
            stage = %Stage::Synthesize,
            intent_type = %intent_type.name(),
            principal = principal.as_ref().map(|p| p.name()).unwrap_or("<none>"),
            properties = values.len(),
            "Synthesizing intent"
        );
        Ok(self.synthesizer.build(intent_type.clone(), values, principal))
    }

    /// Run applicable policies in order, stopping at the first denial.
    fn authorize(&self, intent: &IntentData) -> Result<Option<PolicyDenial>, PermitError> {
        let intent_type = intent.intent_type();
        for policy in self.policies.get(intent_type).iter() {
            debug!(
                stage = %Stage::Authorize,
                intent_type = %intent_type.name(),
                policy = %policy.name(),
                "Evaluating access policy"
            );
            if let Some(denial) = policy.apply(intent)? {
                if self.config.log_denials {
                    info!(
                        intent_type = %intent_type.name(),
                        policy = %policy.name(),
                        outcome = %Outcome::Denied,
                        "Intent denied"
                    );
                } else {
                    debug!(
                        intent_type = %intent_type.name(),
                        policy = %policy.name(),
                        outcome = %Outcome::Denied,
                        "Intent denied"
                    );
                }
                return Ok(Some(PolicyDenial {
                    policy: policy.name().to_string(),
                    denial,
                }));
            }
        }
        debug!(intent_type = %intent_type.name(), outcome = %Outcome::Granted, "Intent granted");
        Ok(None)
    }
}

type PolicyRegistration =
    Box<dyn FnOnce(&mut AccessPolicyRegistry) -> Result<(), ConfigurationError> + Send>;

/// Assembles a [`PermissionEngine`].
///
/// Registration failures are deferred and the first one is returned from
/// [`build`](Self::build).
pub struct PermissionEngineBuilder {
    config: PermitConfig,
    conversion: Option<Arc<dyn ConversionService>>,
    naming: Option<Arc<dyn NamingConvention>>,
    principals: Option<Arc<dyn PrincipalContext>>,
    extractors: Vec<Arc<dyn PropertyExtractor>>,
    policies: Vec<PolicyRegistration>,
}

impl PermissionEngineBuilder {
    fn new() -> Self {
        Self {
            config: PermitConfig::default(),
            conversion: None,
            naming: None,
            principals: None,
            extractors: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn config(mut self, config: PermitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn conversion_service(mut self, conversion: Arc<dyn ConversionService>) -> Self {
        self.conversion = Some(conversion);
        self
    }

    /// Replaces the prefix convention derived from the configuration.
    pub fn naming_convention(mut self, naming: Arc<dyn NamingConvention>) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn principal_context(mut self, principals: Arc<dyn PrincipalContext>) -> Self {
        self.principals = Some(principals);
        self
    }

    /// Registered before the built-in extractors, so it wins ties with them.
    pub fn extractor(mut self, extractor: Arc<dyn PropertyExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn policy<I, P>(mut self, policy: P) -> Self
    where
        I: Intent,
        P: AccessPolicy<I>,
    {
        self.policies
            .push(Box::new(move |registry| registry.register::<I, P>(policy)));
        self
    }

    pub fn named_policy<I, P>(mut self, name: impl Into<String>, policy: P) -> Self
    where
        I: Intent,
        P: AccessPolicy<I>,
    {
        let name = name.into();
        self.policies
            .push(Box::new(move |registry| registry.register_named::<I, P>(name, policy)));
        self
    }

    pub fn dyn_policy<F>(mut self, target: Arc<IntentType>, name: impl Into<String>, policy: F) -> Self
    where
        F: Fn(&IntentData) -> Option<Denial> + Send + Sync + 'static,
    {
        let name = name.into();
        self.policies
            .push(Box::new(move |registry| registry.register_dyn(target, name, policy)));
        self
    }

    pub fn build(self) -> Result<Arc<PermissionEngine>, ConfigurationError> {
        let config = self.config;
        let delegate = self
            .conversion
            .unwrap_or_else(|| Arc::new(DefaultConversionService));
        let naming = self.naming.unwrap_or_else(|| {
            Arc::new(PrefixNamingConvention::new(config.property_prefixes.iter().cloned()))
        });
        let principals = self
            .principals
            .unwrap_or_else(|| Arc::new(ThreadLocalPrincipalContext));

        let mut policies = AccessPolicyRegistry::new(config.equal_depth_order);
        for register in self.policies {
            register(&mut policies)?;
        }

        let user_extractors = self.extractors;
        Ok(Arc::new_cyclic(|engine| {
            let conversion: Arc<dyn ConversionService> =
                Arc::new(IntentConverter::new(engine.clone(), delegate));

            let mut registry = PropertyExtractorRegistry::new(conversion.clone(), naming.clone());
            for extractor in user_extractors {
                registry.register(extractor);
            }
            if config.builtin_extractors {
                registry.register(Arc::new(MapPropertyExtractor::new(conversion.clone())));
                registry.register(Arc::new(JsonPropertyExtractor::new(conversion.clone())));
            }

            info!(
                extractors = registry.len(),
                policies = policies.len(),
                equal_depth_order = ?config.equal_depth_order,
                "Permission engine built"
            );

            PermissionEngine {
                synthesizer: IntentSynthesizer::new(naming.clone()),
                extractors: ExtractorFactory::new(registry, conversion.clone(), naming.clone()),
                conversion,
                config,
                naming,
                principals,
                policies,
            }
        }))
    }
}

impl Default for PermissionEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
