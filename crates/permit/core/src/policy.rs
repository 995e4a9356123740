//! Access policies and their specificity-ordered registry.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::AppendOnlyCache;
use crate::config::EqualDepthOrder;
use crate::error::{BoxError, ConfigurationError, PermitError};
use crate::intent::{Intent, IntentData};
use crate::intent_type::{IntentType, IntentTypeId};

/// A deferred denial.
///
/// Policies are pure: they describe the error to raise rather than raising
/// it. The error is only produced if the caller asked for it.
pub struct Denial {
    factory: Box<dyn FnOnce() -> BoxError + Send>,
}

impl Denial {
    pub fn new<E, F>(factory: F) -> Self
    where
        E: Into<BoxError>,
        F: FnOnce() -> E + Send + 'static,
    {
        Self {
            factory: Box::new(move || factory().into()),
        }
    }

    /// Deny with a plain message.
    pub fn because(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || reason)
    }

    pub fn into_error(self) -> BoxError {
        (self.factory)()
    }
}

impl fmt::Debug for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Denial").finish_non_exhaustive()
    }
}

/// A check that may deny the construction of an intent.
///
/// Closures `Fn(&I) -> Option<Denial>` are policies.
pub trait AccessPolicy<I: Intent>: Send + Sync + 'static {
    fn apply(&self, intent: &I) -> Option<Denial>;
}

impl<I, F> AccessPolicy<I> for F
where
    I: Intent,
    F: Fn(&I) -> Option<Denial> + Send + Sync + 'static,
{
    fn apply(&self, intent: &I) -> Option<Denial> {
        self(intent)
    }
}

type PolicyCheck = Arc<dyn Fn(&IntentData) -> Result<Option<Denial>, PermitError> + Send + Sync>;

/// A policy bound to the exact intent type it was declared for.
pub struct RegisteredPolicy {
    name: String,
    target: Arc<IntentType>,
    seq: usize,
    check: PolicyCheck,
}

impl RegisteredPolicy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Arc<IntentType> {
        &self.target
    }

    pub fn depth(&self) -> usize {
        self.target.depth()
    }

    pub fn apply(&self, intent: &IntentData) -> Result<Option<Denial>, PermitError> {
        (self.check)(intent)
    }
}

impl fmt::Debug for RegisteredPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredPolicy")
            .field("name", &self.name)
            .field("target", &self.target.name())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Resolves the policies applicable to an intent type.
///
/// A policy applies to its target type and every subtype. Applicable
/// policies run from the most general target to the most specific.
pub struct AccessPolicyRegistry {
    equal_depth_order: EqualDepthOrder,
    policies: Vec<Arc<RegisteredPolicy>>,
    resolved: AppendOnlyCache<IntentTypeId, Arc<[Arc<RegisteredPolicy>]>>,
}

impl AccessPolicyRegistry {
    pub fn new(equal_depth_order: EqualDepthOrder) -> Self {
        Self {
            equal_depth_order,
            policies: Vec::new(),
            resolved: AppendOnlyCache::new(),
        }
    }

    /// Register a typed policy, named after its Rust type.
    pub fn register<I, P>(&mut self, policy: P) -> Result<(), ConfigurationError>
    where
        I: Intent,
        P: AccessPolicy<I>,
    {
        self.register_named::<I, P>(std::any::type_name::<P>(), policy)
    }

    pub fn register_named<I, P>(
        &mut self,
        name: impl Into<String>,
        policy: P,
    ) -> Result<(), ConfigurationError>
    where
        I: Intent,
        P: AccessPolicy<I>,
    {
        let target = I::intent_type()?;
        let check: PolicyCheck = Arc::new(move |data: &IntentData| {
            let intent = I::from_data(data.clone())?;
            Ok(policy.apply(&intent))
        });
        self.insert(name.into(), target, check)
    }

    /// Register a policy over intent records of a builder-declared type.
    pub fn register_dyn<F>(
        &mut self,
        target: Arc<IntentType>,
        name: impl Into<String>,
        policy: F,
    ) -> Result<(), ConfigurationError>
    where
        F: Fn(&IntentData) -> Option<Denial> + Send + Sync + 'static,
    {
        let check: PolicyCheck = Arc::new(move |data: &IntentData| Ok(policy(data)));
        self.insert(name.into(), target, check)
    }

    fn insert(
        &mut self,
        name: String,
        target: Arc<IntentType>,
        check: PolicyCheck,
    ) -> Result<(), ConfigurationError> {
        if self.equal_depth_order == EqualDepthOrder::Reject {
            if let Some(existing) = self.policies.iter().find(|p| p.target.id() == target.id()) {
                return Err(ConfigurationError::AmbiguousPolicyOrder {
                    intent_type: target.name().to_string(),
                    policy: name,
                    existing: existing.name.clone(),
                    depth: target.depth(),
                });
            }
        }

        debug!(policy = %name, intent_type = %target.name(), depth = target.depth(), "Access policy registered");
        let seq = self.policies.len();
        self.policies.push(Arc::new(RegisteredPolicy {
            name,
            target,
            seq,
            check,
        }));
        self.resolved = AppendOnlyCache::new();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Policies applicable to `intent_type`, shallowest target first; equal
    /// depths keep registration order.
    pub fn get(&self, intent_type: &IntentType) -> Arc<[Arc<RegisteredPolicy>]> {
        self.resolved.get_or_compute(intent_type.id(), |_| {
            let mut applicable: Vec<_> = self
                .policies
                .iter()
                .filter(|p| intent_type.is_subtype_of(&p.target))
                .cloned()
                .collect();
            applicable.sort_by_key(|p| (p.depth(), p.seq));
            debug!(
                intent_type = %intent_type.name(),
                policies = applicable.len(),
                "Resolved access policies"
            );
            applicable.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn hierarchy() -> (Arc<IntentType>, Arc<IntentType>, Arc<IntentType>) {
        let resource = IntentType::builder("Resource")
            .required("owner", ValueType::Str)
            .build()
            .unwrap();
        let order = IntentType::builder("Order")
            .extends(resource.clone())
            .required("quantity", ValueType::Int)
            .build()
            .unwrap();
        let unrelated = IntentType::builder("Unrelated").build().unwrap();
        (resource, order, unrelated)
    }

    fn names(policies: &[Arc<RegisteredPolicy>]) -> Vec<&str> {
        policies.iter().map(|p| p.name()).collect()
    }

    #[test]
    fn policies_run_from_general_to_specific() {
        let (resource, order, unrelated) = hierarchy();
        let mut registry = AccessPolicyRegistry::new(EqualDepthOrder::RegistrationOrder);
        registry.register_dyn(order.clone(), "order-limit", |_| None).unwrap();
        registry.register_dyn(resource.clone(), "authenticated", |_| None).unwrap();
        registry.register_dyn(unrelated, "other", |_| None).unwrap();
        registry.register_dyn(order.clone(), "order-owner", |_| None).unwrap();

        assert_eq!(
            names(&registry.get(&order)),
            vec!["authenticated", "order-limit", "order-owner"]
        );
        assert_eq!(names(&registry.get(&resource)), vec!["authenticated"]);
    }

    #[test]
    fn resolution_is_cached_until_registration() {
        let (resource, order, _) = hierarchy();
        let mut registry = AccessPolicyRegistry::new(EqualDepthOrder::RegistrationOrder);
        registry.register_dyn(resource, "authenticated", |_| None).unwrap();
        let first = registry.get(&order);
        assert!(Arc::ptr_eq(&first, &registry.get(&order)));

        registry.register_dyn(order.clone(), "order-owner", |_| None).unwrap();
        assert_eq!(registry.get(&order).len(), 2);
    }

    #[test]
    fn reject_mode_refuses_same_target_twice() {
        let (resource, order, _) = hierarchy();
        let mut registry = AccessPolicyRegistry::new(EqualDepthOrder::Reject);
        registry.register_dyn(order.clone(), "first", |_| None).unwrap();
        registry.register_dyn(resource, "general", |_| None).unwrap();
        let err = registry.register_dyn(order, "second", |_| None).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::AmbiguousPolicyOrder {
                intent_type: "Order".into(),
                policy: "second".into(),
                existing: "first".into(),
                depth: 1,
            }
        );
    }

    #[test]
    fn denial_is_deferred() {
        use std::sync::atomic::{AtomicBool, Ordering};
        static PRODUCED: AtomicBool = AtomicBool::new(false);

        let denial = Denial::new(|| {
            PRODUCED.store(true, Ordering::SeqCst);
            "nope"
        });
        assert!(!PRODUCED.load(Ordering::SeqCst));
        assert_eq!(denial.into_error().to_string(), "nope");
        assert!(PRODUCED.load(Ordering::SeqCst));
        assert_eq!(Denial::because("closed").into_error().to_string(), "closed");
    }
}
