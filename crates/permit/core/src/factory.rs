use std::marker::PhantomData;
use std::sync::Arc;

use crate::engine::PermissionEngine;
use crate::error::PermitError;
use crate::intent::Intent;
use crate::intent_type::IntentType;
use crate::principal::Principal;
use crate::value::{Value, ValueType};

/// A handle producing intents of one type.
///
/// Obtained from [`PermissionEngine::factory`]; the intent type is resolved
/// once, up front.
pub struct IntentFactory<'e, I> {
    engine: &'e PermissionEngine,
    intent_type: Arc<IntentType>,
    _intent: PhantomData<fn() -> I>,
}

impl<'e, I: Intent> IntentFactory<'e, I> {
    pub(crate) fn new(engine: &'e PermissionEngine, intent_type: Arc<IntentType>) -> Self {
        Self {
            engine,
            intent_type,
            _intent: PhantomData,
        }
    }

    pub fn intent_type(&self) -> &Arc<IntentType> {
        &self.intent_type
    }

    pub fn accepts(&self, source_type: &ValueType) -> bool {
        self.engine.is_source_for(source_type, &self.intent_type)
    }

    pub fn require(&self, source: impl Into<Value>) -> Result<I, PermitError> {
        I::from_data(self.engine.require_dyn(source, &self.intent_type)?)
    }

    pub fn request(&self, source: impl Into<Value>) -> Result<Option<I>, PermitError> {
        self.engine
            .request_dyn(source, &self.intent_type)?
            .map(I::from_data)
            .transpose()
    }

    pub fn require_as(
        &self,
        source: impl Into<Value>,
        principal: impl Into<Option<Principal>>,
    ) -> Result<I, PermitError> {
        I::from_data(self.engine.require_dyn_as(source, &self.intent_type, principal)?)
    }

    pub fn request_as(
        &self,
        source: impl Into<Value>,
        principal: impl Into<Option<Principal>>,
    ) -> Result<Option<I>, PermitError> {
        self.engine
            .request_dyn_as(source, &self.intent_type, principal)?
            .map(I::from_data)
            .transpose()
    }
}
