use crate::attributes::{read_all, AttributeView};
use crate::core::{ModelError, Result};
use crate::events::{EventContext, EventDispatcher, EventHandler, EventPayload, PayloadValue};
use crate::schema::{describe, Instance, Model, TypeMetadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

/// One constructed model together with its dispatch table.
pub struct ModelInstance {
    meta: Arc<TypeMetadata>,
    state: Box<Instance>,
    dispatcher: EventDispatcher,
    initialized: bool,
}

impl ModelInstance {
    pub fn new<M: Model>(model: M) -> Result<Self> {
        let meta = describe::<M>()?;
        let dispatcher = EventDispatcher::from_metadata(&meta);
        Ok(Self {
            meta,
            state: Box::new(model),
            dispatcher,
            initialized: false,
        })
    }

    pub fn model_name(&self) -> &str {
        self.meta.model_name()
    }

    pub fn metadata(&self) -> &Arc<TypeMetadata> {
        &self.meta
    }

    pub fn is_storable(&self) -> bool {
        self.meta.is_storable()
    }

    pub fn identifier(&self) -> Option<String> {
        self.meta.identifier_of(&*self.state)
    }

    pub fn attribute_view(&mut self) -> AttributeView<'_> {
        AttributeView::new(&mut *self.state, self.meta.clone())
    }

    /// Snapshot of every readable attribute.
    pub fn attributes(&self) -> Result<Map<String, Value>> {
        read_all(&self.meta, &*self.state)
    }

    /// Synchronous dispatch; events with asynchronous handlers fail here.
    pub fn dispatch(&mut self, event: &str, payload: &EventPayload) -> Result<Option<Value>> {
        self.dispatcher.dispatch(&mut *self.state, event, payload)
    }

    pub async fn dispatch_async(
        &mut self,
        event: &str,
        payload: &EventPayload,
        context: EventContext,
    ) -> Result<Option<Value>> {
        self.dispatcher
            .dispatch_async(&mut *self.state, event, payload, context)
            .await
    }

    /// Builds a payload named after the event from `pairs` and dispatches it.
    pub fn send_event<K, V>(
        &mut self,
        event: &str,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Option<Value>>
    where
        K: Into<String>,
        V: Into<PayloadValue>,
    {
        let payload = EventPayload::from_pairs(event, pairs);
        self.dispatch(event, &payload)
    }

    /// Adds or replaces a handler on this instance only.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: EventHandler) {
        self.dispatcher.register(name, handler);
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn downcast_ref<M: Model>(&self) -> Option<&M> {
        self.state.downcast_ref::<M>()
    }

    pub fn downcast_mut<M: Model>(&mut self) -> Option<&mut M> {
        self.state.downcast_mut::<M>()
    }

    /// Runs the model's `init` hook the first time only.
    pub(crate) fn initialize(&mut self) {
        if !self.initialized {
            trace!(model = self.meta.model_name(), "initializing instance");
            self.meta.initialize(&mut *self.state);
            self.initialized = true;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("model", &self.meta.model_name())
            .field("dispatcher", &self.dispatcher)
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Handler result plus the attribute snapshot taken right after it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResponse {
    /// `None` when no handler was bound to the event.
    pub result: Option<Value>,
    pub attributes: Map<String, Value>,
}

enum Slot {
    Owned(Box<ModelInstance>),
    Shared(Arc<Mutex<ModelInstance>>),
}

/// A live instance handed out by the registry: owned for per-call types,
/// shared for singletons.
///
/// Dispatch is asynchronous; handlers receive the handle's
/// [`EventContext`]. The synchronous accessors never wait: on a singleton
/// that another task is dispatching they fail with
/// [`ModelError::LockError`].
pub struct ModelHandle {
    meta: Arc<TypeMetadata>,
    slot: Slot,
    context: EventContext,
}

impl ModelHandle {
    pub(crate) fn owned(instance: ModelInstance, context: EventContext) -> Self {
        Self {
            meta: instance.metadata().clone(),
            slot: Slot::Owned(Box::new(instance)),
            context,
        }
    }

    pub(crate) fn shared(
        meta: Arc<TypeMetadata>,
        instance: Arc<Mutex<ModelInstance>>,
        context: EventContext,
    ) -> Self {
        Self {
            meta,
            slot: Slot::Shared(instance),
            context,
        }
    }

    pub fn model_name(&self) -> &str {
        self.meta.model_name()
    }

    pub fn metadata(&self) -> &Arc<TypeMetadata> {
        &self.meta
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.slot, Slot::Shared(_))
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    /// Runs `f` against the instance without waiting for a shared lock.
    pub fn with_instance<R>(&mut self, f: impl FnOnce(&mut ModelInstance) -> R) -> Result<R> {
        match &mut self.slot {
            Slot::Owned(instance) => Ok(f(&mut **instance)),
            Slot::Shared(shared) => {
                let mut guard = shared.try_lock()?;
                Ok(f(&mut *guard))
            }
        }
    }

    fn read<R>(&self, f: impl FnOnce(&ModelInstance) -> R) -> Result<R> {
        match &self.slot {
            Slot::Owned(instance) => Ok(f(&**instance)),
            Slot::Shared(shared) => {
                let guard = shared.try_lock()?;
                Ok(f(&*guard))
            }
        }
    }

    /// Runs `f` against the typed model.
    pub fn with_model<M: Model, R>(&mut self, f: impl FnOnce(&mut M) -> R) -> Result<R> {
        let model_name = self.meta.model_name().to_string();
        self.with_instance(|instance| {
            instance.downcast_mut::<M>().map(f).ok_or_else(|| {
                ModelError::TypeMismatch(format!("{} is not a {}", model_name, M::NAME))
            })
        })?
    }

    pub async fn dispatch(&mut self, event: &str, payload: &EventPayload) -> Result<Option<Value>> {
        let context = self.context.clone();
        match &mut self.slot {
            Slot::Owned(instance) => instance.dispatch_async(event, payload, context).await,
            Slot::Shared(shared) => {
                let mut guard = shared.lock().await;
                guard.dispatch_async(event, payload, context).await
            }
        }
    }

    pub async fn send_event<I, K, V>(&mut self, event: &str, pairs: I) -> Result<Option<Value>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PayloadValue>,
    {
        let payload = EventPayload::from_pairs(event, pairs);
        self.dispatch(event, &payload).await
    }

    /// Dispatches and snapshots the attributes under a single lock.
    pub async fn invoke(&mut self, event: &str, payload: &EventPayload) -> Result<EventResponse> {
        let context = self.context.clone();
        match &mut self.slot {
            Slot::Owned(instance) => respond(&mut **instance, event, payload, context).await,
            Slot::Shared(shared) => {
                let mut guard = shared.lock().await;
                respond(&mut *guard, event, payload, context).await
            }
        }
    }

    pub fn attributes(&self) -> Result<Map<String, Value>> {
        self.read(ModelInstance::attributes)?
    }

    pub fn identifier(&self) -> Result<Option<String>> {
        self.read(ModelInstance::identifier)
    }

    pub(crate) async fn put_attributes(&mut self, attributes: Map<String, Value>) -> Result<()> {
        match &mut self.slot {
            Slot::Owned(instance) => instance.attribute_view().put_all(attributes),
            Slot::Shared(shared) => shared.lock().await.attribute_view().put_all(attributes),
        }
    }

    /// Singletons are initialized by their factory, so only owned
    /// instances need this.
    pub(crate) fn initialize(&mut self) {
        if let Slot::Owned(instance) = &mut self.slot {
            instance.initialize();
        }
    }
}

async fn respond(
    instance: &mut ModelInstance,
    event: &str,
    payload: &EventPayload,
    context: EventContext,
) -> Result<EventResponse> {
    let result = instance.dispatch_async(event, payload, context).await?;
    Ok(EventResponse {
        result,
        attributes: instance.attributes()?,
    })
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_name", &self.model_name())
            .field("shared", &self.is_shared())
            .field("context", &self.context)
            .finish()
    }
}
