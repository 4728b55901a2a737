use super::binding::{bind, BoundArgs, Param};
use super::{EventContext, EventPayload};
use crate::core::{ModelError, Result};
use crate::schema::{downcast_mut, Instance, Model, TypeMetadata};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

pub type PayloadHandlerFn =
    Arc<dyn Fn(&mut Instance, &EventPayload) -> Result<Value> + Send + Sync>;
pub type ParamsHandlerFn = Arc<dyn Fn(&mut Instance, BoundArgs) -> Result<Value> + Send + Sync>;

/// Future returned by an asynchronous handler, borrowing the instance.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;
pub type AsyncHandlerFn = Arc<
    dyn for<'a> Fn(&'a mut Instance, BoundArgs, EventContext) -> HandlerFuture<'a> + Send + Sync,
>;

fn erase_async<F>(handler: F) -> AsyncHandlerFn
where
    F: for<'a> Fn(&'a mut Instance, BoundArgs, EventContext) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    Arc::new(handler)
}

/// A handler in one of its three calling shapes.
#[derive(Clone)]
pub enum EventHandler {
    /// Receives the whole payload.
    Payload(PayloadHandlerFn),
    /// Receives the declared parameters, bound from the payload. An empty
    /// parameter list invokes the handler with no arguments.
    Params {
        params: Arc<[Param]>,
        handler: ParamsHandlerFn,
    },
    /// Like `Params`, but returns a future and also receives the
    /// [`EventContext`] of the dispatch.
    Async {
        params: Arc<[Param]>,
        handler: AsyncHandlerFn,
    },
}

impl EventHandler {
    pub fn with_params<M, R, F>(params: impl IntoIterator<Item = Param>, handler: F) -> Self
    where
        M: Model,
        R: Serialize,
        F: Fn(&mut M, BoundArgs) -> Result<R> + Send + Sync + 'static,
    {
        let erased: ParamsHandlerFn = Arc::new(move |target: &mut Instance, args: BoundArgs| {
            let result = handler(downcast_mut::<M>(target)?, args)?;
            Ok(serde_json::to_value(result)?)
        });
        Self::Params {
            params: params.into_iter().collect(),
            handler: erased,
        }
    }

    pub fn with_payload<M, R, F>(handler: F) -> Self
    where
        M: Model,
        R: Serialize,
        F: Fn(&mut M, &EventPayload) -> Result<R> + Send + Sync + 'static,
    {
        let erased: PayloadHandlerFn =
            Arc::new(move |target: &mut Instance, payload: &EventPayload| {
                let result = handler(downcast_mut::<M>(target)?, payload)?;
                Ok(serde_json::to_value(result)?)
            });
        Self::Payload(erased)
    }

    /// Asynchronous handler over bound parameters.
    ///
    /// ```ignore
    /// EventHandler::with_async::<Account, _, _>([Param::text("email")], |account, args, ctx| {
    ///     Box::pin(async move {
    ///         account.email = args.text("email")?.to_string();
    ///         ctx.store()?.save_model(account).await
    ///     })
    /// })
    /// ```
    pub fn with_async<M, R, F>(params: impl IntoIterator<Item = Param>, handler: F) -> Self
    where
        M: Model,
        R: Serialize + Send + 'static,
        F: for<'a> Fn(
                &'a mut M,
                BoundArgs,
                EventContext,
            ) -> Pin<Box<dyn Future<Output = Result<R>> + Send + 'a>>
            + Send
            + Sync
            + 'static,
    {
        let erased = erase_async(move |target, args, context| {
            let pending = downcast_mut::<M>(target).map(|model| handler(model, args, context));
            Box::pin(async move {
                let result = pending?.await?;
                serde_json::to_value(result).map_err(ModelError::from)
            })
        });
        Self::Async {
            params: params.into_iter().collect(),
            handler: erased,
        }
    }

    pub fn params(&self) -> &[Param] {
        match self {
            Self::Payload(_) => &[],
            Self::Params { params, .. } | Self::Async { params, .. } => &params[..],
        }
    }

    pub fn takes_payload(&self) -> bool {
        matches!(self, Self::Payload(_))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async { .. })
    }

    /// Binds parameters and calls the handler. Nothing runs if binding fails.
    ///
    /// Asynchronous handlers cannot run here; use
    /// [`invoke_async`](Self::invoke_async).
    pub fn invoke(&self, target: &mut Instance, payload: &EventPayload) -> Result<Value> {
        match self {
            Self::Payload(handler) => handler(target, payload),
            Self::Params { params, handler } => {
                let args = bind(params, payload)?;
                handler(target, args)
            }
            Self::Async { .. } => Err(ModelError::UnsupportedOperation(format!(
                "event '{}' has an asynchronous handler and needs an async dispatch",
                payload.name()
            ))),
        }
    }

    /// Runs any handler shape. Synchronous handlers complete without
    /// yielding and ignore `context`.
    pub async fn invoke_async(
        &self,
        target: &mut Instance,
        payload: &EventPayload,
        context: EventContext,
    ) -> Result<Value> {
        match self {
            Self::Async { params, handler } => {
                let args = bind(params, payload)?;
                handler(target, args, context).await
            }
            other => other.invoke(target, payload),
        }
    }

    /// Re-targets a handler declared on `B` at the `B` embedded in `M`.
    pub(crate) fn project<M: Model, B: Model>(
        self,
        lens: Arc<dyn Fn(&mut M) -> &mut B + Send + Sync>,
    ) -> Self {
        match self {
            Self::Payload(handler) => {
                let projected: PayloadHandlerFn =
                    Arc::new(move |target: &mut Instance, payload: &EventPayload| {
                        let model = downcast_mut::<M>(target)?;
                        handler(lens(model) as &mut Instance, payload)
                    });
                Self::Payload(projected)
            }
            Self::Params { params, handler } => {
                let projected: ParamsHandlerFn =
                    Arc::new(move |target: &mut Instance, args: BoundArgs| {
                        let model = downcast_mut::<M>(target)?;
                        handler(lens(model) as &mut Instance, args)
                    });
                Self::Params {
                    params,
                    handler: projected,
                }
            }
            Self::Async { params, handler } => {
                let projected = erase_async(move |target, args, context| {
                    match downcast_mut::<M>(target) {
                        Ok(model) => handler(lens(model) as &mut Instance, args, context),
                        Err(err) => Box::pin(async move { Err::<Value, _>(err) }),
                    }
                });
                Self::Async {
                    params,
                    handler: projected,
                }
            }
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(_) => f.write_str("EventHandler::Payload"),
            Self::Params { params, .. } => f
                .debug_struct("EventHandler::Params")
                .field("params", params)
                .finish(),
            Self::Async { params, .. } => f
                .debug_struct("EventHandler::Async")
                .field("params", params)
                .finish(),
        }
    }
}

/// Per-instance table of event name to handler.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    model_name: String,
    handlers: HashMap<String, EventHandler>,
}

impl EventDispatcher {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            handlers: HashMap::new(),
        }
    }

    /// Pre-populates the table with every event the type declares.
    pub fn from_metadata(meta: &TypeMetadata) -> Self {
        let mut dispatcher = Self::new(meta.model_name());
        for (name, handler) in meta.events() {
            dispatcher.handlers.insert(name.clone(), handler.clone());
        }
        dispatcher
    }

    /// Binds `name` to `handler`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, handler: EventHandler) {
        let name = name.into();
        debug!(model = %self.model_name, event = %name, "registering event handler");
        self.handlers.insert(name, handler);
    }

    pub fn register_payload_handler<M, R, F>(&mut self, name: impl Into<String>, handler: F)
    where
        M: Model,
        R: Serialize,
        F: Fn(&mut M, &EventPayload) -> Result<R> + Send + Sync + 'static,
    {
        self.register(name, EventHandler::with_payload::<M, R, F>(handler));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Runs the handler bound to `event`.
    ///
    /// Returns `Ok(None)` when nothing is bound. Any binding or handler
    /// failure comes back as a single [`ModelError::Dispatch`].
    pub fn dispatch(
        &self,
        target: &mut Instance,
        event: &str,
        payload: &EventPayload,
    ) -> Result<Option<Value>> {
        let Some(handler) = self.handlers.get(event) else {
            debug!(model = %self.model_name, event, "no handler registered");
            return Ok(None);
        };

        trace!(model = %self.model_name, event, keys = payload.len(), "dispatching event");
        handler
            .invoke(target, payload)
            .map(Some)
            .map_err(|err| {
                debug!(model = %self.model_name, event, error = %err, "event failed");
                ModelError::dispatch(event, err)
            })
    }

    /// Runs the handler bound to `event`, awaiting it when asynchronous.
    ///
    /// Same absent/failure contract as [`dispatch`](Self::dispatch).
    pub async fn dispatch_async(
        &self,
        target: &mut Instance,
        event: &str,
        payload: &EventPayload,
        context: EventContext,
    ) -> Result<Option<Value>> {
        let Some(handler) = self.handlers.get(event) else {
            debug!(model = %self.model_name, event, "no handler registered");
            return Ok(None);
        };

        trace!(model = %self.model_name, event, keys = payload.len(), "dispatching event");
        let context = context.for_model(&self.model_name);
        match handler.invoke_async(target, payload, context).await {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(model = %self.model_name, event, error = %err, "event failed");
                Err(ModelError::dispatch(event, err))
            }
        }
    }

    /// Typed convenience over [`dispatch`](Self::dispatch).
    pub fn dispatch_to<M: Model>(
        &self,
        model: &mut M,
        event: &str,
        payload: &EventPayload,
    ) -> Result<Option<Value>> {
        self.dispatch(model as &mut Instance, event, payload)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.event_names().collect();
        names.sort_unstable();
        f.debug_struct("EventDispatcher")
            .field("model_name", &self.model_name)
            .field("events", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Lamp {
        on: bool,
    }

    impl Model for Lamp {
        const NAME: &'static str = "lamp";

        fn declare(_schema: &mut SchemaBuilder<Self>) {}
    }

    #[test]
    fn test_unregistered_event_is_absent() {
        let dispatcher = EventDispatcher::new("lamp");
        let mut lamp = Lamp::default();
        let result = dispatcher
            .dispatch_to(&mut lamp, "toggle", &EventPayload::new("toggle"))
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_zero_parameter_handler() {
        let mut dispatcher = EventDispatcher::new("lamp");
        dispatcher.register(
            "toggle",
            EventHandler::with_params::<Lamp, _, _>(
                Vec::<Param>::new(),
                |lamp: &mut Lamp, _args| {
                    lamp.on = !lamp.on;
                    Ok(lamp.on)
                },
            ),
        );

        let mut lamp = Lamp::default();
        let result = dispatcher
            .dispatch_to(&mut lamp, "toggle", &EventPayload::new("toggle"))
            .unwrap();
        assert_eq!(result, Some(Value::Bool(true)));
        assert!(lamp.on);
    }

    #[test]
    fn test_binding_failure_skips_handler() {
        let mut dispatcher = EventDispatcher::new("lamp");
        dispatcher.register(
            "dim",
            EventHandler::with_params::<Lamp, _, _>(
                [Param::int("level")],
                |_lamp: &mut Lamp, _args| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            ),
        );

        let mut lamp = Lamp::default();
        let err = dispatcher
            .dispatch_to(&mut lamp, "dim", &EventPayload::new("dim"))
            .unwrap_err();

        assert!(matches!(err, ModelError::Dispatch { ref event, .. } if event == "dim"));
        assert!(matches!(err.root_cause(), ModelError::MissingParameter(_)));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wrong_instance_type_fails() {
        #[derive(Default)]
        struct Other;
        impl Model for Other {
            const NAME: &'static str = "other";
            fn declare(_schema: &mut SchemaBuilder<Self>) {}
        }

        let mut dispatcher = EventDispatcher::new("lamp");
        dispatcher.register_payload_handler("echo", |_lamp: &mut Lamp, payload: &EventPayload| {
            Ok(payload.name().to_string())
        });

        let mut other = Other;
        let err = dispatcher
            .dispatch_to(&mut other, "echo", &EventPayload::new("echo"))
            .unwrap_err();
        assert!(matches!(err.root_cause(), ModelError::TypeMismatch(_)));
    }

    fn async_toggle() -> EventHandler {
        EventHandler::with_async::<Lamp, _, _>(
            Vec::<Param>::new(),
            |lamp: &mut Lamp, _args, _context| {
                Box::pin(async move {
                    lamp.on = !lamp.on;
                    Ok(lamp.on)
                })
            },
        )
    }

    #[tokio::test]
    async fn test_async_handler_runs_through_dispatch_async() {
        let mut dispatcher = EventDispatcher::new("lamp");
        dispatcher.register("toggle", async_toggle());

        let mut lamp = Lamp::default();
        let result = dispatcher
            .dispatch_async(
                &mut lamp as &mut Instance,
                "toggle",
                &EventPayload::new("toggle"),
                EventContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(result, Some(Value::Bool(true)));
        assert!(lamp.on);
    }

    #[test]
    fn test_async_handler_rejects_sync_dispatch() {
        let mut dispatcher = EventDispatcher::new("lamp");
        dispatcher.register("toggle", async_toggle());

        let mut lamp = Lamp::default();
        let err = dispatcher
            .dispatch_to(&mut lamp, "toggle", &EventPayload::new("toggle"))
            .unwrap_err();
        assert!(matches!(err.root_cause(), ModelError::UnsupportedOperation(_)));
        assert!(!lamp.on);
    }

    #[tokio::test]
    async fn test_store_lookup_without_store_names_the_model() {
        let mut dispatcher = EventDispatcher::new("lamp");
        dispatcher.register(
            "persist",
            EventHandler::with_async::<Lamp, _, _>(
                Vec::<Param>::new(),
                |_lamp: &mut Lamp, _args, context| {
                    Box::pin(async move { context.store().map(|_| ()) })
                },
            ),
        );

        let mut lamp = Lamp::default();
        let err = dispatcher
            .dispatch_async(
                &mut lamp as &mut Instance,
                "persist",
                &EventPayload::new("persist"),
                EventContext::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), ModelError::StoreUnavailable(name) if name == "lamp"));
    }
}
