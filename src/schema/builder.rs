use super::metadata::TypeMetadata;
use super::naming::Tag;
use super::{Model, Storable};
use crate::core::{AttributeValue, ModelError, Result, SchemaError, ValueKind};
use crate::events::{BoundArgs, EventContext, EventHandler, EventPayload, Param};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased model state as held by instances and views.
pub type Instance = dyn Any + Send + Sync;

pub(crate) type ErasedGet = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;
pub(crate) type ErasedSet = Arc<dyn Fn(&mut Instance, Value) -> Result<()> + Send + Sync>;
pub(crate) type ErasedInit = Arc<dyn Fn(&mut Instance) + Send + Sync>;
pub(crate) type ErasedIdentifier = Arc<dyn Fn(&Instance) -> Option<String> + Send + Sync>;

pub(crate) fn downcast_ref<M: Model>(target: &Instance) -> Result<&M> {
    target
        .downcast_ref::<M>()
        .ok_or_else(|| ModelError::TypeMismatch(format!("instance is not a {}", M::NAME)))
}

pub(crate) fn downcast_mut<M: Model>(target: &mut Instance) -> Result<&mut M> {
    target
        .downcast_mut::<M>()
        .ok_or_else(|| ModelError::TypeMismatch(format!("instance is not a {}", M::NAME)))
}

/// A field-backed attribute slot.
#[derive(Clone)]
pub(crate) struct FieldSlot {
    pub(crate) kind: ValueKind,
    pub(crate) get: ErasedGet,
    pub(crate) set: ErasedSet,
}

#[derive(Clone)]
pub(crate) enum MethodBody {
    Getter(ErasedGet),
    Setter(ErasedSet),
}

/// One tagged member, before classification.
#[derive(Clone)]
pub(crate) enum Declaration {
    Field { tag: Tag, slot: FieldSlot },
    Method { tag: Tag, body: MethodBody },
    Event { tag: Tag, handler: EventHandler },
}

/// Collects the tagged members of a model type.
///
/// `Model::declare` receives one of these; the resulting declarations are
/// classified into fields, getters, setters and events by [`describe`].
///
/// [`describe`]: super::describe
pub struct SchemaBuilder<M: Model> {
    declarations: Vec<Declaration>,
    identifier: Option<ErasedIdentifier>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> SchemaBuilder<M> {
    pub(crate) fn new() -> Self {
        Self {
            declarations: Vec::new(),
            identifier: None,
            _model: PhantomData,
        }
    }

    /// Declares a field-backed attribute through a pair of lenses.
    pub fn field<T, G, S>(&mut self, tag: impl Into<Tag>, get: G, get_mut: S) -> &mut Self
    where
        T: AttributeValue,
        G: Fn(&M) -> &T + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut T + Send + Sync + 'static,
    {
        let read: ErasedGet = Arc::new(move |target: &Instance| {
            let model = downcast_ref::<M>(target)?;
            Ok(get(model).to_json())
        });
        let write: ErasedSet = Arc::new(move |target: &mut Instance, value: Value| {
            let coerced = T::from_json(value)?;
            *get_mut(downcast_mut::<M>(target)?) = coerced;
            Ok(())
        });

        self.declarations.push(Declaration::Field {
            tag: tag.into(),
            slot: FieldSlot {
                kind: T::KIND,
                get: read,
                set: write,
            },
        });
        self
    }

    /// Declares a value-returning accessor method.
    pub fn getter<T, F>(&mut self, tag: impl Into<Tag>, method: F) -> &mut Self
    where
        T: AttributeValue,
        F: Fn(&M) -> T + Send + Sync + 'static,
    {
        let read: ErasedGet = Arc::new(move |target: &Instance| {
            let model = downcast_ref::<M>(target)?;
            Ok(method(model).to_json())
        });
        self.declarations.push(Declaration::Method {
            tag: tag.into(),
            body: MethodBody::Getter(read),
        });
        self
    }

    /// Declares an accessor method with no return value.
    pub fn setter<T, F>(&mut self, tag: impl Into<Tag>, method: F) -> &mut Self
    where
        T: AttributeValue,
        F: Fn(&mut M, T) + Send + Sync + 'static,
    {
        let write: ErasedSet = Arc::new(move |target: &mut Instance, value: Value| {
            let converted = T::from_json(value)?;
            method(downcast_mut::<M>(target)?, converted);
            Ok(())
        });
        self.declarations.push(Declaration::Method {
            tag: tag.into(),
            body: MethodBody::Setter(write),
        });
        self
    }

    /// Declares an event whose handler receives individually bound parameters.
    pub fn event<R, F>(
        &mut self,
        tag: impl Into<Tag>,
        params: impl IntoIterator<Item = Param>,
        handler: F,
    ) -> &mut Self
    where
        R: Serialize,
        F: Fn(&mut M, BoundArgs) -> Result<R> + Send + Sync + 'static,
    {
        self.declarations.push(Declaration::Event {
            tag: tag.into(),
            handler: EventHandler::with_params::<M, R, F>(params, handler),
        });
        self
    }

    /// Declares an event whose handler receives the whole payload.
    pub fn event_with_payload<R, F>(&mut self, tag: impl Into<Tag>, handler: F) -> &mut Self
    where
        R: Serialize,
        F: Fn(&mut M, &EventPayload) -> Result<R> + Send + Sync + 'static,
    {
        self.declarations.push(Declaration::Event {
            tag: tag.into(),
            handler: EventHandler::with_payload::<M, R, F>(handler),
        });
        self
    }

    /// Declares an event with an asynchronous handler. The handler also
    /// receives the dispatch [`EventContext`], which exposes the document
    /// store of the registry that produced the instance.
    pub fn event_async<R, F>(
        &mut self,
        tag: impl Into<Tag>,
        params: impl IntoIterator<Item = Param>,
        handler: F,
    ) -> &mut Self
    where
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
        self.declarations.push(Declaration::Event {
            tag: tag.into(),
            handler: EventHandler::with_async::<M, R, F>(params, handler),
        });
        self
    }

    /// Includes the declarations of an embedded ancestor type.
    ///
    /// Ancestor members are appended after the members declared so far and
    /// take part in duplicate detection like any other member.
    pub fn inherit<B, G, S>(&mut self, get: G, get_mut: S) -> &mut Self
    where
        B: Model,
        G: Fn(&M) -> &B + Send + Sync + 'static,
        S: Fn(&mut M) -> &mut B + Send + Sync + 'static,
    {
        let lens: Arc<dyn Fn(&M) -> &B + Send + Sync> = Arc::new(get);
        let lens_mut: Arc<dyn Fn(&mut M) -> &mut B + Send + Sync> = Arc::new(get_mut);

        let mut base = SchemaBuilder::<B>::new();
        B::declare(&mut base);

        for declaration in base.declarations {
            let projected = match declaration {
                Declaration::Field { tag, slot } => Declaration::Field {
                    tag,
                    slot: FieldSlot {
                        kind: slot.kind,
                        get: project_get::<M, B>(slot.get, lens.clone()),
                        set: project_set::<M, B>(slot.set, lens_mut.clone()),
                    },
                },
                Declaration::Method { tag, body } => Declaration::Method {
                    tag,
                    body: match body {
                        MethodBody::Getter(read) => {
                            MethodBody::Getter(project_get::<M, B>(read, lens.clone()))
                        }
                        MethodBody::Setter(write) => {
                            MethodBody::Setter(project_set::<M, B>(write, lens_mut.clone()))
                        }
                    },
                },
                Declaration::Event { tag, handler } => Declaration::Event {
                    tag,
                    handler: handler.project::<M, B>(lens_mut.clone()),
                },
            };
            self.declarations.push(projected);
        }
        self
    }

    pub(crate) fn finish(self) -> std::result::Result<TypeMetadata, SchemaError> {
        let init: ErasedInit = Arc::new(|target: &mut Instance| {
            if let Some(model) = target.downcast_mut::<M>() {
                model.init();
            }
        });
        TypeMetadata::classify(M::NAME, self.declarations, self.identifier, init)
    }
}

impl<M: Storable> SchemaBuilder<M> {
    /// Marks the type as persistable through the document store.
    pub fn storable(&mut self) -> &mut Self {
        self.identifier = Some(Arc::new(|target: &Instance| {
            target
                .downcast_ref::<M>()
                .and_then(|model| model.identifier())
        }));
        self
    }
}

fn project_get<M: Model, B: Model>(
    read: ErasedGet,
    lens: Arc<dyn Fn(&M) -> &B + Send + Sync>,
) -> ErasedGet {
    Arc::new(move |target: &Instance| {
        let model = downcast_ref::<M>(target)?;
        read(lens(model) as &Instance)
    })
}

fn project_set<M: Model, B: Model>(
    write: ErasedSet,
    lens: Arc<dyn Fn(&mut M) -> &mut B + Send + Sync>,
) -> ErasedSet {
    Arc::new(move |target: &mut Instance, value: Value| {
        let model = downcast_mut::<M>(target)?;
        write(lens(model) as &mut Instance, value)
    })
}
