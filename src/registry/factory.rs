use super::instance::{ModelHandle, ModelInstance};
use crate::core::Result;
use crate::events::EventContext;
use crate::schema::{Model, TypeMetadata};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

type Constructor = Arc<dyn Fn() -> Result<ModelInstance> + Send + Sync>;

enum Recipe {
    PerCall(Constructor),
    Singleton {
        meta: Arc<TypeMetadata>,
        instance: Arc<Mutex<ModelInstance>>,
    },
}

/// Construction recipe for one registered model name.
pub struct ModelFactory {
    model_name: &'static str,
    recipe: Recipe,
}

impl ModelFactory {
    /// A fresh instance on every request.
    pub fn per_call<M, F>(ctor: F) -> Self
    where
        M: Model,
        F: Fn() -> M + Send + Sync + 'static,
    {
        Self {
            model_name: M::NAME,
            recipe: Recipe::PerCall(Arc::new(move || ModelInstance::new(ctor()))),
        }
    }

    pub fn per_call_default<M: Model + Default>() -> Self {
        Self::per_call::<M, _>(M::default)
    }

    /// One instance shared by every request for the process lifetime.
    /// Its `init` hook runs here, once.
    ///
    /// Fails if `M` cannot be described.
    pub fn singleton<M: Model>(model: M) -> Result<Self> {
        let mut instance = ModelInstance::new(model)?;
        instance.initialize();
        Ok(Self {
            model_name: M::NAME,
            recipe: Recipe::Singleton {
                meta: instance.metadata().clone(),
                instance: Arc::new(Mutex::new(instance)),
            },
        })
    }

    pub fn model_name(&self) -> &'static str {
        self.model_name
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self.recipe, Recipe::Singleton { .. })
    }

    pub(crate) fn produce(&self, context: EventContext) -> Result<ModelHandle> {
        match &self.recipe {
            Recipe::PerCall(ctor) => Ok(ModelHandle::owned(ctor()?, context)),
            Recipe::Singleton { meta, instance } => Ok(ModelHandle::shared(
                meta.clone(),
                instance.clone(),
                context,
            )),
        }
    }
}

impl fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("model_name", &self.model_name)
            .field("singleton", &self.is_singleton())
            .finish()
    }
}
