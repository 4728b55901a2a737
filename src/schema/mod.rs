//! Metadata introspection.
//!
//! A model type lists its tagged members once in [`Model::declare`]; the
//! result is classified and cached per type by [`describe`].

mod builder;
mod cache;
mod metadata;
pub mod naming;

pub use builder::{Instance, SchemaBuilder};
pub use cache::describe;
pub use metadata::TypeMetadata;
pub use naming::Tag;

pub(crate) use builder::downcast_mut;

use std::any::Any;

/// A type whose tagged members are discoverable at runtime.
///
/// # Example
///
/// ```
/// use docmodel::prelude::*;
///
/// #[derive(Default)]
/// struct Counter {
///     count: i32,
/// }
///
/// impl Model for Counter {
///     const NAME: &'static str = "counter";
///
///     fn declare(schema: &mut SchemaBuilder<Self>) {
///         schema
///             .field("count", |m: &Counter| &m.count, |m: &mut Counter| &mut m.count)
///             .event("increment", [Param::long("by")], |m: &mut Counter, args| {
///                 m.count += args.long("by")? as i32;
///                 Ok(m.count)
///             });
///     }
/// }
///
/// let meta = describe::<Counter>().unwrap();
/// assert!(meta.has_event("increment"));
/// ```
pub trait Model: Any + Send + Sync + Sized {
    /// Registry name of the model.
    const NAME: &'static str;

    fn declare(schema: &mut SchemaBuilder<Self>);

    /// Runs once per instance after construction (and after loading, for
    /// identified instances).
    fn init(&mut self) {}
}

/// A model whose attributes persist in the document store.
pub trait Storable: Model {
    /// Identifier of the persisted document, `None` when not yet assigned.
    fn identifier(&self) -> Option<String>;
}
