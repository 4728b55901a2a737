/// Metadata introspection tests
///
/// Classification, naming, duplicate detection and the per-type cache.
/// Run with: cargo test --test introspection_tests
mod common;

use common::{Counter, Greeter};
use docmodel::prelude::*;
use docmodel::{SchemaError, ValueKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_counter_classification() -> anyhow::Result<()> {
    let meta = describe::<Counter>()?;

    assert_eq!(meta.model_name(), "Counter");
    assert!(meta.is_storable());
    assert_eq!(meta.field_kind("count"), Some(ValueKind::Int32));
    assert!(meta.has_event("increment"));
    assert!(meta.has_event("reset"));
    assert_eq!(meta.attribute_names().into_iter().collect::<Vec<_>>(), vec!["count"]);
    Ok(())
}

#[test]
fn test_accessor_and_event_names() -> anyhow::Result<()> {
    let meta = describe::<Greeter>()?;

    assert!(meta.getter_names().contains("inits"));
    assert!(meta.getter_names().contains("lastTarget"));
    assert!(meta.setter_names().contains("lastTarget"));
    assert!(meta.has_event("hello"));
    assert!(!meta.has_event("say_hello"));
    assert!(meta.has_event("echo"));
    assert!(!meta.is_storable());
    Ok(())
}

#[test]
fn test_describe_returns_cached_instance() -> anyhow::Result<()> {
    let first = describe::<Counter>()?;
    let second = describe::<Counter>()?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

static SLOW_BUILDS: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct SlowToDescribe {
    value: i64,
}

impl Model for SlowToDescribe {
    const NAME: &'static str = "SlowToDescribe";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        SLOW_BUILDS.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(20));
        schema.field("value", |m: &Self| &m.value, |m: &mut Self| &mut m.value);
    }
}

#[test]
fn test_concurrent_describe_builds_once() {
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                describe::<SlowToDescribe>().unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(SLOW_BUILDS.load(Ordering::SeqCst), 1);
    for meta in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], meta));
    }
    assert_eq!(results[0].field_kind("value"), Some(ValueKind::Int64));
}

#[derive(Default)]
struct DuplicateFields {
    a: String,
    b: String,
}

impl Model for DuplicateFields {
    const NAME: &'static str = "DuplicateFields";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("a", |m: &Self| &m.a, |m: &mut Self| &mut m.a)
            .field(Tag::new("b").named("a"), |m: &Self| &m.b, |m: &mut Self| &mut m.b);
    }
}

#[test]
fn test_duplicate_attribute_is_fatal_and_cached() {
    let err = describe::<DuplicateFields>().unwrap_err();
    assert_eq!(
        err,
        SchemaError::DuplicateAttribute {
            model: "DuplicateFields".to_string(),
            name: "a".to_string(),
        }
    );
    assert_eq!(describe::<DuplicateFields>().unwrap_err(), err);
}

#[derive(Default)]
struct DuplicateEvents;

impl Model for DuplicateEvents {
    const NAME: &'static str = "DuplicateEvents";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .event("ping", Vec::<Param>::new(), |_m: &mut Self, _args| Ok(1))
            .event(Tag::new("pong").named("ping"), Vec::<Param>::new(), |_m: &mut Self, _args| {
                Ok(2)
            });
    }
}

#[test]
fn test_duplicate_event_is_fatal() {
    assert!(matches!(
        describe::<DuplicateEvents>(),
        Err(SchemaError::DuplicateEvent { ref name, .. }) if name == "ping"
    ));
}

#[derive(Default)]
struct FieldAndGetter {
    size: i64,
}

impl Model for FieldAndGetter {
    const NAME: &'static str = "FieldAndGetter";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("size", |m: &Self| &m.size, |m: &mut Self| &mut m.size)
            .getter("getSize", |m: &Self| m.size * 2)
            .getter("get", |m: &Self| m.size);
    }
}

#[test]
fn test_field_and_getter_may_share_a_name() -> anyhow::Result<()> {
    let meta = describe::<FieldAndGetter>()?;
    assert!(meta.field_names().contains("size"));
    assert!(meta.getter_names().contains("size"));
    assert!(meta.getter_names().contains("get"));
    assert_eq!(meta.attribute_names().len(), 2);
    Ok(())
}

#[derive(Default)]
struct BlankName {
    x: i32,
}

impl Model for BlankName {
    const NAME: &'static str = "BlankName";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema.field("", |m: &Self| &m.x, |m: &mut Self| &mut m.x);
    }
}

#[test]
fn test_blank_member_name_is_rejected() {
    assert!(matches!(
        describe::<BlankName>(),
        Err(SchemaError::InvalidDeclaration { .. })
    ));
}

#[derive(Default)]
struct DottedName {
    x: i32,
}

impl Model for DottedName {
    const NAME: &'static str = "DottedName";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema.field("a.b", |m: &Self| &m.x, |m: &mut Self| &mut m.x);
    }
}

#[test]
fn test_unaddressable_attribute_name_is_rejected() {
    let err = describe::<DottedName>().unwrap_err();
    assert!(matches!(
        err,
        SchemaError::InvalidDeclaration { ref reason, .. } if reason.contains("a.b")
    ));
}

// Ancestor composition

#[derive(Default)]
struct Audited {
    created: i64,
    touches: u32,
}

impl Model for Audited {
    const NAME: &'static str = "Audited";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("created", |m: &Self| &m.created, |m: &mut Self| &mut m.created)
            .getter("getTouches", |m: &Self| m.touches)
            .event("touch", Vec::<Param>::new(), |m: &mut Self, _args| {
                m.touches += 1;
                Ok(m.touches)
            });
    }
}

#[derive(Default)]
struct Document {
    audit: Audited,
    title: String,
}

impl Model for Document {
    const NAME: &'static str = "Document";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("title", |m: &Self| &m.title, |m: &mut Self| &mut m.title)
            .inherit(|m: &Self| &m.audit, |m: &mut Self| &mut m.audit);
    }
}

#[test]
fn test_inherited_members_are_included() -> anyhow::Result<()> {
    let meta = describe::<Document>()?;
    assert!(meta.field_names().contains("created"));
    assert!(meta.field_names().contains("title"));
    assert!(meta.getter_names().contains("touches"));
    assert!(meta.has_event("touch"));

    let mut doc = Document::default();
    {
        let mut view = AttributeView::of(&mut doc)?;
        view.set("created", serde_json::json!(1700000000))?;
        assert_eq!(view.get("touches")?, Some(serde_json::json!(0)));
    }
    assert_eq!(doc.audit.created, 1_700_000_000);
    Ok(())
}

#[derive(Default)]
struct ShadowingDocument {
    audit: Audited,
    created: i64,
}

impl Model for ShadowingDocument {
    const NAME: &'static str = "ShadowingDocument";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("created", |m: &Self| &m.created, |m: &mut Self| &mut m.created)
            .inherit(|m: &Self| &m.audit, |m: &mut Self| &mut m.audit);
    }
}

#[test]
fn test_inherited_duplicate_is_fatal() {
    assert!(matches!(
        describe::<ShadowingDocument>(),
        Err(SchemaError::DuplicateAttribute { ref name, .. }) if name == "created"
    ));
}
