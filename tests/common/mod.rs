//! Model fixtures shared by the integration tests.
#![allow(dead_code)]

use docmodel::prelude::*;

/// Integer counter persisted under an optional identifier.
#[derive(Debug, Default)]
pub struct Counter {
    pub id: Option<String>,
    pub count: i32,
}

impl Counter {
    pub fn identified(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            count: 0,
        }
    }
}

impl Model for Counter {
    const NAME: &'static str = "Counter";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .storable()
            .field("count", |c: &Counter| &c.count, |c: &mut Counter| &mut c.count)
            .event("increment", [Param::long("by")], |c: &mut Counter, args| {
                c.count += args.long("by")? as i32;
                Ok(c.count)
            })
            .event("reset", Vec::<Param>::new(), |c: &mut Counter, _args| {
                c.count = 0;
                Ok(())
            });
    }
}

impl Storable for Counter {
    fn identifier(&self) -> Option<String> {
        self.id.clone()
    }
}

/// Membership record used for condition queries.
#[derive(Debug, Default)]
pub struct Member {
    pub id: Option<String>,
    pub status: String,
    pub tier: String,
    pub level: i64,
}

impl Model for Member {
    const NAME: &'static str = "Member";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .storable()
            .field("status", |m: &Member| &m.status, |m: &mut Member| &mut m.status)
            .field("tier", |m: &Member| &m.tier, |m: &mut Member| &mut m.tier)
            .field("level", |m: &Member| &m.level, |m: &mut Member| &mut m.level);
    }
}

impl Storable for Member {
    fn identifier(&self) -> Option<String> {
        self.id.clone()
    }
}

/// Non-storable model with an init hook and accessor-backed attributes.
#[derive(Debug, Default)]
pub struct Greeter {
    pub greeting: String,
    pub inits: u32,
    pub last_target: String,
}

impl Model for Greeter {
    const NAME: &'static str = "Greeter";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("greeting", |g: &Greeter| &g.greeting, |g: &mut Greeter| &mut g.greeting)
            .getter("getInits", |g: &Greeter| g.inits)
            .getter("getLastTarget", |g: &Greeter| g.last_target.clone())
            .setter("setLastTarget", |g: &mut Greeter, target: String| {
                g.last_target = target
            })
            .event(
                Tag::new("say_hello").named("hello"),
                [Param::text("target").named("name")],
                |g: &mut Greeter, args| {
                    let target = args.text("target")?.to_string();
                    g.last_target = target.clone();
                    Ok(format!("{}, {}!", g.greeting, target))
                },
            )
            .event_with_payload("echo", |_g: &mut Greeter, payload: &EventPayload| {
                Ok(payload.keys().count())
            });
    }

    fn init(&mut self) {
        self.inits += 1;
        if self.greeting.is_empty() {
            self.greeting = "Hello".to_string();
        }
    }
}

/// Storable model whose events persist through the dispatch context.
#[derive(Debug, Default)]
pub struct Account {
    pub id: Option<String>,
    pub email: String,
    pub registered: bool,
}

impl Model for Account {
    const NAME: &'static str = "Account";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .storable()
            .field("email", |a: &Account| &a.email, |a: &mut Account| &mut a.email)
            .field(
                "registered",
                |a: &Account| &a.registered,
                |a: &mut Account| &mut a.registered,
            )
            .event_async(
                "register",
                [Param::text("id"), Param::text("email")],
                |account: &mut Account, args, ctx| {
                    Box::pin(async move {
                        account.id = Some(args.text("id")?.to_string());
                        account.email = args.text("email")?.to_string();
                        account.registered = true;
                        ctx.store()?.save_model(account).await
                    })
                },
            )
            .event_async(
                "refresh",
                Vec::<Param>::new(),
                |account: &mut Account, _args, ctx| {
                    Box::pin(async move {
                        let Some(id) = account.identifier() else {
                            return Ok(false);
                        };
                        ctx.store()?.fetch_model(&id, account).await
                    })
                },
            );
    }
}

impl Storable for Account {
    fn identifier(&self) -> Option<String> {
        self.id.clone()
    }
}
