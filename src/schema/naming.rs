//! Lookup-name derivation for declared members.
//!
//! An explicit, non-blank tag name always wins. Otherwise fields and events
//! use the member name as-is, and accessor methods drop their leading
//! `get`/`set` (or `get_`/`set_`) and lower-case the first remaining letter.

/// Member tag: the declaring member's own name plus an optional explicit
/// lookup name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    member: &'static str,
    explicit: Option<&'static str>,
}

impl Tag {
    pub const fn new(member: &'static str) -> Self {
        Self {
            member,
            explicit: None,
        }
    }

    /// Overrides the derived lookup name.
    pub const fn named(mut self, name: &'static str) -> Self {
        self.explicit = Some(name);
        self
    }

    pub fn member(&self) -> &'static str {
        self.member
    }

    /// Explicit name, ignoring blank overrides.
    pub fn explicit(&self) -> Option<&'static str> {
        self.explicit.filter(|name| !name.trim().is_empty())
    }
}

impl From<&'static str> for Tag {
    fn from(member: &'static str) -> Self {
        Tag::new(member)
    }
}

pub fn field_name(tag: &Tag) -> String {
    tag.explicit().unwrap_or(tag.member()).to_string()
}

pub fn event_name(tag: &Tag) -> String {
    tag.explicit().unwrap_or(tag.member()).to_string()
}

pub fn getter_name(tag: &Tag) -> String {
    match tag.explicit() {
        Some(name) => name.to_string(),
        None => strip_accessor_prefix(tag.member(), "get"),
    }
}

pub fn setter_name(tag: &Tag) -> String {
    match tag.explicit() {
        Some(name) => name.to_string(),
        None => strip_accessor_prefix(tag.member(), "set"),
    }
}

fn strip_accessor_prefix(member: &str, prefix: &str) -> String {
    if member == prefix {
        return member.to_string();
    }

    let Some(rest) = member.strip_prefix(prefix) else {
        return member.to_string();
    };
    let rest = rest.strip_prefix('_').unwrap_or(rest);

    let mut chars = rest.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => member.to_string(),
    }
}
