use super::{EventPayload, PayloadValue, StreamPart};
use crate::core::value::json_type_name;
use crate::core::{ModelError, Result};
use serde_json::Value;

/// Declared target type of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Text,
    Int,
    Long,
    Stream,
    /// Passed through unchanged.
    Raw,
}

/// One named handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    member: &'static str,
    lookup: Option<&'static str>,
    ty: ParamType,
}

impl Param {
    pub const fn new(member: &'static str, ty: ParamType) -> Self {
        Self {
            member,
            lookup: None,
            ty,
        }
    }

    pub const fn text(member: &'static str) -> Self {
        Self::new(member, ParamType::Text)
    }

    pub const fn int(member: &'static str) -> Self {
        Self::new(member, ParamType::Int)
    }

    pub const fn long(member: &'static str) -> Self {
        Self::new(member, ParamType::Long)
    }

    pub const fn stream(member: &'static str) -> Self {
        Self::new(member, ParamType::Stream)
    }

    pub const fn raw(member: &'static str) -> Self {
        Self::new(member, ParamType::Raw)
    }

    /// Looks the value up under `key` instead of the member name.
    pub const fn named(mut self, key: &'static str) -> Self {
        self.lookup = Some(key);
        self
    }

    pub fn member(&self) -> &'static str {
        self.member
    }

    pub fn param_type(&self) -> ParamType {
        self.ty
    }

    /// Payload key this parameter is resolved from.
    pub fn lookup_name(&self) -> &'static str {
        self.lookup
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(self.member)
    }
}

/// A payload value converted to its parameter's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Text(String),
    Int(i32),
    Long(i64),
    Stream(StreamPart),
    Raw(PayloadValue),
}

impl BoundValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Stream(_) => "stream",
            Self::Raw(_) => "raw",
        }
    }
}

/// Arguments bound for one handler invocation, addressed by member name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    values: Vec<(&'static str, BoundValue)>,
}

impl BoundArgs {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&BoundValue> {
        self.values.get(index).map(|(_, value)| value)
    }

    pub fn get(&self, member: &str) -> Result<&BoundValue> {
        self.values
            .iter()
            .find(|(name, _)| *name == member)
            .map(|(_, value)| value)
            .ok_or_else(|| ModelError::handler(format!("no parameter '{}' declared", member)))
    }

    pub fn text(&self, member: &str) -> Result<&str> {
        match self.get(member)? {
            BoundValue::Text(value) => Ok(value),
            other => Err(Self::mismatch(member, "text", other)),
        }
    }

    pub fn int(&self, member: &str) -> Result<i32> {
        match self.get(member)? {
            BoundValue::Int(value) => Ok(*value),
            other => Err(Self::mismatch(member, "int", other)),
        }
    }

    pub fn long(&self, member: &str) -> Result<i64> {
        match self.get(member)? {
            BoundValue::Long(value) => Ok(*value),
            BoundValue::Int(value) => Ok(i64::from(*value)),
            other => Err(Self::mismatch(member, "long", other)),
        }
    }

    pub fn stream(&self, member: &str) -> Result<&StreamPart> {
        match self.get(member)? {
            BoundValue::Stream(part) => Ok(part),
            other => Err(Self::mismatch(member, "stream", other)),
        }
    }

    pub fn raw(&self, member: &str) -> Result<&PayloadValue> {
        match self.get(member)? {
            BoundValue::Raw(value) => Ok(value),
            other => Err(Self::mismatch(member, "raw", other)),
        }
    }

    fn mismatch(member: &str, wanted: &str, found: &BoundValue) -> ModelError {
        ModelError::TypeMismatch(format!(
            "parameter '{}' is bound as {}, not {}",
            member,
            found.type_name(),
            wanted
        ))
    }
}

/// Resolves every declared parameter from the payload.
///
/// Fails on the first missing (or JSON null) value, before anything is
/// handed to the handler.
pub(crate) fn bind(params: &[Param], payload: &EventPayload) -> Result<BoundArgs> {
    let mut values = Vec::with_capacity(params.len());

    for param in params {
        let key = param.lookup_name();
        let raw = match payload.get(key) {
            Some(value) if !value.is_null() => value,
            _ => return Err(ModelError::MissingParameter(key.to_string())),
        };
        values.push((param.member, convert(key, param.ty, raw)?));
    }

    Ok(BoundArgs { values })
}

fn convert(key: &str, ty: ParamType, raw: &PayloadValue) -> Result<BoundValue> {
    match ty {
        ParamType::Text => to_text(key, raw).map(BoundValue::Text),
        ParamType::Int => {
            let value = to_integer(key, raw)?;
            i32::try_from(value)
                .map(BoundValue::Int)
                .map_err(|_| conversion(key, format!("{} is out of range for int", value)))
        }
        ParamType::Long => to_integer(key, raw).map(BoundValue::Long),
        ParamType::Stream => match raw {
            PayloadValue::Stream(part) => Ok(BoundValue::Stream(part.clone())),
            PayloadValue::Json(_) => Err(conversion(key, "type error, need stream")),
        },
        ParamType::Raw => Ok(BoundValue::Raw(raw.clone())),
    }
}

fn to_text(key: &str, raw: &PayloadValue) -> Result<String> {
    match raw {
        PayloadValue::Stream(part) => part
            .read_to_string()
            .map_err(|err| conversion(key, format!("stream is not UTF-8 text: {}", err))),
        PayloadValue::Json(Value::String(text)) => Ok(text.clone()),
        PayloadValue::Json(other) => Ok(other.to_string()),
    }
}

pub(crate) fn to_integer(key: &str, raw: &PayloadValue) -> Result<i64> {
    match raw {
        PayloadValue::Stream(_) | PayloadValue::Json(Value::String(_)) => {
            let text = to_text(key, raw)?;
            text.trim()
                .parse::<i64>()
                .map_err(|err| conversion(key, format!("'{}' is not an integer: {}", text, err)))
        }
        PayloadValue::Json(Value::Number(number)) => number
            .as_i64()
            .ok_or_else(|| conversion(key, format!("{} is not a 64-bit integer", number))),
        PayloadValue::Json(other) => Err(conversion(
            key,
            format!("cannot convert {} to an integer", json_type_name(other)),
        )),
    }
}

fn conversion(key: &str, reason: impl Into<String>) -> ModelError {
    ModelError::ParameterConversion {
        name: key.to_string(),
        reason: reason.into(),
    }
}
