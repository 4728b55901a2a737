use crate::core::{ModelError, Result};
use serde_json::{Number, Value};

/// Declared storage shape of an attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Boolean,
    Text,
    List,
    Json,
}

impl ValueKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::UInt32 => "UINT32",
            Self::UInt64 => "UINT64",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
            Self::List => "LIST",
            Self::Json => "JSON",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::Int64 | Self::UInt32 | Self::UInt64
        )
    }
}

/// Conversion between a typed attribute slot and its JSON form.
///
/// Integer implementations coerce any incoming JSON number to the slot's
/// declared width: values arriving as generic numbers (for instance after a
/// JSON round trip, where every integer is 64-bit) are narrowed or widened
/// with `as` semantics rather than rejected.
pub trait AttributeValue: Sized + Send + Sync + 'static {
    const KIND: ValueKind;

    fn to_json(&self) -> Value;

    fn from_json(value: Value) -> Result<Self>;
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(kind: ValueKind, value: &Value) -> ModelError {
    ModelError::TypeMismatch(format!(
        "cannot store {} in {} attribute",
        json_type_name(value),
        kind.type_name()
    ))
}

fn number_as_i64(number: &Number) -> i64 {
    if let Some(v) = number.as_i64() {
        v
    } else if let Some(v) = number.as_u64() {
        v as i64
    } else {
        number.as_f64().map(|v| v as i64).unwrap_or_default()
    }
}

macro_rules! integer_attribute {
    ($ty:ty, $kind:expr) => {
        impl AttributeValue for $ty {
            const KIND: ValueKind = $kind;

            fn to_json(&self) -> Value {
                Value::from(*self)
            }

            fn from_json(value: Value) -> Result<Self> {
                match &value {
                    Value::Number(n) => Ok(number_as_i64(n) as $ty),
                    _ => Err(mismatch(Self::KIND, &value)),
                }
            }
        }
    };
}

integer_attribute!(i32, ValueKind::Int32);
integer_attribute!(i64, ValueKind::Int64);
integer_attribute!(u32, ValueKind::UInt32);
integer_attribute!(u64, ValueKind::UInt64);

impl AttributeValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_json(&self) -> Value {
        Number::from_f64(*self)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    fn from_json(value: Value) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| mismatch(Self::KIND, &value))
    }
}

impl AttributeValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_json(value: Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| mismatch(Self::KIND, &value))
    }
}

impl AttributeValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}

impl AttributeValue for Value {
    const KIND: ValueKind = ValueKind::Json;

    fn to_json(&self) -> Value {
        self.clone()
    }

    fn from_json(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    const KIND: ValueKind = T::KIND;

    fn to_json(&self) -> Value {
        match self {
            Some(v) => v.to_json(),
            None => Value::Null,
        }
    }

    fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_json(other).map(Some),
        }
    }
}

impl<T: AttributeValue> AttributeValue for Vec<T> {
    const KIND: ValueKind = ValueKind::List;

    fn to_json(&self) -> Value {
        Value::Array(self.iter().map(AttributeValue::to_json).collect())
    }

    fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_json).collect(),
            other => Err(mismatch(Self::KIND, &other)),
        }
    }
}
