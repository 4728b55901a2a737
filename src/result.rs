use crate::schema::{Model, SchemaBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope handed back to callers: `code` 0 on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonResult {
    pub code: i32,
    pub msg: Option<String>,
    pub data: Value,
}

impl CommonResult {
    pub const SUCCESS: i32 = 0;
    pub const ERROR: i32 = 1;

    pub fn success() -> Self {
        Self {
            code: Self::SUCCESS,
            msg: Some("success".to_string()),
            data: Value::Null,
        }
    }

    pub fn success_with(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            ..Self::success()
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::error_with_code(Self::ERROR, msg)
    }

    pub fn error_with_code(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: Some(msg.into()),
            data: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }
}

impl Model for CommonResult {
    const NAME: &'static str = "CommonResult";

    fn declare(schema: &mut SchemaBuilder<Self>) {
        schema
            .field("code", |r: &Self| &r.code, |r: &mut Self| &mut r.code)
            .field("msg", |r: &Self| &r.msg, |r: &mut Self| &mut r.msg)
            .field("data", |r: &Self| &r.data, |r: &mut Self| &mut r.data);
    }
}
