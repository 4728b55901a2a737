use crate::core::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Document store configuration
///
/// Column bounds mirror the persisted table layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Table holding every document
    pub table_name: String,

    /// Maximum identifier length in characters
    pub max_identifier_len: usize,

    /// Maximum model name length in characters
    pub max_model_name_len: usize,

    /// Maximum serialized attribute length in bytes
    pub max_attributes_len: usize,

    /// Log every statement with its bindings at debug level
    pub log_statements: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "t_model".to_string(),
            max_identifier_len: 128,
            max_model_name_len: 128,
            max_attributes_len: 1024,
            log_statements: true,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name
    pub fn table_name(mut self, table_name: &str) -> Self {
        self.table_name = table_name.to_string();
        self
    }

    pub fn max_identifier_len(mut self, max: usize) -> Self {
        self.max_identifier_len = max;
        self
    }

    pub fn max_model_name_len(mut self, max: usize) -> Self {
        self.max_model_name_len = max;
        self
    }

    pub fn max_attributes_len(mut self, max: usize) -> Self {
        self.max_attributes_len = max;
        self
    }

    /// Enable or disable statement logging
    pub fn log_statements(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Parse a (possibly partial) JSON document over the defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use docmodel::storage::StoreConfig;
    ///
    /// let config = StoreConfig::from_json_str(r#"{"table_name": "documents"}"#).unwrap();
    /// assert_eq!(config.table_name, "documents");
    /// assert_eq!(config.max_attributes_len, 1024);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|reason| ModelError::Storage(format!("invalid store config: {}", reason)))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        let valid_name = !self.table_name.is_empty()
            && self
                .table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(format!("'{}' is not a valid table name", self.table_name));
        }

        if self.max_identifier_len == 0 || self.max_model_name_len == 0 {
            return Err("column bounds must be > 0".to_string());
        }

        if self.max_attributes_len < 2 {
            return Err("max_attributes_len must fit an empty document".to_string());
        }

        Ok(())
    }
}
