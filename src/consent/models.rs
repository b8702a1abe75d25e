use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentCategories {
    pub analytics: bool,
    pub marketing: bool,
    /// Strictly necessary and functional storage is on unless refused
    #[serde(default = "ConsentCategories::default_functional")]
    pub functional: bool,
}

impl ConsentCategories {
    const fn default_functional() -> bool {
        true
    }

    /// Strict parse of a submitted categories object
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or(ValidationError::InvalidCategories("categories must be an object"))?;

        let flag = |name: &'static str, message: &'static str| -> Result<Option<bool>, ValidationError> {
            match object.get(name) {
                None => Ok(None),
                Some(Value::Bool(b)) => Ok(Some(*b)),
                Some(_) => Err(ValidationError::InvalidCategories(message)),
            }
        };

        let analytics = flag("analytics", "categories.analytics must be a boolean")?
            .ok_or(ValidationError::InvalidCategories("categories.analytics is required"))?;
        let marketing = flag("marketing", "categories.marketing must be a boolean")?
            .ok_or(ValidationError::InvalidCategories("categories.marketing is required"))?;
        let functional = flag("functional", "categories.functional must be a boolean")?
            .unwrap_or_else(Self::default_functional);

        Ok(Self {
            analytics,
            marketing,
            functional,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    pub consent_id: String,
    pub domain: String,
    pub categories: ConsentCategories,
    #[serde(default)]
    pub version: Option<String>,
    /// Unix seconds of the last save
    pub timestamp: i64,
}
