//! Command reply payload: `{ "success": bool, "error"?: code }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, RelayError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn err(kind: ErrorKind) -> Self {
        Self {
            success: false,
            error: Some(kind.as_str().to_string()),
        }
    }

    /// Parse a reply out of an envelope's content.
    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }

    /// Success as `Ok`, failure as the error carried in the payload.
    pub fn into_result(self) -> Result<(), RelayError> {
        if self.success {
            return Ok(());
        }
        Err(match self.error {
            Some(code) => RelayError::from_code(&code),
            None => RelayError::Invalid("INVALID".into()),
        })
    }
}

impl From<Reply> for Value {
    fn from(r: Reply) -> Self {
        let mut map = serde_json::Map::new();
        map.insert("success".into(), Value::Bool(r.success));
        if let Some(e) = r.error {
            map.insert("error".into(), Value::String(e));
        }
        Value::Object(map)
    }
}
