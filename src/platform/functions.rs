//! Function calls delivered to the external service.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::platform::logs::{AppLog, AppLogSink};
use crate::platform::{PlatformError, PlatformResult};
use crate::upstream::{Upstream, FUNCTION_PATH};

/// Key wrapping parameters that are not an object or array.
pub const WRAPPED_KEY: &str = "wrapped";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub function_name: Option<String>,
    pub function_id: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FunctionCall {
    /// Body posted to the service. Scalar and null parameters are wrapped.
    pub fn to_payload(&self) -> Value {
        let params = match &self.params {
            Value::Object(_) | Value::Array(_) => self.params.clone(),
            other => json!({ WRAPPED_KEY: other }),
        };

        let mut payload = self.extra.clone();
        payload.insert("functionName".to_string(), json!(self.function_name));
        payload.insert("functionId".to_string(), json!(self.function_id));
        payload.insert("params".to_string(), params);
        Value::Object(payload)
    }
}

/// Deliver `call` and return the service's `data` field, or `{}`.
pub async fn invoke(upstream: Option<&dyn Upstream>, logs: &dyn AppLogSink, call: FunctionCall) -> PlatformResult<Value> {
    let Some(upstream) = upstream else {
        return Err(PlatformError::NoUpstream);
    };
    let name = call.function_name.clone().unwrap_or_else(|| "-".to_string());
    let id = call.function_id.clone().unwrap_or_else(|| "-".to_string());
    tracing::info!(function = %name, id = %id, "Function request");

    match upstream.post_json(FUNCTION_PATH, &call.to_payload()).await {
        Ok(response) => {
            tracing::info!(function = %name, id = %id, "Function response received");
            Ok(match response.get("data") {
                Some(Value::Null) | None => Value::Object(Map::new()),
                Some(data) => data.clone(),
            })
        }
        Err(e) => {
            logs.record(AppLog::error(format!(
                "Exception when try to execute function on service: {}",
                e
            )))
            .await;
            Err(PlatformError::Upstream(e))
        }
    }
}
