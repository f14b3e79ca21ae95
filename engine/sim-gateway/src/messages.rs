//! Message types for the SimGateway WebSocket API

use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use orbital_mechanics::{BodyCatalog, BodyId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sync_coordinator::{ControlCommand, ServerEvent};

pub const METHOD_SET_MULTIPLIER: &str = "simulation.set_multiplier";
pub const METHOD_SET_PAUSED: &str = "simulation.set_paused";
pub const METHOD_SET_TIME: &str = "simulation.set_time";
pub const METHOD_FOCUS: &str = "simulation.focus";
pub const METHOD_SYNC: &str = "simulation.sync";

/// Request and response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message ID for request/response correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,

    /// Result (for successful responses)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Error (for error responses)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

/// Error message structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u32,
    pub message: String,
}

impl Message {
    pub fn request(id: impl Into<String>, method: &str, params: serde_json::Value) -> Self {
        Self {
            id: Some(id.into()),
            method: Some(method.to_string()),
            params: Some(params),
            ..Default::default()
        }
    }

    /// Successful response to the request `id`
    pub fn accepted(id: Option<String>) -> Self {
        Self { id, result: Some(serde_json::json!({ "accepted": true })), ..Default::default() }
    }

    /// Error response to the request `id`
    pub fn failure(id: Option<String>, error: &GatewayError) -> Self {
        Self {
            id,
            error: Some(ErrorMessage { code: error.code(), message: error.to_string() }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetMultiplierParams {
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPausedParams {
    pub paused: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetTimeParams {
    /// RFC 3339 instant
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusParams {
    pub body_id: BodyId,
    /// Display name; the catalog name is used when absent
    pub body_name: Option<String>,
}

/// Turn a request into a coordinator command. Nothing here touches the clock.
pub fn parse_command(request: &Message, catalog: &BodyCatalog) -> GatewayResult<ControlCommand> {
    let method = request
        .method
        .as_deref()
        .ok_or_else(|| GatewayError::InvalidParams("missing method".to_string()))?;

    match method {
        METHOD_SET_MULTIPLIER => {
            let params: SetMultiplierParams = params(request)?;
            Ok(ControlCommand::SetMultiplier(params.value))
        }
        METHOD_SET_PAUSED => {
            let params: SetPausedParams = params(request)?;
            Ok(ControlCommand::SetPaused(params.paused))
        }
        METHOD_SET_TIME => {
            let params: SetTimeParams = params(request)?;
            let time = DateTime::parse_from_rfc3339(&params.time)
                .map_err(|e| GatewayError::InvalidParams(format!("time {:?}: {e}", params.time)))?;
            Ok(ControlCommand::SetTime(time.with_timezone(&Utc)))
        }
        METHOD_FOCUS => {
            let params: FocusParams = params(request)?;
            let body_name = match params.body_name {
                Some(name) => name,
                None => catalog
                    .get(params.body_id)
                    .map(|body| body.name.clone())
                    .ok_or_else(|| {
                        GatewayError::InvalidParams(format!("unknown body {}", params.body_id))
                    })?,
            };
            Ok(ControlCommand::Focus { body_id: params.body_id, body_name })
        }
        METHOD_SYNC => Ok(ControlCommand::RequestSync),
        other => Err(GatewayError::UnknownMethod(other.to_string())),
    }
}

/// Serialize a pushed event as a `{stream, data}` text frame
pub fn encode_event(event: &ServerEvent) -> GatewayResult<String> {
    Ok(serde_json::to_string(event)?)
}

fn params<T: DeserializeOwned>(request: &Message) -> GatewayResult<T> {
    let value = request
        .params
        .clone()
        .ok_or_else(|| GatewayError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(value).map_err(|e| GatewayError::InvalidParams(e.to_string()))
}
