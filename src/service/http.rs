use crate::service::device::Device;
use crate::service::state::{MockError, StateHandle};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::net::SocketAddr;

pub const MOCK_ACCESS_TOKEN: &str = "mock-access-token";
const TOKEN_EXPIRES_IN: u64 = 3600;

fn response_with_code(code: StatusCode, body: JsonValue) -> Response {
    let mut response = Json(body).into_response();
    *response.status_mut() = code;
    response
}

fn error_response<T: std::fmt::Display>(code: StatusCode, err: T) -> Response {
    log::warn!("{}: {err:#}", code.as_u16());
    response_with_code(code, serde_json::json!({"error": format!("{err:#}")}))
}

impl IntoResponse for MockError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(_) => error_response(StatusCode::NOT_FOUND, self),
            Self::MalformedRequest(ref reason) => {
                log::warn!("malformed command request: {reason}");
                response_with_code(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({"error": "invalid body"}),
                )
            }
            Self::Load { .. } | Self::Save { .. } => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, self)
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
}

/// Accepts any credentials and hands back a fixed token
async fn login(body: Bytes) -> Response {
    // An empty or unparseable body is fine; there just won't be an email
    let request: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();
    let email = request.email.unwrap_or_default();
    log::info!("login for {email:?}");

    response_with_code(
        StatusCode::OK,
        serde_json::json!({
            "jwt": {
                "access_token": MOCK_ACCESS_TOKEN,
                "expires_in": TOKEN_EXPIRES_IN,
            },
            "token": MOCK_ACCESS_TOKEN,
            "user": {
                "email": email,
                "id": 1,
            },
        }),
    )
}

/// Body of the `/smarthome/sensors` response.
/// Serialized directly so that raw sub-documents keep their text.
#[derive(Serialize, Debug)]
struct SensorList {
    data: Vec<Device>,
    issues: Vec<JsonValue>,
}

/// Returns `{"data": [devices], "issues": []}`.
/// Passing a non-empty `force_tcp` other than `0` simulates
/// TCP-only mode: every device is reported without fullData.
async fn list_sensors(
    State(state): State<StateHandle>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let force_tcp = params
        .get("force_tcp")
        .map(|value| !value.is_empty() && value != "0")
        .unwrap_or(false);

    let devices = if force_tcp {
        state.snapshot_with(Device::simulate_tcp_only)
    } else {
        state.snapshot()
    };

    Json(SensorList {
        data: devices,
        issues: vec![],
    })
    .into_response()
}

async fn get_sensor(
    State(state): State<StateHandle>,
    Path(key): Path<String>,
) -> Result<Response, Response> {
    let device = state
        .resolve_device(&key)
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "not found"))?;
    Ok(Json(device).into_response())
}

#[derive(Deserialize, Debug)]
pub struct CommandRequest {
    /// Absent and null are both treated as the empty command
    #[serde(default)]
    command: Option<String>,
}

impl CommandRequest {
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or_default()
    }
}

fn parse_command_request(body: &[u8]) -> Result<CommandRequest, MockError> {
    serde_json_path_to_error::from_slice(body)
        .map_err(|err| MockError::MalformedRequest(err.to_string()))
}

/// Applies a command to the device identified by `key`
async fn post_command(
    State(state): State<StateHandle>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Response, MockError> {
    let request = parse_command_request(&body)?;
    let device = state.apply_command(&key, request.command())?;

    Ok(response_with_code(
        StatusCode::OK,
        serde_json::json!({
            "success": true,
            "message": "command applied",
            "device": device.device_id,
        }),
    ))
}

fn build_router(state: StateHandle) -> Router {
    Router::new()
        .route("/auth/v4/login", post(login))
        .route("/smarthome/sensors", get(list_sensors))
        .route("/smarthome/sensors/{deviceMac}", get(get_sensor))
        .route("/sensor/{deviceMac}/commands", post(post_command))
        .with_state(state)
}

pub async fn bind_http_server(
    state: StateHandle,
    addr: SocketAddr,
) -> anyhow::Result<(SocketAddr, impl std::future::Future<Output = ()>)> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind_http_server: binding to {addr}"))?;
    let addr = listener.local_addr()?;
    let server = async move {
        if let Err(err) = axum::serve(listener, app).await {
            log::error!("http server stopped: {err:#}");
        }
    };
    Ok((addr, server))
}

pub async fn run_http_server(state: StateHandle, port: u16) -> anyhow::Result<()> {
    let (addr, server) = bind_http_server(state, SocketAddr::from(([0, 0, 0, 0], port))).await?;
    log::info!("mock server listening on {addr}");
    server.await;
    Ok(())
}
