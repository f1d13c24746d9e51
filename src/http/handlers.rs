//! Route handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures_util::StreamExt;

use super::error::HttpError;
use super::AppState;
use crate::codec::ROWDAT_1_CONTENT_TYPE;
use crate::error::ExtFuncError;
use crate::sql::{create_functions_sql, function_info};
use crate::timer::{CallTimer, CALL_FUNCTION, FORMAT_OUTPUT, PARSE_INPUT, RECEIVE_DATA, SEND_RESPONSE};

pub const FUNCTION_NAME_HEADER: &str = "s2-ef-name";
pub const DATA_VERSION_HEADER: &str = "s2-ef-version";
pub const ACCEPTS_HEADER: &str = "accepts";

const DEFAULT_HOST: &str = "localhost:80";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Media type without parameters: `application/json; charset=utf-8` →
/// `application/json`.
fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or(value).trim()
}

/// Configured URL, or `http://{host}/invoke` from the request's Host header.
fn service_url(state: &AppState, headers: &HeaderMap) -> String {
    state.url.clone().unwrap_or_else(|| {
        let host = header_str(headers, header::HOST.as_str()).unwrap_or(DEFAULT_HOST);
        format!("http://{host}/invoke")
    })
}

async fn read_body(body: Body) -> Result<Vec<u8>, HttpError> {
    let mut data = Vec::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(error = %e, "request_body_failed");
            HttpError::new(StatusCode::BAD_REQUEST, format!("Failed to read request body: {e}"))
        })?;
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// POST /invoke
///
/// Decode with the `content-type` codec, call the function named by
/// `s2-ef-name`, encode with the `accepts` codec.
pub async fn invoke(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, HttpError> {
    let received = Instant::now();
    let content_type = media_type(
        header_str(&headers, header::CONTENT_TYPE.as_str()).unwrap_or(ROWDAT_1_CONTENT_TYPE),
    )
    .to_string();
    let accepts = header_str(&headers, ACCEPTS_HEADER)
        .map_or_else(|| content_type.clone(), |v| media_type(v).to_string());
    let version = header_str(&headers, DATA_VERSION_HEADER)
        .unwrap_or(state.data_version.as_str())
        .to_string();
    let name = header_str(&headers, FUNCTION_NAME_HEADER)
        .ok_or_else(|| HttpError::internal(format!("Missing {FUNCTION_NAME_HEADER} header")))?
        .to_string();

    let data = read_body(body).await?;
    let mut timer = CallTimer::start(name.as_str());
    timer.record(RECEIVE_DATA, received.elapsed());

    let input_codec = state.codecs.lookup(&content_type, &version)?;
    let output_codec = state.codecs.lookup(&accepts, &version)?;
    let endpoint = state.registry.get(&name).map_err(ExtFuncError::from)?;
    let response_type = output_codec.content_type();

    tracing::debug!(
        function = %name,
        request_id = %timer.request_id(),
        input = input_codec.name(),
        output = output_codec.name(),
        bytes = data.len(),
        "invoke_received"
    );

    let (output, mut timer) = state
        .run(move || {
            let payload = timer.time(PARSE_INPUT, || {
                input_codec.load(endpoint.input_shape(), &endpoint.args, &data)
            })?;
            let result = timer.time(CALL_FUNCTION, || endpoint.invoke(payload))?;
            let output = timer.time(FORMAT_OUTPUT, || {
                output_codec.dump_single(&endpoint.returns, &result)
            })?;
            Ok((output, timer))
        })
        .await?;

    let response = timer.time(SEND_RESPONSE, || {
        ([(header::CONTENT_TYPE, response_type)], output).into_response()
    });
    timer.finish(state.metrics);
    Ok(response)
}

/// GET /show/create_function
///
/// One statement per endpoint, or only the endpoint named by `s2-ef-name`.
pub async fn show_create_function(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let url = service_url(&state, &headers);
    let options = state.sql_options(url);
    let statements = create_functions_sql(
        &state.registry,
        &options,
        header_str(&headers, FUNCTION_NAME_HEADER),
    )?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        statements.join("\n"),
    )
        .into_response())
}

/// GET /show/function_info and GET /
pub async fn show_function_info(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let url = service_url(&state, &headers);
    let info = function_info(&state.registry, &state.sql_options(url))?;
    Ok(Json(info).into_response())
}

/// GET /status
pub async fn status() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
