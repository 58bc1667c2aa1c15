#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Json, Path};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const STREAM_CHUNKS: [&str; 3] = ["Function", " calling", " works"];
pub const CHUNK_DELAY_MS: u64 = 20;

/// Bind `app` on an ephemeral port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Address nothing is listening on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// vLLM-like server. The `model` field selects behaviour: `broken` answers
/// 500, `slow` stalls for two seconds, `binary` streams bytes that are not
/// UTF-8, anything else succeeds.
pub fn completions_server() -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/v1/completions", post(completions))
}

async fn completions(Json(body): Json<Value>) -> Response {
    match body["model"].as_str() {
        Some("broken") => return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        Some("slow") => tokio::time::sleep(Duration::from_secs(2)).await,
        _ => {}
    }

    if body["stream"] == true && body["model"] == "binary" {
        return binary_sse_response();
    }
    if body["stream"] == true {
        return sse_response();
    }

    let prompt = body["prompt"].as_str().unwrap_or_default();
    if prompt.contains("explode") {
        return (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response();
    }

    // evaluation prompts must carry the deterministic settings
    let eval_prompt = prompt.contains("<|im_start|>");
    if eval_prompt && (body["max_tokens"] != 512 || body["stop"][0] != "<|im_end|>") {
        return (StatusCode::BAD_REQUEST, "bad evaluation settings").into_response();
    }

    let text = if prompt.contains("User request: Weather") {
        "  {\"function\": \"get_weather\", \"city\": \"Paris\"}\n"
    } else if prompt.contains("User request: Stock") {
        "Sure! {\"name\": \"get_stock\", \"arguments\": {}}"
    } else {
        "one two three four five"
    };

    Json(json!({
        "id": "cmpl-1",
        "object": "text_completion",
        "choices": [{"index": 0, "text": text, "finish_reason": "stop"}]
    }))
    .into_response()
}

fn sse_response() -> Response {
    let events = STREAM_CHUNKS
        .iter()
        .map(|text| format!("data: {}\n\n", json!({"choices": [{"text": text}]})))
        .chain(std::iter::once("data: [DONE]\n\n".to_string()));

    let body = futures::stream::iter(events).then(|event| async move {
        tokio::time::sleep(Duration::from_millis(CHUNK_DELAY_MS)).await;
        Ok::<_, std::io::Error>(event)
    });

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

fn binary_sse_response() -> Response {
    let events: [&'static [u8]; 2] = [b"data: {\"text\": \"\xff\xfe\"}\n\n", b"data: [DONE]\n\n"];
    let body = futures::stream::iter(events).map(|event| Ok::<_, std::io::Error>(event.to_vec()));

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

/// Triton-like server answering the KServe v2 infer route.
pub fn triton_server(ready: bool) -> Router {
    let status = match ready {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };
    Router::new()
        .route("/v2/health/ready", get(move || async move { status }))
        .route("/v2/models/{model}/infer", post(triton_infer))
}

async fn triton_infer(Path(model): Path<String>, Json(body): Json<Value>) -> Response {
    let inputs = &body["inputs"];
    let well_formed = inputs[0]["name"] == "prompt"
        && inputs[0]["datatype"] == "BYTES"
        && inputs[0]["shape"] == json!([1])
        && inputs[1]["name"] == "max_tokens"
        && inputs[1]["datatype"] == "INT32"
        && inputs[1]["data"][0].is_u64();
    if !well_formed {
        return (StatusCode::BAD_REQUEST, "malformed inputs").into_response();
    }

    let prompt = inputs[0]["data"][0].as_str().unwrap_or_default();
    Json(json!({
        "model_name": model,
        "outputs": [{
            "name": "text_output",
            "datatype": "BYTES",
            "shape": [1],
            "data": [format!("{} answered {}", model, prompt)]
        }]
    }))
    .into_response()
}
