use super::*;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Json, Router,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone)]
struct ServerState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

#[derive(Debug, Clone)]
struct CapturedRequest {
    path: String,
    api_key: Option<String>,
    body: serde_json::Value,
}

async fn handle_generate(
    State(state): State<ServerState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.requests.lock().await.push(CapturedRequest {
        path: uri.path().to_string(),
        api_key: headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    });
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.body.clone(),
    )
}

async fn spawn_model_server(
    status: StatusCode,
    body: serde_json::Value,
) -> anyhow::Result<(String, Arc<Mutex<Vec<CapturedRequest>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = ServerState {
        status,
        body: body.to_string(),
        requests: Arc::clone(&requests),
    };
    let app = Router::new().fallback(handle_generate).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), requests))
}

fn gateway_for(base_url: String) -> GeminiGateway {
    let mut config = GeminiConfig::new("test-key");
    config.model = "test-model".to_string();
    config.api_base_url = base_url;
    config.request_timeout = Duration::from_secs(5);
    GeminiGateway::new(config).expect("gateway")
}

fn image_response(mime_type: &str, data: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {"parts": [
                {"text": "done"},
                {"inlineData": {"mimeType": mime_type, "data": data}}
            ]}
        }]
    })
}

#[test]
fn builds_generate_content_endpoint_from_base_url() {
    let url = generate_content_url("https://example.test/proxy", "gemini-2.5-flash-image")
        .expect("url");
    assert_eq!(
        url.as_str(),
        "https://example.test/proxy/v1beta/models/gemini-2.5-flash-image:generateContent"
    );
}

#[test]
fn rejects_unparsable_base_url() {
    assert!(generate_content_url("not a url", "model").is_err());
}

#[test]
fn blocked_response_is_reported_before_missing_image() {
    let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
        "promptFeedback": {"blockReason": "SAFETY"}
    }))
    .expect("response");
    let err = image_from_response(&response).expect_err("blocked");
    assert_eq!(err.to_string(), "Blocked: SAFETY");
}

#[tokio::test]
async fn pose_variation_sends_image_and_prompt_and_returns_data_url() {
    let (base_url, requests) =
        spawn_model_server(StatusCode::OK, image_response("image/png", "UkVTVUxU"))
            .await
            .expect("spawn server");
    let gateway = gateway_for(base_url);

    let result = gateway
        .vary_pose(&ImageRef::from("data:image/jpeg;base64,QkFTRQ=="), "Profile: side view")
        .await
        .expect("pose variation");
    assert_eq!(result.as_str(), "data:image/png;base64,UkVTVUxU");

    let captured = requests.lock().await;
    assert_eq!(captured.len(), 1);
    let request = &captured[0];
    assert_eq!(request.path, "/v1beta/models/test-model:generateContent");
    assert_eq!(request.api_key.as_deref(), Some("test-key"));
    let parts = &request.body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[0]["inlineData"]["data"], "QkFTRQ==");
    assert!(parts[1]["text"]
        .as_str()
        .expect("prompt")
        .contains("pose: \"Profile: side view\""));
}

#[tokio::test]
async fn fit_garment_sends_both_images_and_color_override() {
    let (base_url, requests) =
        spawn_model_server(StatusCode::OK, image_response("image/png", "T1VU"))
            .await
            .expect("spawn server");
    let gateway = gateway_for(base_url);

    gateway
        .fit_garment(
            &ImageRef::from("data:image/png;base64,TU9ERUw="),
            &ImageRef::from("data:image/webp;base64,R0FSTUVOVA=="),
            Some("emerald green"),
        )
        .await
        .expect("fit garment");

    let captured = requests.lock().await;
    let parts = &captured[0].body["contents"][0]["parts"];
    assert_eq!(parts[0]["inlineData"]["data"], "TU9ERUw=");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/webp");
    assert!(parts[2]["text"]
        .as_str()
        .expect("prompt")
        .contains("Change garment to emerald green."));
}

#[tokio::test]
async fn http_failure_keeps_error_body_for_classification() {
    let (base_url, _) = spawn_model_server(
        StatusCode::BAD_REQUEST,
        serde_json::json!({"error": {"code": 400, "message": "Unsupported MIME type: image/tiff"}}),
    )
    .await
    .expect("spawn server");
    let gateway = gateway_for(base_url);

    let err = gateway
        .normalize_to_model(&ImageRef::from("data:image/tiff;base64,AAAA"))
        .await
        .expect_err("should fail");
    let rendered = format!("{err:#}");
    assert!(rendered.contains("HTTP 400"));
    assert!(rendered.contains("Unsupported MIME type: image/tiff"));
}

/// Answers one request with a 500 whose body is cut short before the declared length.
async fn spawn_truncating_server() -> std::io::Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(read) = socket.read(&mut chunk).await else {
                return;
            };
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let declared = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + declared {
                    break;
                }
            }
        }
        let _ = socket
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 100\r\n\r\npartial")
            .await;
        let _ = socket.shutdown().await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn unreadable_error_body_is_reported_not_dropped() {
    let base_url = spawn_truncating_server().await.expect("spawn server");
    let gateway = gateway_for(base_url);

    let err = gateway
        .normalize_to_model(&ImageRef::from("data:image/png;base64,AAAA"))
        .await
        .expect_err("should fail");
    let rendered = format!("{err:#}");
    assert!(rendered.contains("HTTP 500"), "{rendered}");
    assert!(rendered.contains("<unreadable body:"), "{rendered}");
}

#[tokio::test]
async fn response_without_image_is_invalid() {
    let (base_url, _) = spawn_model_server(
        StatusCode::OK,
        serde_json::json!({"candidates": [{"content": {"parts": [{"text": "no image"}]}}]}),
    )
    .await
    .expect("spawn server");
    let gateway = gateway_for(base_url);

    let err = gateway
        .normalize_to_model(&ImageRef::from("data:image/png;base64,AAAA"))
        .await
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<GatewayError>(),
        Some(GatewayError::InvalidResponse)
    ));
}

#[tokio::test]
async fn opaque_image_handles_are_rejected_before_any_request() {
    let (base_url, requests) =
        spawn_model_server(StatusCode::OK, image_response("image/png", "AAAA"))
            .await
            .expect("spawn server");
    let gateway = gateway_for(base_url);

    let err = gateway
        .vary_pose(&ImageRef::from("blob:local/1"), "Profile")
        .await
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<GatewayError>(),
        Some(GatewayError::InvalidInput(_))
    ));
    assert!(requests.lock().await.is_empty());
}
