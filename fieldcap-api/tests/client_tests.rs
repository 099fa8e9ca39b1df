//! Integration tests for the HTTP backend client
//!
//! Each test starts a one-shot HTTP responder on a local port, points the
//! client at it, and inspects the raw request the client sent.

use bytes::Bytes;
use fieldcap_api::*;
use fieldcap_core::{Coordinates, FieldCapError};
use fieldcap_location::{LocationError, LocationSink};
use fieldcap_media::{CapturedMedia, MediaKind};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct CapturedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl CannedServer {
    /// Answer the next requests with `responses`, in order
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let request = read_request(&mut stream).await;
                captured.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });

        Self {
            base_url: format!("http://{}/api", address),
            requests,
        }
    }

    fn client(&self, token: Option<&str>) -> HttpApiClient {
        HttpApiClient::new(ApiClientConfig {
            base_url: self.base_url.clone(),
            bearer_token: token.map(str::to_string),
            ..Default::default()
        })
        .unwrap()
    }

    fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = stream.read(&mut chunk).await.unwrap();
        assert!(read > 0, "connection closed before headers");
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = find(&buffer, b"\r\n\r\n") {
            break position + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split_whitespace();
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(key, _)| key == "content-length")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await.unwrap();
        assert!(read > 0, "connection closed before body");
        buffer.extend_from_slice(&chunk[..read]);
    }

    CapturedRequest {
        method,
        path,
        headers,
        body: buffer[header_end..header_end + content_length].to_vec(),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn photo() -> CapturedMedia {
    CapturedMedia::new(
        MediaKind::Image,
        Bytes::from_static(b"\x89PNG fake image"),
        "image/png",
    )
    .unwrap()
}

// ============================================================================
// HOTEL LISTING TESTS
// ============================================================================

#[tokio::test]
async fn test_list_hotels_with_bearer_token() {
    let server = CannedServer::start(vec![(
        200,
        r#"[{"id": 1, "name": "Shivneri", "city": "Pune"}, {"id": 2, "name": "Annapurna", "is_active": false}]"#,
    )])
    .await;
    let client = server.client(Some("secret-token"));

    let hotels = client.list_hotels().await.unwrap();
    assert_eq!(hotels.len(), 2);
    assert!(hotels[0].is_active);
    assert_eq!(hotels[0].city.as_deref(), Some("Pune"));
    assert!(!hotels[1].is_active);

    let requests = server.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/api/worker/hotels");
    assert_eq!(
        requests[0].header("authorization"),
        Some("Bearer secret-token")
    );
}

#[tokio::test]
async fn test_error_body_surfaces_message() {
    let server = CannedServer::start(vec![(
        403,
        r#"{"error": "Unauthorized: Only workers can upload media"}"#,
    )])
    .await;
    let client = server.client(None);

    let error = client.list_hotels().await.unwrap_err();
    assert_eq!(
        error,
        ApiError::Status {
            status: 403,
            message: "Unauthorized: Only workers can upload media".to_string()
        }
    );
    assert!(server.requests()[0].header("authorization").is_none());
}

// ============================================================================
// UPLOAD TESTS
// ============================================================================

#[tokio::test]
async fn test_upload_sends_multipart_fields() {
    let server =
        CannedServer::start(vec![(201, r#"{"message": "Media uploaded successfully"}"#)]).await;
    let client = server.client(Some("token"));

    let receipt = client
        .upload(&UploadRequest {
            media: photo(),
            description: "Cold storage at 9C".to_string(),
            target_id: 42,
            location: Some(Coordinates::new(18.52, 73.85).unwrap()),
        })
        .await
        .unwrap();
    assert_eq!(receipt.message, "Media uploaded successfully");

    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/worker/upload_media");
    assert!(request
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));

    let body = request.body_text();
    assert!(body.contains(r#"name="file"; filename="photo.png""#));
    assert!(body.contains("Content-Type: image/png"));
    assert!(body.contains("fake image"));
    assert!(body.contains("name=\"media_type\"\r\n\r\nimage"));
    assert!(body.contains("name=\"description\"\r\n\r\nCold storage at 9C"));
    assert!(body.contains("name=\"hotel_id\"\r\n\r\n42"));
    assert!(body.contains(r#"{"latitude":18.52,"longitude":73.85}"#));
}

#[tokio::test]
async fn test_upload_without_location_omits_field() {
    let server = CannedServer::start(vec![(201, "")]).await;
    let client = server.client(None);

    let clip = CapturedMedia::new(
        MediaKind::Video,
        Bytes::from_static(b"webm clip"),
        "video/webm",
    )
    .unwrap();
    client
        .upload(&UploadRequest {
            media: clip,
            description: String::new(),
            target_id: 7,
            location: None,
        })
        .await
        .unwrap();

    let body = server.requests()[0].body_text();
    assert!(body.contains(r#"filename="recording.webm""#));
    assert!(body.contains("name=\"media_type\"\r\n\r\nvideo"));
    assert!(!body.contains("name=\"location\""));
}

#[tokio::test]
async fn test_upload_failure_maps_to_upload_failed() {
    let server =
        CannedServer::start(vec![(403, r#"{"error": "Cannot upload to inactive hotel"}"#)]).await;
    let client = server.client(None);

    let error = client
        .upload(&UploadRequest {
            media: photo(),
            description: String::new(),
            target_id: 2,
            location: None,
        })
        .await
        .unwrap_err();

    let error: FieldCapError = error.into();
    assert_eq!(error.error_code(), "UPLOAD_FAILED");
    assert_eq!(error.to_string(), "Upload failed: Cannot upload to inactive hotel");
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpApiClient::new(ApiClientConfig {
        base_url: format!("http://{}/api", address),
        ..Default::default()
    })
    .unwrap();
    let error = client.list_hotels().await.unwrap_err();
    assert!(matches!(error, ApiError::Network { .. }));
    assert!(error.is_recoverable());
}

// ============================================================================
// LOCATION SINK TESTS
// ============================================================================

#[tokio::test]
async fn test_push_then_fetch_location() {
    let server = CannedServer::start(vec![
        (200, r#"{"message": "Location updated"}"#),
        (
            200,
            r#"{"latitude": 18.52, "longitude": 73.85, "timestamp": "Tue, 03 Jun 2025 09:30:15 GMT", "timestamp_ist": "2025-06-03 15:00:15"}"#,
        ),
    ])
    .await;
    let client = server.client(Some("token"));

    client.push(18.52, 73.85).await.unwrap();
    let sample = client.fetch_latest().await.unwrap();
    assert_eq!((sample.latitude, sample.longitude), (18.52, 73.85));
    assert_eq!(sample.captured_at.to_rfc3339(), "2025-06-03T09:30:15+00:00");

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/api/location");
    let pushed: LocationPush = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        pushed,
        LocationPush {
            latitude: 18.52,
            longitude: 73.85
        }
    );
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path, "/api/location");
}

#[tokio::test]
async fn test_missing_location_is_no_stored_location() {
    let server = CannedServer::start(vec![(404, r#"{"error": "No location found"}"#)]).await;
    let client = server.client(None);

    assert_eq!(
        client.fetch_latest().await,
        Err(LocationError::NoStoredLocation)
    );
}

#[tokio::test]
async fn test_rejected_push_is_push_error() {
    let server = CannedServer::start(vec![(400, r#"{"error": "Missing coordinates"}"#)]).await;
    let client = server.client(None);

    let error = client.push(0.0, 0.0).await.unwrap_err();
    assert_eq!(
        error,
        LocationError::Push {
            reason: "HTTP 400: Missing coordinates".to_string()
        }
    );
}
