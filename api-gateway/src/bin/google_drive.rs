//! Google Drive Lambda - Lists, previews and attaches transcript files from a
//! user's Google Drive.
//!
//! Endpoints:
//! - POST /api/google/drive/backfill - List transcript-like files
//! - POST /api/google/drive/attach_to_meeting - Download a file and upload it to a meeting
//! - POST /api/google/drive/preview_text - Return a text preview of a file
//!
//! Every call acts with the caller's stored Google access token.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::{Deserialize, Serialize};
use shared::drive::{truncate_preview, DOWNLOAD_TIMEOUT, PREVIEW_TIMEOUT};
use shared::http::{error_response, header_str, json_response, parse_json_body, strip_stage};
use shared::meetings::DEFAULT_TRANSCRIPT_NAME;
use shared::{
    Config, DownloadMethod, DriveClient, DriveFile, HeaderIdentity, IdentityResolver,
    MeetingsClient, PgUserStore, UserStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Attach request
#[derive(Debug, Deserialize, Validate)]
struct AttachDriveRequest {
    meeting_id: i64,
    #[validate(length(min = 1, message = "file_id must not be empty"))]
    file_id: String,
    mime_type: Option<String>,
    name: Option<String>,
}

/// Preview request
#[derive(Debug, Deserialize, Validate)]
struct PreviewRequest {
    #[validate(length(min = 1, message = "file_id must not be empty"))]
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct BackfillResponse {
    files: Vec<DriveFile>,
}

#[derive(Debug, Serialize)]
struct AttachResponse {
    ok: bool,
}

#[derive(Debug, Serialize)]
struct PreviewResponse {
    text: String,
}

/// Application state
struct AppState {
    users: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityResolver>,
    drive: DriveClient,
    meetings: MeetingsClient,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env();
        let db_pool = shared::db::create_pool(&config).await?;
        let http_client = reqwest::Client::new();

        Ok(Self {
            users: Arc::new(PgUserStore::new(db_pool)),
            identity: Arc::new(HeaderIdentity::header_or_cookie()),
            drive: DriveClient::new(http_client.clone(), config.drive_api_base),
            meetings: MeetingsClient::new(http_client, config.internal_api_base),
        })
    }
}

/// Resolve the caller and return their Google access token.
async fn access_token(state: &AppState, event: &Request) -> shared::Result<String> {
    let not_authenticated = || shared::Error::Unauthenticated("Not authenticated".to_string());

    let user_id = state
        .identity
        .caller_id(event.headers())
        .ok_or_else(not_authenticated)?;

    let user = state
        .users
        .find_user(user_id)
        .await?
        .ok_or_else(not_authenticated)?;

    user.access_token().map(str::to_string).ok_or_else(|| {
        shared::Error::BadRequest("Google account not connected for this user.".to_string())
    })
}

fn validated<T: Validate>(request: T) -> shared::Result<T> {
    request
        .validate()
        .map_err(|e| shared::Error::Validation(e.to_string()))?;
    Ok(request)
}

async fn backfill(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let token = access_token(state, event).await?;
    let files = state.drive.list_transcripts(&token).await?;

    json_response(200, &BackfillResponse { files })
}

async fn attach_to_meeting(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let token = access_token(state, event).await?;
    let request: AttachDriveRequest = validated(parse_json_body(event.body())?)?;

    let method = DownloadMethod::for_mime(request.mime_type.as_deref());
    let content = state
        .drive
        .download(&token, &request.file_id, method, DOWNLOAD_TIMEOUT)
        .await?;

    if content.is_empty() {
        return Err(shared::Error::BadRequest("Drive file is empty.".to_string()));
    }

    let filename = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_TRANSCRIPT_NAME);

    info!(
        meeting_id = request.meeting_id,
        file_id = %request.file_id,
        bytes = content.len(),
        "Attaching Drive file to meeting"
    );

    state
        .meetings
        .upload_transcript(
            request.meeting_id,
            filename,
            content,
            header_str(event.headers(), "cookie"),
        )
        .await?;

    json_response(200, &AttachResponse { ok: true })
}

async fn preview_text(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let token = access_token(state, event).await?;
    let request: PreviewRequest = validated(parse_json_body(event.body())?)?;

    let method = DownloadMethod::for_mime(request.mime_type.as_deref());
    let text = state
        .drive
        .download_text(&token, &request.file_id, method, PREVIEW_TIMEOUT)
        .await?;

    json_response(
        200,
        &PreviewResponse {
            text: truncate_preview(text),
        },
    )
}

async fn route(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let method = event.method().as_str();
    let path = strip_stage(event.uri().path()).trim_end_matches('/');

    info!("Google Drive request: {} {}", method, path);

    match (method, path) {
        ("POST", "/google/drive/backfill") => backfill(state, event).await,
        ("POST", "/google/drive/attach_to_meeting") => attach_to_meeting(state, event).await,
        ("POST", "/google/drive/preview_text") => preview_text(state, event).await,
        _ => Err(shared::Error::NotFound("Not found".to_string())),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    match route(&state, &event).await {
        Ok(response) => Ok(response),
        Err(e) => {
            if e.is_client_error() {
                warn!(status = e.status_code(), error = %e, "Google Drive request rejected");
            } else {
                error!(status = e.status_code(), error = %e, "Google Drive request failed");
            }
            Ok(error_response(&e))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lambda_http::http;
    use serde_json::{json, Value};
    use shared::drive::{PREVIEW_CHAR_LIMIT, TRUNCATION_MARKER};
    use shared::User;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StaticUsers(HashMap<i64, User>);

    #[async_trait]
    impl UserStore for StaticUsers {
        async fn find_user(&self, id: i64) -> shared::Result<Option<User>> {
            Ok(self.0.get(&id).cloned())
        }
    }

    fn users() -> StaticUsers {
        let mut map = HashMap::new();
        map.insert(
            1,
            User {
                id: 1,
                google_access_token: Some("ya29.token".to_string()),
            },
        );
        map.insert(
            2,
            User {
                id: 2,
                google_access_token: None,
            },
        );
        StaticUsers(map)
    }

    fn test_state(server: &MockServer) -> Arc<AppState> {
        let http_client = reqwest::Client::new();
        Arc::new(AppState {
            users: Arc::new(users()),
            identity: Arc::new(HeaderIdentity::header_or_cookie()),
            drive: DriveClient::new(
                http_client.clone(),
                format!("{}/drive/v3/files", server.uri()),
            ),
            meetings: MeetingsClient::new(http_client, server.uri()),
        })
    }

    fn request(uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> Request {
        let mut builder = http::Request::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::Empty,
        };
        builder.body(body).unwrap()
    }

    fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    async fn mount_no_upload(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/meetings/7/upload_transcript"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_backfill_requires_identity_and_token() {
        let server = MockServer::start().await;
        let state = test_state(&server);
        let uri = "/api/google/drive/backfill";

        let response = handler(Arc::clone(&state), request(uri, &[], None)).await.unwrap();
        assert_eq!(response.status(), 401);

        let response = handler(Arc::clone(&state), request(uri, &[("x-user-id", "99")], None))
            .await
            .unwrap();
        assert_eq!(response.status(), 401);

        let response = handler(Arc::clone(&state), request(uri, &[("x-user-id", "2")], None))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(
            body_json(&response)["error"],
            "Google account not connected for this user."
        );
    }

    #[tokio::test]
    async fn test_backfill_lists_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(query_param("pageSize", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{
                    "id": "abc",
                    "name": "Weekly sync transcript",
                    "mimeType": "application/vnd.google-apps.document",
                    "modifiedTime": "2025-05-01T10:00:00.000Z",
                    "webViewLink": "https://docs.google.com/document/d/abc"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(&server);
        let response = handler(
            state,
            request("/api/google/drive/backfill", &[("cookie", "user_id=1")], None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        let body = body_json(&response);
        assert_eq!(body["files"][0]["id"], "abc");
        assert_eq!(body["files"][0]["mimeType"], "application/vnd.google-apps.document");
        assert!(body["files"][0].get("size").is_none());
    }

    #[tokio::test]
    async fn test_backfill_surfaces_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
            .mount(&server)
            .await;

        let state = test_state(&server);
        let response = handler(
            state,
            request("/api/google/drive/backfill", &[("x-user-id", "1")], None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 401);
        assert_eq!(body_json(&response)["error"], "Invalid Credentials");
    }

    #[tokio::test]
    async fn test_attach_exports_doc_and_uploads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/doc1/export"))
            .and(query_param("mimeType", "text/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Alice: hello\nBob: hi"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/meetings/7/upload_transcript"))
            .and(header("cookie", "user_id=1; session=s3"))
            .and(body_string_contains("filename=\"Sync transcript\""))
            .and(body_string_contains("Alice: hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(&server);
        let response = handler(
            state,
            request(
                "/api/google/drive/attach_to_meeting",
                &[("cookie", "user_id=1; session=s3")],
                Some(json!({
                    "meeting_id": 7,
                    "file_id": "doc1",
                    "mime_type": "application/vnd.google-apps.document",
                    "name": "Sync transcript"
                })),
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response), json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_attach_download_404_skips_upload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/missing"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(404).set_body_string("File not found: missing."))
            .expect(1)
            .mount(&server)
            .await;
        mount_no_upload(&server).await;

        let state = test_state(&server);
        let response = handler(
            state,
            request(
                "/api/google/drive/attach_to_meeting",
                &[("x-user-id", "1")],
                Some(json!({"meeting_id": 7, "file_id": "missing", "mime_type": "text/plain"})),
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(body_json(&response)["error"], "File not found: missing.");
    }

    #[tokio::test]
    async fn test_attach_empty_file_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        mount_no_upload(&server).await;

        let state = test_state(&server);
        let response = handler(
            state,
            request(
                "/api/google/drive/attach_to_meeting",
                &[("x-user-id", "1")],
                Some(json!({"meeting_id": 7, "file_id": "empty"})),
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
        assert_eq!(body_json(&response)["error"], "Drive file is empty.");
    }

    #[tokio::test]
    async fn test_attach_surfaces_upload_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("some text"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/meetings/7/upload_transcript"))
            .and(body_string_contains("filename=\"drive_transcript.txt\""))
            .respond_with(ResponseTemplate::new(403).set_body_string("Not your meeting"))
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(&server);
        let response = handler(
            state,
            request(
                "/api/google/drive/attach_to_meeting",
                &[("x-user-id", "1")],
                Some(json!({"meeting_id": 7, "file_id": "notes", "name": "  "})),
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 403);
        assert_eq!(body_json(&response)["error"], "Not your meeting");
    }

    #[tokio::test]
    async fn test_attach_rejects_bad_body() {
        let server = MockServer::start().await;
        let state = test_state(&server);

        for body in [json!({"file_id": "x"}), json!({"meeting_id": 7, "file_id": ""})] {
            let response = handler(
                Arc::clone(&state),
                request(
                    "/api/google/drive/attach_to_meeting",
                    &[("x-user-id", "1")],
                    Some(body),
                ),
            )
            .await
            .unwrap();
            assert_eq!(response.status(), 400);
        }
    }

    #[tokio::test]
    async fn test_preview_truncates_long_text() {
        let server = MockServer::start().await;
        let long_text = "x".repeat(PREVIEW_CHAR_LIMIT + 500);
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/long.txt"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string(long_text))
            .mount(&server)
            .await;

        let state = test_state(&server);
        let response = handler(
            state,
            request(
                "/api/google/drive/preview_text",
                &[("x-user-id", "1")],
                Some(json!({"file_id": "long.txt", "mime_type": "text/plain"})),
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        let text = body_json(&response)["text"].as_str().unwrap().to_string();
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            text.strip_suffix(TRUNCATION_MARKER).unwrap().chars().count(),
            PREVIEW_CHAR_LIMIT
        );
    }

    #[tokio::test]
    async fn test_preview_short_text_unmodified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/doc2/export"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Short meeting."))
            .mount(&server)
            .await;

        let state = test_state(&server);
        let response = handler(
            state,
            request(
                "/api/google/drive/preview_text",
                &[("x-user-id", "1")],
                Some(json!({"file_id": "doc2", "mime_type": "application/vnd.google-apps.document"})),
            ),
        )
        .await
        .unwrap();

        assert_eq!(body_json(&response), json!({"text": "Short meeting."}));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let server = MockServer::start().await;
        let state = test_state(&server);
        let response = handler(state, request("/api/google/drive/unknown", &[], None))
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }
}
