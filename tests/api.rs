//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use parley_gateway::config::UploadConfig;
use parley_gateway::{ChatRole, CompletionError, ResponseShape};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    BOUNDARY, StubChat, StubRecognizer, StubSynthesizer, builder, bytes_body, form_request,
    json_body, multipart_body, multipart_text, transcribe_request,
};

fn get(uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(session) = session {
        builder = builder.header("x-session-id", session);
    }
    builder.body(Body::empty()).unwrap()
}

fn temp_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("hi"),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_page_is_served() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("hi"),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(bytes_body(response).await).unwrap();
    assert!(page.contains("/index.js"));

    let response = app.oneshot(get("/index.js", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/javascript")
    );
}

#[tokio::test]
async fn test_transcribe_returns_role_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["What is your customer acquisition cost?"]);
    let recognizer = StubRecognizer::saying(" We are building a marketplace. ");
    let app = builder(
        chat.clone(),
        recognizer.clone(),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(
        body,
        json!([
            {"entrepreneur": "We are building a marketplace."},
            {"investor": "What is your customer acquisition cost?"}
        ])
    );

    // Recording was removed before the response was sent
    assert_eq!(recognizer.calls(), 1);
    assert!(recognizer.seen_paths().iter().all(|p| !p.exists()));
    assert_eq!(temp_files(dir.path()), 0);

    // Persona prompt first, then the user turn
    let requests = chat.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0][0].role, ChatRole::System);
    assert_eq!(requests[0][1].content, "We are building a marketplace.");

    let history = json_body(app.oneshot(get("/history", None)).await.unwrap()).await;
    assert_eq!(history["session"], "default");
    assert_eq!(history["state"], "active");
    assert_eq!(history["turns"].as_array().unwrap().len(), 2);
    assert_eq!(history["turns"][0]["role"], "user");
    assert_eq!(history["turns"][1]["role"], "assistant");
}

#[tokio::test]
async fn test_transcribe_object_shape() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&["Hello."]),
        StubRecognizer::saying("Hi."),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .response_shape(ResponseShape::Object)
    .build()
    .router();

    let response = app
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"user": "Hi.", "assistant": "Hello."})
    );
}

#[tokio::test]
async fn test_transcribe_rejects_wrong_extension_without_processing() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["unused"]);
    let recognizer = StubRecognizer::saying("unused");
    let app = builder(
        chat.clone(),
        recognizer.clone(),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .oneshot(transcribe_request("recording.wav", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(recognizer.calls(), 0);
    assert!(chat.requests().is_empty());
    assert_eq!(temp_files(dir.path()), 0);
}

#[tokio::test]
async fn test_transcribe_accepts_uppercase_extension() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&["ok"]),
        StubRecognizer::saying("hello"),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .oneshot(transcribe_request("RECORDING.WEBM", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_transcribe_requires_recording_field() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = StubRecognizer::saying("unused");
    let app = builder(
        StubChat::replying(&[]),
        recognizer.clone(),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let request = Request::builder()
        .method("POST")
        .uri("/transcribe")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body("audio", "recording.webm", b"data")))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Not multipart at all
    let response = app
        .oneshot(form_request("/transcribe", "recording=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(recognizer.calls(), 0);
}

#[tokio::test]
async fn test_transcribe_rejects_oversized_upload() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = StubRecognizer::saying("unused");
    let app = builder(
        StubChat::replying(&[]),
        recognizer.clone(),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .upload(UploadConfig {
        max_bytes: 64,
        ..UploadConfig::default()
    })
    .build()
    .router();

    let request = Request::builder()
        .method("POST")
        .uri("/transcribe")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(
            "recording",
            "recording.webm",
            &[0_u8; 1024],
        )))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(recognizer.calls(), 0);
}

#[tokio::test]
async fn test_recognizer_failure_releases_audio() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["unused"]);
    let recognizer = StubRecognizer::failing();
    let app = builder(
        chat.clone(),
        recognizer.clone(),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "transcription_failed");

    assert_eq!(recognizer.calls(), 1);
    assert_eq!(temp_files(dir.path()), 0);
    assert!(chat.requests().is_empty());

    let history = json_body(app.oneshot(get("/history", None)).await.unwrap()).await;
    assert_eq!(history["state"], "empty");
}

#[tokio::test]
async fn test_silent_recording_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["unused"]);
    let app = builder(
        chat.clone(),
        StubRecognizer::saying("   "),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["error"]["code"], "no_speech");
    assert!(chat.requests().is_empty());

    let history = json_body(app.oneshot(get("/history", None)).await.unwrap()).await;
    assert!(history["turns"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_context_overflow_is_reported_distinctly() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::new(vec![Err(CompletionError::ContextTooLarge(
        "maximum context length is 4097 tokens".to_string(),
    ))]);
    let app = builder(
        chat,
        StubRecognizer::saying("One more thing."),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "context_too_large");
    assert!(body["error"]["message"].as_str().unwrap().contains("reset"));

    // The user turn stays recorded
    let history = json_body(app.oneshot(get("/history", None)).await.unwrap()).await;
    assert_eq!(history["turns"].as_array().unwrap().len(), 1);
    assert_eq!(history["turns"][0]["content"], "One more thing.");
}

#[tokio::test]
async fn test_completion_failure_is_generic() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::new(vec![Err(CompletionError::ServiceUnavailable(
        "upstream secret detail".to_string(),
    ))]);
    let app = builder(
        chat,
        StubRecognizer::saying("Hello."),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "completion_failed");
    assert!(!body["error"]["message"].as_str().unwrap().contains("secret"));
}

#[tokio::test]
async fn test_reset_clears_history() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["first reply", "second reply"]);
    let app = builder(
        chat.clone(),
        StubRecognizer::saying("Hello."),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/reset", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Idempotent
    let response = app.clone().oneshot(get("/reset", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let history = json_body(app.clone().oneshot(get("/history", None)).await.unwrap()).await;
    assert_eq!(history["state"], "empty");
    assert!(history["turns"].as_array().unwrap().is_empty());

    // Next turn starts from the persona prompt alone
    let response = app
        .oneshot(transcribe_request("recording.webm", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let requests = chat.requests();
    assert_eq!(requests[1].len(), 2);
}

#[tokio::test]
async fn test_sessions_are_isolated_by_header() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&["to alice", "to bob"]),
        StubRecognizer::saying("Hello."),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    for session in ["alice", "bob"] {
        let response = app
            .clone()
            .oneshot(transcribe_request("recording.webm", Some(session)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/reset", Some("alice"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let alice = json_body(app.clone().oneshot(get("/history", Some("alice"))).await.unwrap()).await;
    let bob = json_body(app.clone().oneshot(get("/history", Some("bob"))).await.unwrap()).await;
    assert!(alice["turns"].as_array().unwrap().is_empty());
    assert_eq!(bob["turns"][1]["content"], "to bob");

    let response = app.oneshot(get("/history", Some("bad id!"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synthesize_returns_audio() {
    let dir = tempfile::tempdir().unwrap();
    let synthesizer = StubSynthesizer::working();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("unused"),
        synthesizer.clone(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .oneshot(form_request("/synthesize", "ai_response=Tell+me+about+your+team."))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(bytes_body(response).await, b"ID3fake-mp3");
    assert_eq!(synthesizer.texts(), vec!["Tell me about your team.".to_string()]);
}

#[tokio::test]
async fn test_synthesize_accepts_multipart_form() {
    let dir = tempfile::tempdir().unwrap();
    let synthesizer = StubSynthesizer::working();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("unused"),
        synthesizer.clone(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let request = Request::builder()
        .method("POST")
        .uri("/synthesize")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_text(&[("ai_response", "Go on.")])))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(synthesizer.texts(), vec!["Go on.".to_string()]);
}

#[tokio::test]
async fn test_synthesize_rejects_empty_text() {
    let dir = tempfile::tempdir().unwrap();
    let synthesizer = StubSynthesizer::working();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("unused"),
        synthesizer.clone(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(form_request("/synthesize", "ai_response="))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(form_request("/synthesize", "other=value"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(synthesizer.texts().is_empty());
}

#[tokio::test]
async fn test_synthesize_failure_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("unused"),
        StubSynthesizer::failing(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .oneshot(form_request("/synthesize", "ai_response=hello"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["code"], "synthesis_failed");
}

#[tokio::test]
async fn test_feedback_returns_critique_without_touching_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["Strong opening, weak numbers."]);
    let app = builder(
        chat.clone(),
        StubRecognizer::saying("unused"),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .clone()
        .oneshot(form_request(
            "/feedback",
            "conversation=entrepreneur%3A+hi%0Ainvestor%3A+hello",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let critique = String::from_utf8(bytes_body(response).await).unwrap();
    assert_eq!(critique, "Strong opening, weak numbers.");

    let requests = chat.requests();
    assert_eq!(requests[0].len(), 2);
    assert_eq!(requests[0][0].role, ChatRole::System);
    assert_eq!(
        requests[0][1].content,
        "Give feedback on the following conversation: entrepreneur: hi\ninvestor: hello"
    );

    let history = json_body(app.oneshot(get("/history", None)).await.unwrap()).await;
    assert_eq!(history["state"], "empty");
}

#[tokio::test]
async fn test_feedback_rejects_missing_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let chat = StubChat::replying(&["unused"]);
    let app = builder(
        chat.clone(),
        StubRecognizer::saying("unused"),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .build()
    .router();

    let response = app
        .oneshot(form_request("/feedback", "conversation=+++"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(chat.requests().is_empty());
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let dir = tempfile::tempdir().unwrap();
    let app = builder(
        StubChat::replying(&[]),
        StubRecognizer::saying("unused"),
        StubSynthesizer::working(),
        dir.path().to_path_buf(),
    )
    .rate_limit(Some(1))
    .build()
    .router();

    let response = app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(response).await["error"]["code"], "rate_limited");
}
