//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, header};
use parley_gateway::api::ApiServerBuilder;
use parley_gateway::{
    ChatCompletion, ChatMessage, CompletionError, Error, SpeechRecognizer, SpeechSynthesizer,
    TransientAudio,
};

pub const BOUNDARY: &str = "parley-test-boundary";

/// Recognizer returning a fixed transcript and remembering the files it saw
#[derive(Default)]
pub struct StubRecognizer {
    transcript: String,
    fail: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl StubRecognizer {
    pub fn saying(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechRecognizer for StubRecognizer {
    async fn recognize(&self, audio: &TransientAudio) -> parley_gateway::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(audio.path().to_path_buf());
        assert!(audio.path().exists(), "recording must exist while recognizing");

        if self.fail {
            Err(Error::Stt("recognizer offline".to_string()))
        } else {
            Ok(self.transcript.clone())
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Chat model replaying scripted results and recording every request
pub struct StubChat {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubChat {
    pub fn new(replies: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok((*r).to_string())).collect())
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for StubChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::ServiceUnavailable("script exhausted".into())))
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// Synthesizer returning fixed bytes, or failing
#[derive(Default)]
pub struct StubSynthesizer {
    fail: bool,
    texts: Mutex<Vec<String>>,
}

impl StubSynthesizer {
    pub fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, text: &str) -> parley_gateway::Result<Vec<u8>> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            Err(Error::Tts("synthesizer offline".to_string()))
        } else {
            Ok(b"ID3fake-mp3".to_vec())
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Builder wired to the given stubs, writing recordings under `temp_dir`
pub fn builder(
    chat: Arc<StubChat>,
    recognizer: Arc<StubRecognizer>,
    synthesizer: Arc<StubSynthesizer>,
    temp_dir: PathBuf,
) -> ApiServerBuilder {
    ApiServerBuilder::new(chat, recognizer, synthesizer).temp_dir(temp_dir)
}

/// Multipart body with a single file field
pub fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: audio/webm\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Multipart body with only text fields
pub fn multipart_text(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

/// POST /transcribe with a recording, optionally naming a session
pub fn transcribe_request(file_name: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/transcribe")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(session) = session {
        builder = builder.header("x-session-id", session);
    }
    builder
        .body(Body::from(multipart_body("recording", file_name, b"\x1a\x45\xdf\xa3webm")))
        .unwrap()
}

/// URL-encoded POST to `uri`
pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as bytes
pub async fn bytes_body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
