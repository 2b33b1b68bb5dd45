//! HTTP surface for the voice relay

mod error;
mod feedback;
mod form;
mod health;
mod page;
pub mod rate_limit;
mod session;
mod voice;

pub use error::ApiError;
pub use form::FormFields;
pub use session::{DEFAULT_SESSION, SESSION_HEADER, SessionId};

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::audio::AudioStore;
use crate::chat::{ChatCompletion, OpenAiChat};
use crate::config::{Config, DEFAULT_PORT, UploadConfig};
use crate::conversation::{ConversationEngine, FeedbackEngine};
use crate::persona::Persona;
use crate::transcript::ResponseShape;
use crate::voice::{SpeechRecognizer, SpeechSynthesizer, SpeechToText, TextToSpeech};
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    pub conversations: ConversationEngine,
    pub feedback: FeedbackEngine,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub audio_store: AudioStore,
    pub persona: Arc<Persona>,
    pub response_shape: ResponseShape,
    pub upload: UploadConfig,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    completion: Arc<dyn ChatCompletion>,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    persona: Persona,
    response_shape: ResponseShape,
    upload: UploadConfig,
    temp_dir: Option<PathBuf>,
    max_context_turns: Option<usize>,
    rate_limit_rpm: Option<u32>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a builder around the three upstream capabilities
    #[must_use]
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            completion,
            recognizer,
            synthesizer,
            persona: Persona::default(),
            response_shape: ResponseShape::default(),
            upload: UploadConfig::default(),
            temp_dir: None,
            max_context_turns: None,
            rate_limit_rpm: None,
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }

    /// Build the hosted-API clients and server settings from `config`
    ///
    /// # Errors
    ///
    /// Returns error if a selected provider is missing its key or an HTTP
    /// client cannot be built
    pub fn from_config(config: Config) -> Result<Self> {
        let completion = Arc::new(OpenAiChat::from_config(&config)?);
        let recognizer = Arc::new(SpeechToText::from_config(&config)?);
        let synthesizer = Arc::new(TextToSpeech::from_config(&config)?);

        tracing::debug!(
            llm = %config.llm.model,
            stt = recognizer.name(),
            tts = synthesizer.name(),
            "upstream clients ready"
        );

        Ok(Self::new(completion, recognizer, synthesizer)
            .persona(config.persona)
            .response_shape(config.response_shape)
            .upload(config.upload)
            .temp_dir(config.temp_dir)
            .max_context_turns(config.llm.max_context_turns)
            .rate_limit(config.rate_limit_rpm)
            .port(config.port)
            .static_dir(config.static_dir))
    }

    /// Set the persona prompts and role labels
    #[must_use]
    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    /// Set the JSON layout of transcribe responses
    #[must_use]
    pub const fn response_shape(mut self, shape: ResponseShape) -> Self {
        self.response_shape = shape;
        self
    }

    /// Set upload field name, allowed container and size limit
    #[must_use]
    pub fn upload(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    /// Set the directory transient recordings are written to
    #[must_use]
    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Limit how many recent turns are sent with each completion
    #[must_use]
    pub const fn max_context_turns(mut self, turns: Option<usize>) -> Self {
        self.max_context_turns = turns;
        self
    }

    /// Enable a global requests-per-minute limit
    #[must_use]
    pub const fn rate_limit(mut self, rpm: Option<u32>) -> Self {
        self.rate_limit_rpm = rpm;
        self
    }

    /// Set the listen port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the static files directory served alongside the page
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let persona = Arc::new(self.persona);
        let extension = self.upload.allowed_extension.clone();
        let audio_store = match self.temp_dir {
            Some(dir) => AudioStore::new(dir, extension),
            None => AudioStore::in_temp_dir(extension),
        };

        let conversations = ConversationEngine::new(
            self.completion.clone(),
            persona.conversation_prompt.as_str(),
            self.max_context_turns,
        );
        let feedback = FeedbackEngine::new(self.completion, persona.clone());

        let state = Arc::new(ApiState {
            conversations,
            feedback,
            recognizer: self.recognizer,
            synthesizer: self.synthesizer,
            audio_store,
            persona,
            response_shape: self.response_shape,
            upload: self.upload,
            rate_limiter: self.rate_limit_rpm.map(rate_limit::create_limiter),
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes and layers
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(page::router())
            .merge(voice::router(self.state.clone()))
            .merge(feedback::router(self.state.clone()))
            .merge(session::router(self.state.clone()))
            .merge(health::router());

        if let Some(static_dir) = &self.static_dir {
            router = router.fallback_service(ServeDir::new(static_dir));
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // The page may be hosted elsewhere during development
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            persona = %self.state.persona.id,
            shape = self.state.response_shape.as_str(),
            rate_limited = self.state.rate_limiter.is_some(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
