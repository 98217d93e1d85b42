use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::{AppConfig, LlmBackend};
use crate::errors::AppError;
use crate::services::ai::groq::GroqProvider;
use crate::services::ai::ollama::OllamaProvider;
use crate::services::ai::{IntentRecognizer, LlmProvider, LlmRecognizer};
use crate::services::audit::{AuditSink, SqliteAuditSink};
use crate::services::conversation::ConversationStore;
use crate::services::dialog::{IntentRouter, NaturalDateParser, SlotFillingEngine};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub router: IntentRouter,
    pub conversations: ConversationStore,
}

impl AppState {
    /// Wires the dialog stack. Spawns the audit writer, so this must run
    /// inside a tokio runtime.
    pub fn new(
        config: AppConfig,
        conn: Connection,
        recognizer: Option<Arc<dyn IntentRecognizer>>,
    ) -> Arc<Self> {
        let db = Arc::new(Mutex::new(conn));
        let audit: Arc<dyn AuditSink> = Arc::new(SqliteAuditSink::spawn(Arc::clone(&db)));

        let engine = SlotFillingEngine::new(
            recognizer.clone(),
            Arc::new(NaturalDateParser::new()),
            Arc::clone(&audit),
        )
        .with_max_retries(config.max_slot_retries);

        Arc::new(Self {
            router: IntentRouter::new(recognizer, engine, audit),
            conversations: ConversationStore::new(chrono::Duration::minutes(
                config.conversation_ttl_minutes,
            )),
            db,
            config,
        })
    }
}

/// Picks the recognizer backend named by `LLM_PROVIDER`.
pub fn build_recognizer(config: &AppConfig) -> Result<Option<Arc<dyn IntentRecognizer>>, AppError> {
    let llm: Box<dyn LlmProvider> = match config.llm_provider {
        LlmBackend::Groq => {
            if config.groq_api_key.is_empty() {
                return Err(AppError::Config(
                    "GROQ_API_KEY must be set when LLM_PROVIDER=groq".to_string(),
                ));
            }
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            ))
        }
        LlmBackend::Ollama => {
            tracing::info!(
                "using Ollama LLM provider (url: {}, model: {})",
                config.ollama_url,
                config.ollama_model
            );
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))
        }
        LlmBackend::Disabled => {
            tracing::warn!("no LLM_PROVIDER configured, running without a recognizer");
            return Ok(None);
        }
    };

    Ok(Some(Arc::new(LlmRecognizer::new(llm))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(llm_provider: LlmBackend, groq_api_key: &str) -> AppConfig {
        AppConfig {
            port: 3978,
            database_url: ":memory:".to_string(),
            admin_token: "token".to_string(),
            llm_provider,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            groq_api_key: groq_api_key.to_string(),
            groq_model: "llama-3.1-8b-instant".to_string(),
            conversation_ttl_minutes: 30,
            max_slot_retries: None,
        }
    }

    #[test]
    fn test_build_recognizer() {
        assert!(build_recognizer(&config(LlmBackend::Disabled, "")).unwrap().is_none());
        assert!(build_recognizer(&config(LlmBackend::Ollama, "")).unwrap().is_some());
        assert!(build_recognizer(&config(LlmBackend::Groq, "key")).unwrap().is_some());
        assert!(matches!(
            build_recognizer(&config(LlmBackend::Groq, "")),
            Err(AppError::Config(_))
        ));
    }
}
