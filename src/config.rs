use std::env;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmBackend {
    Ollama,
    Groq,
    /// No recognizer: every conversation runs the booking flow from an
    /// empty record.
    Disabled,
}

impl LlmBackend {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ollama" => LlmBackend::Ollama,
            "groq" => LlmBackend::Groq,
            _ => LlmBackend::Disabled,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub llm_provider: LlmBackend,
    pub ollama_url: String,
    pub ollama_model: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub conversation_ttl_minutes: i64,
    /// `None` retries a prompt forever.
    pub max_slot_retries: Option<u32>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3978),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "flightbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            llm_provider: LlmBackend::parse(&env::var("LLM_PROVIDER").unwrap_or_default()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
            conversation_ttl_minutes: env::var("CONVERSATION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m: &i64| *m > 0)
                .unwrap_or(30),
            max_slot_retries: retry_limit(env::var("MAX_SLOT_RETRIES").ok().as_deref()),
        }
    }
}

/// Zero, unset or garbage means unlimited.
fn retry_limit(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
}
