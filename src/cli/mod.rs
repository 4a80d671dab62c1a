use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// Path to the JSON file holding every conversation.
    #[arg(long, env = "DATA_FILE", default_value = "data/conversations.json")]
    pub data_file: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (groq, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "groq")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.groq.com/openai/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (required for groq and openai)
    #[arg(long, env = "MODEL_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., llama-3.1-8b-instant, gpt-4o-mini, llama3.1)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Sampling temperature sent with every completion request.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Upper bound on generated tokens per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "1024")]
    pub max_tokens: u32,

    /// Seconds to wait for the provider before answering with the fallback reply.
    #[arg(long, env = "COMPLETION_TIMEOUT_SECS", default_value = "30")]
    pub completion_timeout_secs: u64,

    // --- General App Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:5000")]
    pub server_addr: String,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_setup() {
        let args = Args::try_parse_from(["chat-service"]).unwrap();
        assert_eq!(args.data_file, "data/conversations.json");
        assert_eq!(args.chat_llm_type, "groq");
        assert_eq!(args.completion_timeout_secs, 30);
        assert_eq!(args.max_tokens, 1024);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "chat-service",
            "--chat-llm-type",
            "ollama",
            "--data-file",
            "/tmp/history.json",
            "--completion-timeout-secs",
            "5",
        ]).unwrap();
        assert_eq!(args.chat_llm_type, "ollama");
        assert_eq!(args.data_file, "/tmp/history.json");
        assert_eq!(args.completion_timeout_secs, 5);
    }
}
