use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Model Provider Args ---
    /// API key for the Google generative-language API. Required, there is no built-in fallback.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: String,

    /// Base URL of the generative-language REST API (without the /models suffix).
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    pub gemini_base_url: String,

    /// Ordered list of model identifiers, tried in order until one succeeds.
    #[arg(
        long,
        env = "GEMINI_MODELS",
        value_delimiter = ',',
        default_value = "gemini-2.0-flash,gemini-2.5-flash,gemini-flash-latest,gemini-pro-latest"
    )]
    pub models: Vec<String>,

    /// Optional timeout in seconds for a single model call. Unset means no timeout.
    #[arg(long, env = "MODEL_TIMEOUT_SECS")]
    pub model_timeout_secs: Option<u64>,

    // --- Prompt Args ---
    /// Optional JSON file overriding the built-in prompt templates (keys: image, audio, text, chat).
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Number of prior chat turns forwarded to the model as context.
    #[arg(long, env = "CHAT_HISTORY_TURNS", default_value_t = crate::chat::DEFAULT_HISTORY_TURNS)]
    pub chat_history_turns: usize,

    // --- Image Preprocessing Args ---
    /// Maximum width in pixels of a prescription image sent to the model. Smaller images are not enlarged.
    #[arg(long, env = "MAX_IMAGE_WIDTH", default_value = "2000")]
    pub max_image_width: u32,

    /// Tile edge in pixels for adaptive histogram equalization.
    #[arg(long, env = "CLAHE_TILE_SIZE", default_value = "50")]
    pub clahe_tile_size: u32,

    /// Contrast limit (maximum histogram slope) for adaptive histogram equalization.
    #[arg(long, env = "CLAHE_CLIP_LIMIT", default_value = "3.0")]
    pub clahe_clip_limit: f32,

    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Maximum request body size in MiB (uploads included).
    #[arg(long, env = "MAX_UPLOAD_MB", default_value = "20")]
    pub max_upload_mb: usize,

    /// Optional API Key required for clients to call the processing endpoints. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
