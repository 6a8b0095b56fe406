pub mod chat;
pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod models;
pub mod prescription;
pub mod server;

use chat::ChatService;
use cli::Args;
use config::prompt::{ self, PromptConfig };
use llm::{ GeminiClient, ModelGateway };
use log::info;
use prescription::preprocess::{ ImagePreprocessor, PreprocessOptions };
use prescription::PrescriptionService;
use server::api::AppState;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Gemini Base URL: {}", args.gemini_base_url);
    info!("Models (in fallback order): {}", args.models.join(", "));
    info!("Model Timeout: {:?}", args.model_timeout_secs.map(Duration::from_secs));
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Chat History Turns: {}", args.chat_history_turns);
    info!("Max Image Width: {}", args.max_image_width);
    info!("CLAHE Tile/Clip: {}px / {}", args.clahe_tile_size, args.clahe_clip_limit);
    info!("Max Upload: {} MiB", args.max_upload_mb);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let prompts: Arc<PromptConfig> = match &args.prompts_path {
        Some(path) => prompt::load_prompts(path)?,
        None => Arc::new(PromptConfig::default()),
    };

    let client = GeminiClient::new(
        args.google_api_key.clone(),
        &args.gemini_base_url,
        args.model_timeout_secs.map(Duration::from_secs)
    )?;
    let gateway = Arc::new(ModelGateway::new(Arc::new(client), args.models.clone())?);

    let preprocessor = ImagePreprocessor::new(PreprocessOptions {
        max_width: args.max_image_width,
        tile_size: args.clahe_tile_size,
        clip_limit: args.clahe_clip_limit,
    });
    let prescriptions = Arc::new(
        PrescriptionService::new(Arc::clone(&gateway), Arc::clone(&prompts), preprocessor)
    );
    let chat = Arc::new(ChatService::new(Arc::clone(&gateway), prompts, args.chat_history_turns));

    let state = AppState::new(
        prescriptions,
        chat,
        gateway.models().to_vec(),
        args.server_api_key.clone()
    );

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, state, args);
    server.run().await?;

    Ok(())
}
