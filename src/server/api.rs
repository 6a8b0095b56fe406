use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{ rejection::BytesRejection, DefaultBodyLimit, Multipart, Request, State },
    http::header,
    middleware::{ self, Next },
    response::Response,
    routing::{ get, post },
    Json,
    RequestExt,
    Router,
};
use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value };
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use log::{ error, info, warn };
use uuid::Uuid;

use super::error::{ ApiError, CHAT_FAILED, PROCESSING_FAILED };
use crate::chat::ChatService;
use crate::llm::AudioClip;
use crate::models::chat::ChatMessage;
use crate::prescription::{ PrescriptionRequest, PrescriptionService, DEFAULT_AUDIO_MIME_TYPE };

#[derive(Deserialize)]
struct ChatRequest {
    message: Option<String>,
    history: Option<Vec<ChatMessage>>,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}

/// Shared, read-only handles built once at startup.
#[derive(Clone)]
pub struct AppState {
    prescriptions: Arc<PrescriptionService>,
    chat: Arc<ChatService>,
    models: Arc<Vec<String>>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        prescriptions: Arc<PrescriptionService>,
        chat: Arc<ChatService>,
        models: Vec<String>,
        api_key: Option<String>
    ) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Endpoints are open.");
        }
        Self {
            prescriptions,
            chat,
            models: Arc::new(models),
            api_key: api_key.map(|k| Arc::from(k.trim())),
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let guarded = Router::new()
        .route("/chat", post(chat_handler))
        .route("/process-prescription", post(process_prescription_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .merge(guarded)
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(cors).layer(DefaultBodyLimit::max(max_upload_bytes)))
        .with_state(state)
}

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    let headers = req.headers();
    let provided = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .map(str::trim);

    if provided == Some(expected) {
        Ok(next.run(req).await)
    } else {
        warn!("Rejected {} {}: missing or invalid API key", req.method(), req.uri().path());
        Err(ApiError::unauthorized())
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "models": state.models.as_slice() }))
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let body = body.map_err(|e| {
        error!("[{}] Chat API Error: unreadable body: {}", request_id, e);
        ApiError::internal(CHAT_FAILED, e.body_text())
    })?;
    info!("[{}] POST /chat ({} bytes)", request_id, body.len());

    let req: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        error!("[{}] Chat API Error: invalid JSON body: {}", request_id, e);
        ApiError::internal(CHAT_FAILED, format!("Invalid JSON body: {}", e))
    })?;
    let message = req.message.unwrap_or_default();
    let history = req.history.unwrap_or_default();

    match state.chat.reply(&message, &history).await {
        Ok(reply) => Ok(Json(ChatResponse { reply })),
        Err(e) => {
            error!("[{}] Chat API Error: {}", request_id, e);
            Err(e.into())
        }
    }
}

async fn process_prescription_handler(
    State(state): State<AppState>,
    req: Request
) -> Result<Json<Value>, ApiError> {
    let request_id = Uuid::new_v4();
    info!("[{}] POST /process-prescription", request_id);

    let form = parse_prescription_form(req).await.map_err(|e| {
        error!("[{}] API Error: {:?}", request_id, e.details);
        e
    })?;

    match state.prescriptions.process(form).await {
        Ok(data) => Ok(Json(data)),
        Err(e) => {
            error!("[{}] API Error: {}", request_id, e);
            Err(e.into())
        }
    }
}

fn multipart_field_error(field_name: &str, details: &str) -> ApiError {
    ApiError::internal(
        PROCESSING_FAILED,
        format!("Failed reading multipart '{}' field: {}", field_name, details)
    )
}

async fn parse_prescription_form(req: Request) -> Result<PrescriptionRequest, ApiError> {
    let mut multipart = req
        .extract::<Multipart, _>().await
        .map_err(|e| ApiError::internal(PROCESSING_FAILED, format!("Invalid multipart payload: {}", e)))?;

    let mut out = PrescriptionRequest::default();

    while
        let Some(field) = multipart
            .next_field().await
            .map_err(|e|
                ApiError::internal(PROCESSING_FAILED, format!("Failed reading multipart field: {}", e))
            )?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes().await
                    .map_err(|e| multipart_field_error(&name, &e.to_string()))?;
                out.image = Some(bytes.to_vec());
            }
            "audio" => {
                let mime_type = field
                    .content_type()
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .unwrap_or(DEFAULT_AUDIO_MIME_TYPE)
                    .to_string();
                let bytes = field
                    .bytes().await
                    .map_err(|e| multipart_field_error(&name, &e.to_string()))?;
                out.audio = Some(AudioClip { bytes: bytes.to_vec(), mime_type });
            }
            "medicineName" => {
                let text = field
                    .text().await
                    .map_err(|e| multipart_field_error(&name, &e.to_string()))?;
                out.medicine_name = Some(text);
            }
            _ => {}
        }
    }

    Ok(out)
}
