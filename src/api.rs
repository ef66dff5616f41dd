use std::path::PathBuf;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    app_state::{AppState, Status},
    dataset,
    embedding::EmbeddingClient,
    enrichment,
    extraction::ExtractionClient,
    indexing::IndexManager,
    session::{AnswerOutcome, QuestionView, SessionPhase},
};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize, Default)]
pub struct EnrichPayload {
    input_path: Option<String>,
    output_path: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    search: Option<String>,
}

#[derive(Serialize)]
pub struct QuestionSummary {
    id: String,
    question_text: String,
}

#[derive(Deserialize)]
pub struct SelectQuestionPayload {
    session_id: Option<String>,
    question_text: String,
}

#[derive(Serialize)]
pub struct SelectQuestionResponse {
    session_id: String,
    question: QuestionView,
    state: SessionPhase,
}

#[derive(Deserialize)]
pub struct AnswerPayload {
    session_id: String,
    choice: String,
}

#[derive(Serialize)]
pub struct AnswerResponse {
    outcome: AnswerOutcome,
    state: SessionPhase,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/enrich", post(enrich_handler))
        .route("/api/index", post(index_handler))
        .route("/api/cancel", post(cancel_handler))
        .route("/api/status", get(status_handler))
        .route("/api/questions", get(questions_handler))
        .route("/api/session/select", post(select_question_handler))
        .route("/api/session/answer", post(answer_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Trabajos en segundo plano ---

/// Marca el estado como ocupado y registra un token de cancelación nuevo.
/// Sólo puede haber un trabajo en curso.
fn begin_job(state: &AppState, message: &str) -> Result<CancellationToken, ApiError> {
    let mut status = state.status.lock().unwrap();
    if status.is_busy {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("Ya hay un trabajo en curso: {}", status.message),
        ));
    }
    status.is_busy = true;
    status.message = message.to_string();
    status.progress = 0.0;
    status.updated_at = Some(Utc::now());

    let token = CancellationToken::new();
    *state.current_job.lock().unwrap() = Some(token.clone());
    Ok(token)
}

fn finish_job(state: &AppState, message: String) {
    state.current_job.lock().unwrap().take();
    let mut status = state.status.lock().unwrap();
    status.is_busy = false;
    status.progress = 0.0;
    status.message = message;
    status.updated_at = Some(Utc::now());
}

/// Lanza la carga única del índice vectorial con el dataset de preguntas.
pub fn spawn_index_job(state: AppState) -> Result<(), ApiError> {
    let cancel = begin_job(&state, "Iniciando indexación...")?;

    spawn(async move {
        let path = PathBuf::from(&state.config.questions_dataset_path);
        let rows = match dataset::load_question_rows(&path) {
            Ok(rows) => rows,
            Err(err) => {
                error!("Error cargando el dataset de preguntas: {err}");
                finish_job(&state, format!("Error en la indexación: {err}"));
                return;
            }
        };
        *state.questions.lock().unwrap() = rows.clone();

        let embedder = EmbeddingClient::new(
            state.llm_manager.clone(),
            state.config.embedding_retry,
            state.config.embedding_dimensions,
        );
        let manager = IndexManager::new(embedder, state.index.clone(), state.config.index_batch_size);

        let message = match manager.populate(&rows, &cancel, state.status.clone()).await {
            Ok(summary) => format!("¡Indexación completada! {summary}"),
            Err(err) => {
                error!("Error de indexación: {err}");
                format!("Error en la indexación: {err}")
            }
        };
        finish_job(&state, message);
    });

    Ok(())
}

// --- Handlers ---

#[axum::debug_handler]
async fn enrich_handler(
    State(state): State<AppState>,
    payload: Option<Json<EnrichPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let input = PathBuf::from(payload.input_path.unwrap_or_else(|| state.config.raw_dataset_path.clone()));
    let output = PathBuf::from(
        payload
            .output_path
            .unwrap_or_else(|| state.config.enriched_dataset_path.clone()),
    );

    let cancel = begin_job(&state, "Iniciando enriquecimiento...")?;

    spawn(async move {
        let client = ExtractionClient::new(state.llm_manager.clone(), state.config.extraction_retry);
        let result =
            enrichment::enrich_dataset(&client, &input, &output, &cancel, state.status.clone()).await;

        let message = match result {
            Ok(summary) => format!("¡Enriquecimiento completado! {summary}"),
            Err(err) => {
                error!("Error de enriquecimiento: {err:#}");
                format!("Error en el enriquecimiento: {err:#}")
            }
        };
        finish_job(&state, message);
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn index_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    spawn_index_job(state)?;
    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn cancel_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    match state.current_job.lock().unwrap().as_ref() {
        Some(token) => {
            token.cancel();
            info!("Cancelación solicitada para el trabajo en curso.");
            Ok(StatusCode::ACCEPTED)
        }
        None => Err(api_error(StatusCode::NOT_FOUND, "No hay ningún trabajo en curso.")),
    }
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.lock().unwrap().clone())
}

#[axum::debug_handler]
async fn questions_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<QuestionSummary>> {
    let needle = params
        .search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let questions = state.questions.lock().unwrap();
    let matches = questions
        .iter()
        .filter_map(|row| {
            let text = row.question_text()?;
            match &needle {
                Some(needle) if !text.to_lowercase().contains(needle.as_str()) => None,
                _ => Some(QuestionSummary {
                    id: row.id(),
                    question_text: text.to_string(),
                }),
            }
        })
        .collect();
    Json(matches)
}

#[axum::debug_handler]
async fn select_question_handler(
    State(state): State<AppState>,
    Json(payload): Json<SelectQuestionPayload>,
) -> Result<Json<SelectQuestionResponse>, ApiError> {
    let row = state
        .questions
        .lock()
        .unwrap()
        .iter()
        .find(|row| row.question_text() == Some(payload.question_text.as_str()))
        .cloned()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Seçilen soruya ait veriler bulunamadı."))?;

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let question = QuestionView::from_row(&row);
    let mut sessions = state.sessions.lock().unwrap();
    let session = sessions.entry(session_id.clone()).or_default();
    session.select(row);

    Ok(Json(SelectQuestionResponse {
        session_id,
        question,
        state: session.phase().clone(),
    }))
}

#[axum::debug_handler]
async fn answer_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnswerPayload>,
) -> Result<Json<AnswerResponse>, ApiError> {
    // El lock no puede cruzar el .await de la recomendación.
    let query_text = {
        let mut sessions = state.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&payload.session_id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Sesión desconocida."))?;

        let outcome = session
            .submit_answer(&payload.choice)
            .map_err(|e| api_error(StatusCode::CONFLICT, e.to_string()))?;
        if outcome == AnswerOutcome::Correct {
            return Ok(Json(AnswerResponse {
                outcome,
                state: session.phase().clone(),
            }));
        }
        session
            .recommendation_query()
            .map_err(|e| api_error(StatusCode::CONFLICT, e.to_string()))?
    };

    info!("Respuesta incorrecta; preparando recomendaciones.");
    let recommendations = state
        .recommender
        .recommend(&query_text, state.config.recommendation_top_k)
        .await;
    if recommendations.is_empty() {
        warn!("No se pudieron generar recomendaciones para '{query_text}'");
    }

    let mut sessions = state.sessions.lock().unwrap();
    let session = sessions
        .get_mut(&payload.session_id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Sesión desconocida."))?;
    let phase = session
        .complete_recommendations(recommendations)
        .map_err(|e| api_error(StatusCode::CONFLICT, e.to_string()))?
        .clone();

    Ok(Json(AnswerResponse {
        outcome: AnswerOutcome::Incorrect,
        state: phase,
    }))
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(token) = state.current_job.lock().unwrap().as_ref() {
        token.cancel();
    }
    if let Some(sender) = state.shutdown_sender.lock().unwrap().take() {
        let _ = sender.send(());
    }
    StatusCode::OK
}
