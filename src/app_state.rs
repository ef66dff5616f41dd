use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig, dataset::QuestionRow, llm::LlmManager, recommend::RecommendationService,
    session::QuizSession, vector_store::Neo4jQuestionIndex,
};

pub type Recommender = RecommendationService<LlmManager, Neo4jQuestionIndex>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub llm_manager: LlmManager,
    pub index: Neo4jQuestionIndex,
    pub recommender: Arc<Recommender>,
    /// Preguntas del dataset de trabajo (búsqueda, sesiones e indexación).
    pub questions: Arc<Mutex<Vec<QuestionRow>>>,
    /// Sesiones de práctica por id de sesión.
    pub sessions: Arc<Mutex<HashMap<String, QuizSession>>>,
    pub status: Arc<Mutex<Status>>,
    /// Token del trabajo en segundo plano en curso, si lo hay.
    pub current_job: Arc<Mutex<Option<CancellationToken>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
    pub updated_at: Option<DateTime<Utc>>,
}

impl Status {
    /// Actualiza mensaje y progreso de un trabajo en curso.
    pub fn report(status: &Mutex<Status>, message: String, progress: f32) {
        let mut status = status.lock().unwrap();
        status.message = message;
        status.progress = progress.clamp(0.0, 1.0);
        status.updated_at = Some(Utc::now());
    }
}
