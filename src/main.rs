// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod curriculum;
mod dataset;
mod embedding;
mod enrichment;
mod error;
mod extraction;
mod indexing;
mod llm;
mod models;
mod neo4j_client;
mod prompt;
mod recommend;
mod retry;
mod session;
mod vector_store;

#[cfg(test)]
mod testing;

use crate::app_state::{AppState, Status};
use crate::vector_store::VectorIndex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Conectar a Neo4j y asegurar esquema e índice vectorial
    let graph = neo4j_client::connect_from_config(&cfg)
        .await
        .expect("Error conectando a Neo4j");
    neo4j_client::ensure_schema(&graph)
        .await
        .expect("Error asegurando el esquema de Neo4j");
    let index = vector_store::Neo4jQuestionIndex::new(
        Arc::new(graph),
        &cfg.vector_index_name,
        cfg.embedding_dimensions,
    )
    .expect("Nombre de índice vectorial inválido");
    index
        .ensure_index()
        .await
        .expect("Error asegurando el índice vectorial");
    info!("Índice vectorial '{}' listo", index.index_name());

    // 4. Inicializar gestor de LLMs y servicio de recomendación
    let llm_manager = llm::LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager");
    let recommender = recommend::RecommendationService::new(
        embedding::EmbeddingClient::new(
            llm_manager.clone(),
            cfg.embedding_retry,
            cfg.embedding_dimensions,
        ),
        index.clone(),
    );

    // 5. Cargar el dataset de preguntas (vacío si no se puede leer)
    let questions = match dataset::load_question_rows(Path::new(&cfg.questions_dataset_path)) {
        Ok(rows) => {
            info!("{} preguntas cargadas de {}", rows.len(), cfg.questions_dataset_path);
            rows
        }
        Err(err) => {
            error!("Error cargando el dataset de preguntas: {err}");
            Vec::new()
        }
    };
    let has_questions = !questions.is_empty();

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 6. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        llm_manager,
        index,
        recommender: Arc::new(recommender),
        questions: Arc::new(Mutex::new(questions)),
        sessions: Arc::new(Mutex::new(HashMap::new())),
        status: Arc::new(Mutex::new(Status {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
            updated_at: Some(chrono::Utc::now()),
        })),
        current_job: Arc::new(Mutex::new(None)),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 7. Carga inicial del índice vectorial (no hace nada si ya está poblado)
    if has_questions {
        if let Err((_, body)) = api::spawn_index_job(app_state.clone()) {
            error!("No se pudo lanzar la indexación inicial: {}", body.0);
        }
    }

    // 8. Configurar el router de la API
    let app = api::create_router(app_state.clone()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    // 9. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error en el servidor HTTP");

    info!("✅ Servidor cerrado correctamente.");
}
