//! Recomendación de preguntas similares.
//!
//! Flujo:
//!   1. Embedding del texto de la pregunta consultada.
//!   2. Consulta top-k sobre el índice vectorial (con metadatos).
//!   3. Reordenación por score descendente; no se confía en el orden remoto.
//!   4. Proyección a texto de la pregunta + score.
//!
//! Nunca propaga errores: cualquier fallo se degrada a una lista vacía.

use tracing::{debug, error};

use crate::embedding::EmbeddingClient;
use crate::llm::EmbeddingBackend;
use crate::models::{Recommendation, SimilarityMatch};
use crate::vector_store::VectorIndex;

pub const DEFAULT_TOP_K: usize = 5;

pub struct RecommendationService<E, V> {
    embedder: EmbeddingClient<E>,
    index: V,
}

impl<E: EmbeddingBackend, V: VectorIndex> RecommendationService<E, V> {
    pub fn new(embedder: EmbeddingClient<E>, index: V) -> Self {
        Self { embedder, index }
    }

    /// Candidatos crudos del índice para `query_text`, sin ordenar.
    pub async fn query_similar(&self, query_text: &str, top_k: usize) -> Vec<SimilarityMatch> {
        let vector = match self.embedder.embed(query_text).await {
            Ok(vector) => vector,
            Err(err) => {
                error!("Error generando el embedding de la consulta: {err}");
                return Vec::new();
            }
        };

        match self.index.query(&vector, top_k).await {
            Ok(matches) => {
                debug!("El índice devolvió {} candidatos", matches.len());
                matches
            }
            Err(err) => {
                error!("Error consultando preguntas similares: {err}");
                Vec::new()
            }
        }
    }

    /// Hasta `top_k` preguntas similares, de mayor a menor similitud.
    pub async fn recommend(&self, query_text: &str, top_k: usize) -> Vec<Recommendation> {
        rank(self.query_similar(query_text, top_k).await)
    }
}

/// Ordena por score descendente y proyecta cada candidato.
pub fn rank(mut candidates: Vec<SimilarityMatch>) -> Vec<Recommendation> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.into_iter().map(Recommendation::from).collect()
}
