//! Integración con Neo4j como índice vectorial de las preguntas (`:Question`).
//!
//! API pública:
//!   - trait [`VectorIndex`]: ensure / count / upsert / query
//!   - [`Neo4jQuestionIndex`]: implementación sobre un índice vectorial coseno.

use std::future::Future;
use std::sync::Arc;

use neo4rs::{query, Graph};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::models::{IndexEntry, Metadata, SimilarityMatch, QUESTION_TEXT_KEY};

/// Operaciones que el pipeline necesita de un índice vectorial remoto.
pub trait VectorIndex: Send + Sync {
    /// Crea el índice (dimensión configurada, métrica coseno) si no existe.
    fn ensure_index(&self) -> impl Future<Output = Result<(), IndexError>> + Send;

    /// Número de entradas con vector que contiene el índice.
    fn count(&self) -> impl Future<Output = Result<u64, IndexError>> + Send;

    /// Inserta o reemplaza un lote completo de entradas.
    fn upsert(&self, entries: &[IndexEntry]) -> impl Future<Output = Result<(), IndexError>> + Send;

    /// Los `top_k` vecinos más cercanos, con metadatos.
    fn query(
        &self,
        vector: &[f64],
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<SimilarityMatch>, IndexError>> + Send;
}

/// Índice vectorial sobre `:Question(embedding)`.
#[derive(Clone)]
pub struct Neo4jQuestionIndex {
    graph: Arc<Graph>,
    index_name: String,
    dimensions: usize,
}

impl Neo4jQuestionIndex {
    pub fn new(graph: Arc<Graph>, index_name: &str, dimensions: usize) -> Result<Self, IndexError> {
        let valid = !index_name.is_empty()
            && index_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(IndexError::Rejected(format!(
                "nombre de índice inválido: '{index_name}'"
            )));
        }
        Ok(Self {
            graph,
            index_name: index_name.to_string(),
            dimensions,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

impl VectorIndex for Neo4jQuestionIndex {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        let index_name = self.index_name.as_str();

        // ¿Ya existe el índice? Usamos la sintaxis moderna SHOW VECTOR INDEXES.
        let mut cursor = self
            .graph
            .execute(
                query("SHOW VECTOR INDEXES YIELD name WHERE name = $name RETURN name")
                    .param("name", index_name),
            )
            .await?;

        if cursor.next().await?.is_some() {
            info!("Índice vectorial '{index_name}' ya existe.");
            return Ok(());
        }

        let cypher = format!(
            "\
CREATE VECTOR INDEX {index_name} IF NOT EXISTS
FOR (q:Question)
ON (q.embedding)
OPTIONS {{
  indexConfig: {{
    `vector.dimensions`: {dimensions},
    `vector.similarity_function`: 'cosine'
  }}
}}",
            index_name = index_name,
            dimensions = self.dimensions
        );

        self.graph.run(query(&cypher)).await?;
        info!(
            "Índice vectorial '{index_name}' creado ({} dimensiones, coseno).",
            self.dimensions
        );
        Ok(())
    }

    async fn count(&self) -> Result<u64, IndexError> {
        let mut cursor = self
            .graph
            .execute(query(
                "MATCH (q:Question) WHERE q.embedding IS NOT NULL RETURN count(q) AS total",
            ))
            .await?;

        let total = match cursor.next().await? {
            Some(row) => row.get::<i64>("total").ok_or(IndexError::MissingField("total"))?,
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        // Un lote = una transacción: o entra completo o no entra.
        let tx = self.graph.start_txn().await?;
        for entry in entries {
            let metadata = serde_json::to_string(&entry.metadata)?;
            let text = entry
                .metadata
                .get(QUESTION_TEXT_KEY)
                .cloned()
                .unwrap_or_default();
            tx.run(
                query(
                    "MERGE (q:Question {id: $id})
                     SET q.embedding = $embedding, q.metadata = $metadata, q.text = $text",
                )
                .param("id", entry.id.clone())
                .param("embedding", entry.vector.clone())
                .param("metadata", metadata)
                .param("text", text),
            )
            .await?;
        }
        tx.commit().await?;

        debug!("Lote de {} preguntas escrito en Neo4j", entries.len());
        Ok(())
    }

    async fn query(&self, vector: &[f64], top_k: usize) -> Result<Vec<SimilarityMatch>, IndexError> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                     YIELD node, score
                     RETURN node.id AS id, score, node.metadata AS metadata",
                )
                .param("index_name", self.index_name.clone())
                .param("k", top_k as i64)
                .param("embedding", vector.to_vec()),
            )
            .await?;

        let mut output = Vec::new();
        while let Some(row) = cursor.next().await? {
            let id: String = row.get("id").ok_or(IndexError::MissingField("id"))?;
            let score: f64 = row.get("score").ok_or(IndexError::MissingField("score"))?;
            // Metadatos ausentes o ilegibles = valores desconocidos, no un error.
            let metadata = row
                .get::<String>("metadata")
                .and_then(|raw| serde_json::from_str::<Metadata>(&raw).ok())
                .unwrap_or_default();
            output.push(SimilarityMatch { id, score, metadata });
        }
        Ok(output)
    }
}
