//! Carga inicial del índice vectorial de preguntas.
//!
//! Flujo:
//!   1. Asegurar que el índice existe (dimensión configurada, coseno).
//!   2. Puerta de idempotencia: si el índice ya tiene entradas no se escribe nada.
//!   3. Embedding fila a fila del texto combinado; una fila que falla se omite.
//!   4. Upsert en lotes de tamaño fijo; un lote que falla se descarta.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app_state::Status;
use crate::dataset::QuestionRow;
use crate::embedding::EmbeddingClient;
use crate::error::IndexError;
use crate::llm::EmbeddingBackend;
use crate::models::IndexEntry;
use crate::vector_store::VectorIndex;

/// Resumen de una carga del índice.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PopulationSummary {
    pub already_populated: bool,
    pub rows: usize,
    pub embedded: usize,
    pub skipped_rows: usize,
    pub duplicate_ids: usize,
    pub upsert_calls: usize,
    pub upserted: usize,
    pub dropped: usize,
    pub cancelled: bool,
}

impl std::fmt::Display for PopulationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.already_populated {
            return write!(f, "El índice ya estaba poblado; no se escribió nada.");
        }
        write!(
            f,
            "Resumen: {} filas, {} vectores generados, {} filas omitidas ({} con id repetido), {} preguntas indexadas en {} lotes, {} descartadas{}.",
            self.rows,
            self.embedded,
            self.skipped_rows,
            self.duplicate_ids,
            self.upserted,
            self.upsert_calls,
            self.dropped,
            if self.cancelled { " (cancelado)" } else { "" }
        )
    }
}

pub struct IndexManager<E, V> {
    embedder: EmbeddingClient<E>,
    index: V,
    batch_size: usize,
}

impl<E: EmbeddingBackend, V: VectorIndex> IndexManager<E, V> {
    pub fn new(embedder: EmbeddingClient<E>, index: V, batch_size: usize) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    #[cfg(test)]
    pub fn index(&self) -> &V {
        &self.index
    }

    /// Puerta de idempotencia. Si no se pueden leer las estadísticas del índice
    /// se considera vacío.
    pub async fn is_populated(&self) -> bool {
        match self.index.count().await {
            Ok(count) => {
                info!("Indexteki mevcut vektör sayısı: {count}");
                count > 0
            }
            Err(err) => {
                error!("Index stats alınırken hata oluştu: {err}");
                false
            }
        }
    }

    /// Carga única del índice a partir de las filas del dataset.
    ///
    /// Sólo falla si no se puede asegurar la existencia del índice; los fallos
    /// de fila y de lote quedan reflejados en el resumen.
    pub async fn populate(
        &self,
        rows: &[QuestionRow],
        cancel: &CancellationToken,
        status_arc: Arc<Mutex<Status>>,
    ) -> Result<PopulationSummary, IndexError> {
        self.index.ensure_index().await?;

        let mut summary = PopulationSummary {
            rows: rows.len(),
            ..Default::default()
        };

        if self.is_populated().await {
            info!("Index zaten doldurulmuş. (Zaten indekslenmiş)");
            summary.already_populated = true;
            return Ok(summary);
        }

        info!("Veriler vektör indeksine ekleniyor ({} satır)...", rows.len());
        let total = rows.len();
        let mut batch: Vec<IndexEntry> = Vec::with_capacity(self.batch_size);
        let mut seen_ids: HashSet<String> = HashSet::with_capacity(total);

        for (i, row) in rows.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Indexación cancelada antes de la fila {}/{}", i + 1, total);
                summary.cancelled = true;
                break;
            }

            let id = row.id();
            Status::report(
                &status_arc,
                format!("[{}/{}] Indexando pregunta {}...", i + 1, total, id),
                i as f32 / total as f32,
            );

            // El upsert es un MERGE por id: un id repetido pisaría la fila anterior.
            if !seen_ids.insert(id.clone()) {
                warn!(id = %id, "Id repetido en la fila {}, se conserva la primera (ID: {id})", row.position);
                summary.duplicate_ids += 1;
                summary.skipped_rows += 1;
                continue;
            }

            let text = row.combined_text();
            if text.trim().is_empty() {
                warn!(id = %id, "Fila sin texto indexable, se omite (ID: {id})");
                summary.skipped_rows += 1;
                continue;
            }

            let vector = match self.embedder.embed(&text).await {
                Ok(vector) => vector,
                Err(err) => {
                    error!(id = %id, "Embedding oluşturulurken hata (ID: {id}): {err}");
                    summary.skipped_rows += 1;
                    continue;
                }
            };
            summary.embedded += 1;

            batch.push(IndexEntry {
                id,
                vector,
                metadata: row.fields.clone(),
            });
            if batch.len() == self.batch_size {
                self.flush(&mut batch, &mut summary).await;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut summary).await;
        }

        info!("{summary}");
        Ok(summary)
    }

    async fn flush(&self, batch: &mut Vec<IndexEntry>, summary: &mut PopulationSummary) {
        summary.upsert_calls += 1;
        match self.index.upsert(batch).await {
            Ok(()) => summary.upserted += batch.len(),
            Err(err) => {
                let ids: Vec<&str> = batch.iter().map(|e| e.id.as_str()).collect();
                error!(
                    batch_len = batch.len(),
                    "Batch upsert sırasında hata oluştu, lote descartado ({}): {err}",
                    ids.join(", ")
                );
                summary.dropped += batch.len();
            }
        }
        batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use crate::retry::RetryPolicy;
    use crate::testing::{HashEmbedder, MemoryIndex, TEST_DIMENSIONS};
    use std::collections::HashSet;
    use std::time::Duration;

    fn rows(n: usize) -> Vec<QuestionRow> {
        (0..n)
            .map(|i| {
                let mut fields = Metadata::new();
                fields.insert("soru_id".into(), format!("q{i}"));
                fields.insert("soru_metni".into(), format!("Soru numarası {i}"));
                fields.insert("konu".into(), "Sayılar".into());
                QuestionRow::new(i, fields)
            })
            .collect()
    }

    fn manager(embedder: HashEmbedder, index: MemoryIndex, batch: usize) -> IndexManager<HashEmbedder, MemoryIndex> {
        let embedding = EmbeddingClient::new(embedder, RetryPolicy::new(2, Duration::ZERO), TEST_DIMENSIONS);
        IndexManager::new(embedding, index, batch)
    }

    fn status() -> Arc<Mutex<Status>> {
        Arc::new(Mutex::new(Status::default()))
    }

    #[tokio::test]
    async fn upserts_in_fixed_size_batches() {
        for (total, batch, expected_calls, last_len) in [(120, 50, 3, 20), (100, 50, 2, 50), (7, 50, 1, 7), (9, 3, 3, 3)] {
            let manager = manager(HashEmbedder::new(), MemoryIndex::default(), batch);
            let summary = manager
                .populate(&rows(total), &CancellationToken::new(), status())
                .await
                .unwrap();

            let calls = manager.index().upsert_calls();
            assert_eq!(calls.len(), expected_calls, "total={total} batch={batch}");
            assert_eq!(calls.last().unwrap().len(), last_len);
            assert!(calls[..calls.len() - 1].iter().all(|c| c.len() == batch));
            assert_eq!(summary.upserted, total);
            assert_eq!(manager.index().ensure_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn second_population_is_a_no_op() {
        let manager = manager(HashEmbedder::new(), MemoryIndex::default(), 50);
        let first = manager.populate(&rows(60), &CancellationToken::new(), status()).await.unwrap();
        let second = manager.populate(&rows(60), &CancellationToken::new(), status()).await.unwrap();

        assert!(!first.already_populated);
        assert!(second.already_populated);
        assert_eq!(manager.index().upsert_calls().len(), 2);
        assert_eq!(manager.embedder.backend().calls.load(std::sync::atomic::Ordering::SeqCst), 60);
    }

    #[tokio::test]
    async fn embedding_failures_skip_only_that_row() {
        let manager = manager(HashEmbedder::failing_on(&["numarası 3"]), MemoryIndex::default(), 2);
        let summary = manager.populate(&rows(5), &CancellationToken::new(), status()).await.unwrap();

        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(summary.embedded, 4);
        assert_eq!(
            manager.index().upsert_calls(),
            vec![vec!["q0".to_string(), "q1".into()], vec!["q2".into(), "q4".into()]]
        );
    }

    #[tokio::test]
    async fn failed_batch_is_dropped_and_loading_continues() {
        let index = MemoryIndex {
            failing_upserts: HashSet::from([0]),
            ..Default::default()
        };
        let manager = manager(HashEmbedder::new(), index, 2);
        let summary = manager.populate(&rows(5), &CancellationToken::new(), status()).await.unwrap();

        assert_eq!(summary.upsert_calls, 3);
        assert_eq!(summary.dropped, 2);
        assert_eq!(summary.upserted, 3);
        assert_eq!(manager.index().ids(), vec!["q2", "q3", "q4"]);
    }

    #[tokio::test]
    async fn unreadable_stats_count_as_empty_index() {
        let index = MemoryIndex {
            fail_count: true,
            ..Default::default()
        };
        let manager = manager(HashEmbedder::new(), index, 50);
        let summary = manager.populate(&rows(2), &CancellationToken::new(), status()).await.unwrap();
        assert!(!summary.already_populated);
        assert_eq!(summary.upserted, 2);
    }

    #[tokio::test]
    async fn cancellation_flushes_what_was_embedded() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let manager = manager(HashEmbedder::new(), MemoryIndex::default(), 50);
        let summary = manager.populate(&rows(3), &cancel, status()).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.embedded, 0);
        assert!(manager.index().upsert_calls().is_empty());
    }

    #[tokio::test]
    async fn repeated_ids_keep_the_first_row() {
        let mut data = rows(3);
        // Un soru_id repetido, y una fila sin soru_id cuya posición coincide con otro id.
        data[1].fields.insert("soru_id".into(), "q0".into());
        data[2].fields.remove("soru_id");
        let mut extra = Metadata::new();
        extra.insert("soru_id".into(), "2".into());
        extra.insert("soru_metni".into(), "Otra soru".into());
        data.push(QuestionRow::new(3, extra));

        let manager = manager(HashEmbedder::new(), MemoryIndex::default(), 10);
        let summary = manager
            .populate(&data, &CancellationToken::new(), status())
            .await
            .unwrap();

        assert_eq!(summary.duplicate_ids, 2);
        assert_eq!(summary.skipped_rows, 2);
        assert_eq!(manager.index().ids(), vec!["q0", "2"]);
        let stored = manager.index().entries.lock().unwrap();
        assert_eq!(stored[0].metadata.get("soru_metni").map(String::as_str), Some("Soru numarası 0"));
    }
}
