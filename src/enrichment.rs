//! Enriquecimiento por lotes de un dataset de preguntas en bruto.
//!
//! Un fallo en una pregunta nunca detiene el lote: la pregunta se omite, se
//! registra y se sigue con la siguiente.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app_state::Status;
use crate::dataset;
use crate::extraction::ExtractionClient;
use crate::llm::ChatBackend;
use crate::models::{RawQuestionRecord, StructuredQuestionRecord};

/// Resumen de los resultados de un lote de enriquecimiento.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub cancelled: bool,
    pub written: bool,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for EnrichmentSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} de {} preguntas procesadas, {} enriquecidas, {} omitidas{}.",
            self.processed,
            self.total,
            self.succeeded,
            self.skipped,
            if self.cancelled { " (cancelado)" } else { "" }
        )?;
        if !self.written {
            write!(f, " No se generó fichero de salida.")?;
        }
        Ok(())
    }
}

/// Preguntas enriquecidas en orden de entrada, más el resumen.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    pub records: Vec<StructuredQuestionRecord>,
    pub summary: EnrichmentSummary,
}

/// Recorre las preguntas en orden e invoca la extracción para cada una.
///
/// La cancelación se comprueba antes de empezar cada pregunta.
pub async fn run_batch<C: ChatBackend>(
    client: &ExtractionClient<C>,
    records: &[RawQuestionRecord],
    cancel: &CancellationToken,
    status_arc: Arc<Mutex<Status>>,
) -> EnrichmentOutcome {
    let mut outcome = EnrichmentOutcome {
        records: Vec::new(),
        summary: EnrichmentSummary {
            total: records.len(),
            ..Default::default()
        },
    };
    let total = records.len();

    for (index, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("Enriquecimiento cancelado antes de la pregunta {}/{}", index + 1, total);
            outcome.summary.cancelled = true;
            break;
        }

        // El id original (o la posición si no lo hay) manda sobre el que devuelva el LLM.
        let soru_id = if record.id.trim().is_empty() {
            index.to_string()
        } else {
            record.id.trim().to_string()
        };
        info!(soru_id = %soru_id, "İşlenen Soru ID: {soru_id}");
        Status::report(
            &status_arc,
            format!("[{}/{}] Enriqueciendo pregunta {}...", index + 1, total, soru_id),
            index as f32 / total as f32,
        );

        match client.extract(record).await {
            Ok(mut structured) => {
                structured.id = soru_id;
                outcome.records.push(structured);
                outcome.summary.succeeded += 1;
            }
            Err(err) => {
                warn!(soru_id = %soru_id, "Soru {soru_id} atlandı: {err}");
                outcome.summary.skipped += 1;
            }
        }
        outcome.summary.processed += 1;
    }

    outcome
}

/// Trabajo completo fichero → fichero: carga, enriquece y persiste.
///
/// Un dataset ilegible es fatal y no procesa nada. Si ninguna pregunta se pudo
/// enriquecer no se escribe ningún fichero.
pub async fn enrich_dataset<C: ChatBackend>(
    client: &ExtractionClient<C>,
    input: &Path,
    output: &Path,
    cancel: &CancellationToken,
    status_arc: Arc<Mutex<Status>>,
) -> Result<EnrichmentSummary> {
    let records = dataset::load_raw_records(input)
        .with_context(|| format!("CSV dosyası okunurken hata oluştu: {}", input.display()))?;

    let EnrichmentOutcome {
        records: enriched,
        mut summary,
    } = run_batch(client, &records, cancel, status_arc).await;

    if enriched.is_empty() {
        warn!("Hiçbir soru işlenemedi, çıktı oluşturulmadı.");
        return Ok(summary);
    }

    summary.written = dataset::write_structured(output, &enriched).with_context(|| {
        format!("Sonuçların CSV dosyasına yazılırken hata: {}", output.display())
    })?;
    info!("Çıktılar '{}' dosyasına başarıyla kaydedildi.", output.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::EchoChat;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    fn status() -> Arc<Mutex<Status>> {
        Arc::new(Mutex::new(Status::default()))
    }

    fn raw(id: &str) -> RawQuestionRecord {
        RawQuestionRecord {
            id: id.into(),
            question: format!("Soru {id}"),
            grade: "10. sınıf".into(),
            ..Default::default()
        }
    }

    fn client(failing: Vec<&'static str>) -> ExtractionClient<EchoChat> {
        ExtractionClient::new(EchoChat::new(failing), RetryPolicy::new(3, Duration::ZERO))
    }

    #[tokio::test]
    async fn failing_rows_are_skipped_not_fatal() {
        let records: Vec<_> = ["1", "2", "3", "4", "5"].into_iter().map(raw).collect();
        let extraction = client(vec!["2", "4"]);

        let outcome = run_batch(&extraction, &records, &CancellationToken::new(), status()).await;

        let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "5"]);
        assert_eq!(outcome.summary.succeeded, 3);
        assert_eq!(outcome.summary.skipped, 2);
        assert_eq!(outcome.summary.processed, 5);
        // 3 éxitos + 2 filas × 3 intentos
        assert_eq!(extraction_calls(&extraction), 9);
    }

    fn extraction_calls(client: &ExtractionClient<EchoChat>) -> usize {
        client.backend().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn positional_id_is_used_when_missing() {
        let records = vec![raw(""), raw("")];
        let outcome = run_batch(&client(vec![]), &records, &CancellationToken::new(), status()).await;
        let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_row() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run_batch(&client(vec![]), &[raw("1")], &cancel, status()).await;
        assert!(outcome.summary.cancelled);
        assert_eq!(outcome.summary.processed, 0);
        assert!(outcome.records.is_empty());
    }

    fn write_input(dir: &TempDir, ids: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join("sorular.csv");
        let mut csv = String::from("soru_id,soru_metni,şıklar,doğru_şık,sinif\n");
        for id in ids {
            csv.push_str(&format!("{id},Soru {id},\"['3', '4', '5']\",4,9\n"));
        }
        std::fs::write(&path, csv).unwrap();
        path
    }

    #[tokio::test]
    async fn output_size_is_total_minus_failures() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, &["1", "2", "3", "4"]);
        let output = dir.path().join("extracted_questions.csv");

        let summary = enrich_dataset(
            &client(vec!["3"]),
            &input,
            &output,
            &CancellationToken::new(),
            status(),
        )
        .await
        .unwrap();

        assert!(summary.written);
        let rows = dataset::load_question_rows(&output).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.id()).collect::<Vec<_>>(), vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn all_failures_write_no_file() {
        let dir = TempDir::new().unwrap();
        let input = write_input(&dir, &["1", "2"]);
        let output = dir.path().join("extracted_questions.csv");

        let summary = enrich_dataset(
            &client(vec!["1", "2"]),
            &input,
            &output,
            &CancellationToken::new(),
            status(),
        )
        .await
        .unwrap();

        assert!(!summary.written);
        assert_eq!(summary.skipped, 2);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn unreadable_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        let extraction = client(vec![]);
        let result = enrich_dataset(
            &extraction,
            &dir.path().join("yok.csv"),
            &dir.path().join("out.csv"),
            &CancellationToken::new(),
            status(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(extraction_calls(&extraction), 0);
    }
}
