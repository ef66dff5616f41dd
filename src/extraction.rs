//! Extracción estructurada: prompt → LLM → JSON validado, con reintentos.

use tracing::{error, info, warn};

use crate::curriculum::curriculum_for;
use crate::error::ExtractionError;
use crate::llm::ChatBackend;
use crate::models::{RawQuestionRecord, StructuredQuestionRecord};
use crate::prompt::build_prompt;
use crate::retry::RetryPolicy;

/// Cliente de extracción sobre un backend de chat.
pub struct ExtractionClient<C> {
    backend: C,
    policy: RetryPolicy,
}

impl<C: ChatBackend> ExtractionClient<C> {
    pub fn new(backend: C, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Enriquece una pregunta. Cualquier fallo (transporte, JSON inválido o
    /// esquema incumplido) consume un intento; agotados los intentos, la
    /// pregunta se da por perdida y no se emite ningún registro parcial.
    pub async fn extract(
        &self,
        record: &RawQuestionRecord,
    ) -> Result<StructuredQuestionRecord, ExtractionError> {
        let record_id = record.display_id();
        let prompt = build_prompt(record, curriculum_for(&record.grade));
        let max_attempts = self.policy.max_attempts();

        let result = self
            .policy
            .run(
                |_| self.attempt(&prompt),
                |attempt, err| {
                    error!(
                        soru_id = record_id,
                        attempt,
                        max_attempts,
                        "Deneme {attempt}/{max_attempts} - Soru {record_id} işlenirken hata: {err}"
                    );
                },
            )
            .await;

        match result {
            Ok(structured) => {
                info!(soru_id = record_id, "Soru {record_id} başarıyla işlendi.");
                Ok(structured)
            }
            Err(last) => {
                warn!(soru_id = record_id, "Soru {record_id} işlenemedi.");
                Err(ExtractionError::Exhausted {
                    attempts: max_attempts,
                    last: Box::new(last),
                })
            }
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<StructuredQuestionRecord, ExtractionError> {
        let content = self
            .backend
            .complete(prompt)
            .await
            .map_err(ExtractionError::Service)?;
        parse_response(&content)
    }
}

/// Interpreta la respuesta del LLM como un único objeto JSON del esquema cerrado.
pub fn parse_response(content: &str) -> Result<StructuredQuestionRecord, ExtractionError> {
    // Limpiar la respuesta del LLM para asegurar que solo contenga el JSON
    let json = content
        .trim()
        .trim_start_matches("```json")
        .trim_end_matches("```")
        .trim();

    let record: StructuredQuestionRecord = serde_json::from_str(json)?;
    record.validate().map_err(ExtractionError::Schema)?;
    Ok(record)
}
