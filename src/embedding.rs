//! Cliente de embeddings con reintentos y comprobación de dimensión.

use tracing::{error, warn};

use crate::error::EmbeddingError;
use crate::llm::EmbeddingBackend;
use crate::retry::RetryPolicy;

/// Convierte textos en vectores de dimensión fija.
pub struct EmbeddingClient<E> {
    backend: E,
    policy: RetryPolicy,
    dimensions: usize,
}

impl<E: EmbeddingBackend> EmbeddingClient<E> {
    pub fn new(backend: E, policy: RetryPolicy, dimensions: usize) -> Self {
        Self {
            backend,
            policy,
            dimensions,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &E {
        &self.backend
    }

    /// Vector completo para `text`, o error tras agotar los intentos.
    ///
    /// Un vector con una dimensión distinta de la configurada cuenta como un
    /// intento fallido: nunca se devuelve un vector parcial ni vacío.
    pub async fn embed(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        let max_attempts = self.policy.max_attempts();
        let preview: String = text.chars().take(50).collect();

        self.policy
            .run(
                |_| self.attempt(text),
                |attempt, err| match err {
                    EmbeddingError::RateLimited(_) => warn!(
                        attempt,
                        max_attempts,
                        "Límite de peticiones en el embedding (intento {attempt}/{max_attempts}), reintentando: {preview}..."
                    ),
                    other => error!(
                        attempt,
                        max_attempts,
                        "Error en el embedding (intento {attempt}/{max_attempts}): {other}"
                    ),
                },
            )
            .await
            .map_err(|last| EmbeddingError::Exhausted {
                attempts: max_attempts,
                last: Box::new(last),
            })
    }

    async fn attempt(&self, text: &str) -> Result<Vec<f64>, EmbeddingError> {
        let vector = self
            .backend
            .embed(text)
            .await
            .map_err(EmbeddingError::from_provider)?;
        if vector.len() != self.dimensions {
            return Err(EmbeddingError::Dimension {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}
