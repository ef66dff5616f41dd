//! Política de reintentos acotada, compartida por los clientes de servicios externos
//! (extracción con LLM y embeddings).

use std::future::Future;
use std::time::Duration;

/// Número máximo de intentos y espera fija entre intentos consecutivos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` se acota a 1 como mínimo: siempre hay al menos un intento.
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Ejecuta `op` hasta que tenga éxito o se agoten los intentos.
    ///
    /// `op` recibe el número de intento (empezando en 1). Cada fallo se notifica a
    /// `on_failure` antes de esperar; tras el último intento no se espera. Devuelve
    /// el último error si ningún intento tuvo éxito.
    pub async fn run<T, E, F, Fut, L>(&self, mut op: F, mut on_failure: L) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        L: FnMut(usize, &E),
    {
        let mut attempt = 1usize;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    on_failure(attempt, &err);
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
