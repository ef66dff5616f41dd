//! Tipos de error explícitos de cada etapa del pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errores al leer o escribir los ficheros tabulares (CSV).
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("no se pudo abrir {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV inválido en {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Fallo de un intento (o de todos) de extracción estructurada con el LLM.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("error del servicio LLM: {0:#}")]
    Service(anyhow::Error),

    #[error("la respuesta no es JSON válido para el esquema: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("la respuesta no cumple el esquema: {0}")]
    Schema(String),

    #[error("extracción fallida tras {attempts} intentos: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<ExtractionError>,
    },
}

/// Fallo al convertir un texto en vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("límite de peticiones alcanzado: {0}")]
    RateLimited(String),

    #[error("error del servicio de embeddings: {0:#}")]
    Service(anyhow::Error),

    #[error("dimensión inesperada: se esperaban {expected} valores y llegaron {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding fallido tras {attempts} intentos: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<EmbeddingError>,
    },
}

impl EmbeddingError {
    /// Clasifica un error del proveedor: los 429 y mensajes de "rate limit" se
    /// distinguen sólo para el log, ambos se reintentan igual.
    pub fn from_provider(err: anyhow::Error) -> Self {
        let message = format!("{err:#}");
        let lowered = message.to_lowercase();
        if lowered.contains("429") || lowered.contains("rate limit") {
            Self::RateLimited(message)
        } else {
            Self::Service(err)
        }
    }
}

/// Errores del índice vectorial remoto.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("error de Neo4j: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("metadatos no serializables: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("falta el campo '{0}' en el resultado del índice")]
    MissingField(&'static str),

    #[error("el índice rechazó la operación: {0}")]
    Rejected(String),
}

/// Transición no permitida en la sesión de preguntas.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no hay ninguna pregunta seleccionada")]
    NoQuestionSelected,

    #[error("transición no permitida desde la fase '{0}'")]
    InvalidTransition(&'static str),
}
