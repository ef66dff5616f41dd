//! Carga y gestión de configuración de la aplicación (Neo4j + LLM + pipeline).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::recommend::DEFAULT_TOP_K;
use crate::retry::RetryPolicy;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,
    pub embedding_dimensions: usize,

    pub vector_index_name: String,
    pub index_batch_size: usize,

    pub raw_dataset_path: String,
    pub enriched_dataset_path: String,
    pub questions_dataset_path: String,

    pub extraction_retry: RetryPolicy,
    pub embedding_retry: RetryPolicy,
    pub recommendation_top_k: usize,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let neo4j_uri = env::var("NEO4J_URI")
            .map_err(|_| anyhow!("Falta NEO4J_URI en el entorno"))?;
        let neo4j_user = env::var("NEO4J_USER")
            .map_err(|_| anyhow!("Falta NEO4J_USER en el entorno"))?;
        let neo4j_password = env::var("NEO4J_PASSWORD")
            .map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?;

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;
        let openai_api_key = require_api_key(&llm_provider, env::var("OPENAI_API_KEY").ok())?;

        let llm_embedding_model = env::var("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-large".to_string());
        let llm_chat_model = env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4".to_string());
        let embedding_dimensions = parse_var("EMBEDDING_DIMENSIONS", 3072usize)?;

        let vector_index_name = env::var("VECTOR_INDEX_NAME")
            .unwrap_or_else(|_| "soruEmbeddingIndex".to_string());
        let index_batch_size = parse_var("INDEX_BATCH_SIZE", 50usize)?;
        if index_batch_size == 0 {
            return Err(anyhow!("INDEX_BATCH_SIZE debe ser mayor que cero"));
        }

        let raw_dataset_path =
            env::var("RAW_DATASET_PATH").unwrap_or_else(|_| "sorular.csv".to_string());
        let enriched_dataset_path = env::var("ENRICHED_DATASET_PATH")
            .unwrap_or_else(|_| "extracted_questions.csv".to_string());
        let questions_dataset_path = env::var("QUESTIONS_DATASET_PATH")
            .unwrap_or_else(|_| "sorular_cozumleri_featureslerle.csv".to_string());

        let extraction_retry = RetryPolicy::new(
            parse_var("EXTRACTION_MAX_RETRIES", 3usize)?,
            Duration::from_secs(parse_var("EXTRACTION_RETRY_DELAY_SECS", 2u64)?),
        );
        let embedding_retry = RetryPolicy::new(
            parse_var("EMBEDDING_MAX_RETRIES", 5usize)?,
            Duration::from_secs(parse_var("EMBEDDING_RETRY_DELAY_SECS", 5u64)?),
        );
        let recommendation_top_k = parse_var("RECOMMENDATION_TOP_K", DEFAULT_TOP_K)?;

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            server_addr,
            llm_provider,
            openai_api_key,
            llm_embedding_model,
            llm_chat_model,
            embedding_dimensions,
            vector_index_name,
            index_batch_size,
            raw_dataset_path,
            enriched_dataset_path,
            questions_dataset_path,
            extraction_retry,
            embedding_retry,
            recommendation_top_k,
        })
    }
}

/// Con OpenAI la clave es obligatoria; se valida al arrancar y no en cada llamada.
fn require_api_key(provider: &LlmProvider, raw: Option<String>) -> Result<Option<String>> {
    let key = raw.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    if *provider == LlmProvider::OpenAI && key.is_none() {
        return Err(anyhow!(
            "Falta OPENAI_API_KEY en el entorno (obligatoria con LLM_PROVIDER=openai)"
        ));
    }
    Ok(key)
}

/// Lee una variable numérica opcional; si existe pero no parsea, es un error de configuración.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido para {name}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parsing_is_case_insensitive() {
        assert_eq!(LlmProvider::from_str("OpenAI").unwrap(), LlmProvider::OpenAI);
        assert_eq!(LlmProvider::from_str("ollama").unwrap(), LlmProvider::Ollama);
        assert!(LlmProvider::from_str("bedrock").is_err());
    }

    #[test]
    fn numeric_variables_fall_back_and_reject_garbage() {
        // Nombres únicos para no interferir con otros tests en paralelo.
        env::remove_var("SORU_TEST_UNSET_NUMBER");
        assert_eq!(parse_var("SORU_TEST_UNSET_NUMBER", 7usize).unwrap(), 7);

        env::set_var("SORU_TEST_BAD_NUMBER", "cincuenta");
        assert!(parse_var("SORU_TEST_BAD_NUMBER", 50usize).is_err());

        env::set_var("SORU_TEST_GOOD_NUMBER", " 25 ");
        assert_eq!(parse_var("SORU_TEST_GOOD_NUMBER", 50usize).unwrap(), 25);
    }

    #[test]
    fn openai_requires_an_api_key() {
        assert!(require_api_key(&LlmProvider::OpenAI, None).is_err());
        assert!(require_api_key(&LlmProvider::OpenAI, Some("   ".into())).is_err());
        assert_eq!(
            require_api_key(&LlmProvider::OpenAI, Some(" sk-test ".into())).unwrap(),
            Some("sk-test".to_string())
        );
        // Otros proveedores no la necesitan.
        assert_eq!(require_api_key(&LlmProvider::Ollama, None).unwrap(), None);
    }
}
