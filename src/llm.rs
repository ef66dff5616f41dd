//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.
//!
//! El resto del pipeline sólo conoce los traits [`ChatBackend`] y
//! [`EmbeddingBackend`], de modo que los tests usan dobles sin red.

use std::future::Future;

use anyhow::{anyhow, Result};
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts

use crate::config::{AppConfig, LlmProvider};

/// Servicio de chat: un único mensaje de usuario, muestreo determinista.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Servicio de embeddings: un texto de entrada, un vector de salida.
pub trait EmbeddingBackend: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f64>>> + Send;
}

/// Gestor de LLMs y embeddings.
#[derive(Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
}

impl std::fmt::Debug for LlmManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmManager")
            .field("provider", &self.provider)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .finish_non_exhaustive()
    }
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Ok(Self {
            provider: cfg.llm_provider.clone(),
            openai_api_key: cfg.openai_api_key.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
            chat_model: cfg.llm_chat_model.clone(),
        })
    }

    /// Cliente OpenAI con la clave de la configuración. Sin clave es un error,
    /// nunca un pánico dentro de una petición o de un trabajo.
    fn openai_client(&self) -> Result<rig::providers::openai::Client> {
        let key = self
            .openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY no configurada"))?;
        Ok(rig::providers::openai::Client::new(key))
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    async fn embed_with_openai(&self, text: &str) -> Result<Vec<f64>> {
        use rig::providers::openai::TEXT_EMBEDDING_3_LARGE;
        // Trait para client.embedding_model(...)
        use rig::client::EmbeddingsClient as _;

        let client = self.openai_client()?;

        let model_name = if self.embedding_model.is_empty() {
            TEXT_EMBEDDING_3_LARGE
        } else {
            self.embedding_model.as_str()
        };
        let embedding_model = client.embedding_model(model_name);

        let embeddings = embedding_model.embed_texts(vec![text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .map(|e| e.vec)
            .ok_or_else(|| anyhow!("El servicio de embeddings no devolvió ningún vector"))
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    async fn complete_with_openai(&self, prompt: &str) -> Result<String> {
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        let client = self.openai_client()?;

        let model_name = if self.chat_model.is_empty() {
            "gpt-4"
        } else {
            self.chat_model.as_str()
        };

        // Sin preámbulo: todo el contexto viaja en el único mensaje de usuario.
        let agent = client.agent(model_name).temperature(0.0).build();

        let answer = agent.prompt(prompt).await?;
        Ok(answer)
    }
}

impl ChatBackend for LlmManager {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_with_openai(prompt).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para chat",
                other
            )),
        }
    }
}

impl EmbeddingBackend for LlmManager {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        match self.provider {
            LlmProvider::OpenAI => self.embed_with_openai(text).await,
            ref other => Err(anyhow!(
                "Proveedor LLM {:?} aún no implementado para embeddings",
                other
            )),
        }
    }
}
