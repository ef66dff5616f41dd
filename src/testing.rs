//! Dobles de prueba compartidos: chat con respuestas guionizadas, embedder
//! determinista e índice vectorial en memoria.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::error::IndexError;
use crate::llm::{ChatBackend, EmbeddingBackend};
use crate::models::{IndexEntry, SimilarityMatch};
use crate::vector_store::VectorIndex;

pub const TEST_DIMENSIONS: usize = 8;

/// Respuesta JSON válida para una pregunta dada.
pub fn structured_response(id: &str, question: &str) -> String {
    json!({
        "soru_id": id,
        "soru_metni": question,
        "şıklar": ["3", "4", "5"],
        "doğru_şık": "4",
        "çözüm": "İki sayı toplanır.",
        "alt_konular": ["Toplama"],
        "meb_kazanım": "9.1.1",
        "taxonomy": "Bilgi",
        "soru_türü": "Problem Çözme Soruları",
        "konu": "Sayılar",
        "cozum_suresi": "30 saniye",
        "difficulty": "kolay",
        "sinif": "9",
        "sik_yapilan_hatalar": ["3 cevabını vermek"],
        "matematik_formulu": "a+b",
        "ek_not": null
    })
    .to_string()
}

/// Chat que devuelve las respuestas en orden; `Err` simula un fallo de red.
/// Cuando se acaba el guion responde con `fallback`.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Result<String, String>,
    pub calls: AtomicUsize,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<String, String>>, fallback: Result<String, String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatBackend for ScriptedChat {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.map_err(|e| anyhow!(e))
    }
}

/// Chat que contesta según el id que aparece en el prompt; los ids de
/// `failing` reciben siempre texto que no es JSON.
pub struct EchoChat {
    pub failing: HashSet<String>,
    pub calls: AtomicUsize,
}

impl EchoChat {
    pub fn new<I: IntoIterator<Item = &'static str>>(failing: I) -> Self {
        Self {
            failing: failing.into_iter().map(str::to_string).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ChatBackend for EchoChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let field = |label: &str| {
            prompt
                .lines()
                .find_map(|line| line.strip_prefix(&format!("{label}: ")))
                .unwrap_or_default()
                .to_string()
        };
        let id = field("soru_id");
        if self.failing.contains(&id) {
            return Ok("Üzgünüm, bu soruyu analiz edemiyorum.".to_string());
        }
        Ok(structured_response(&id, &field("soru_metni")))
    }
}

/// Embedder determinista: vector de bolsa de caracteres normalizado. Los textos
/// que contienen alguna de las marcas de `failing_markers` fallan siempre.
pub struct HashEmbedder {
    pub dimensions: usize,
    pub failing_markers: Vec<String>,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dimensions: TEST_DIMENSIONS,
            failing_markers: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            failing_markers: markers.iter().map(|m| m.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f64> {
        let mut v = vec![0.0; self.dimensions];
        for (i, b) in text.bytes().enumerate() {
            v[(b as usize + i) % self.dimensions] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        } else {
            v[0] = 1.0;
        }
        v
    }
}

impl EmbeddingBackend for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(anyhow!("HTTP 429 rate limit exceeded"));
        }
        Ok(self.vector_for(text))
    }
}

/// Índice en memoria con similitud coseno que registra cada llamada a upsert.
#[derive(Default)]
pub struct MemoryIndex {
    pub entries: Mutex<Vec<IndexEntry>>,
    pub upsert_calls: Mutex<Vec<Vec<String>>>,
    pub ensure_calls: AtomicUsize,
    /// Lotes (por número de llamada, empezando en 0) que se rechazan.
    pub failing_upserts: HashSet<usize>,
    pub fail_count: bool,
    pub fail_query: bool,
    /// Si está definido, `query` devuelve estos candidatos tal cual.
    pub canned_matches: Option<Vec<SimilarityMatch>>,
}

impl MemoryIndex {
    pub fn upsert_calls(&self) -> Vec<Vec<String>> {
        self.upsert_calls.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().map(|e| e.id.clone()).collect()
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

impl VectorIndex for MemoryIndex {
    async fn ensure_index(&self) -> Result<(), IndexError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn count(&self) -> Result<u64, IndexError> {
        if self.fail_count {
            return Err(IndexError::Rejected("stats no disponibles".into()));
        }
        Ok(self.entries.lock().unwrap().len() as u64)
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let call = {
            let mut calls = self.upsert_calls.lock().unwrap();
            calls.push(entries.iter().map(|e| e.id.clone()).collect());
            calls.len() - 1
        };
        if self.failing_upserts.contains(&call) {
            return Err(IndexError::Rejected(format!("lote {call} rechazado")));
        }
        let mut stored = self.entries.lock().unwrap();
        for entry in entries {
            stored.retain(|e| e.id != entry.id);
            stored.push(entry.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f64], top_k: usize) -> Result<Vec<SimilarityMatch>, IndexError> {
        if self.fail_query {
            return Err(IndexError::Rejected("consulta fallida".into()));
        }
        if let Some(canned) = &self.canned_matches {
            return Ok(canned.clone());
        }
        let mut matches: Vec<SimilarityMatch> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| SimilarityMatch {
                id: e.id.clone(),
                score: cosine(vector, &e.vector),
                metadata: e.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}
