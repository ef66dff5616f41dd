//! Estado explícito de una sesión de práctica: pregunta seleccionada, respuesta y
//! recomendaciones.
//!
//! ```text
//! QuestionSelected → AnswerSubmitted → Correct (fin)
//!                                    → Incorrect → RecommendationsRequested
//!                                                  → RecommendationsReady | RecommendationsEmpty
//! ```
//! Seleccionar otra pregunta (p. ej. una recomendada) vuelve a `QuestionSelected`.

use serde::Serialize;

use crate::dataset::QuestionRow;
use crate::error::SessionError;
use crate::models::{parse_choices, Recommendation};

/// Mensaje para el usuario cuando no se pudo recomendar nada.
pub const NO_RECOMMENDATIONS_MESSAGE: &str =
    "Öneri üretilemedi, lütfen daha sonra tekrar deneyiniz.";

/// Etiquetas de los detalles que se muestran de una pregunta.
const DETAIL_FIELDS: [(&str, &str); 8] = [
    ("Çözüm", "çözüm"),
    ("Alt Konular", "alt_konular"),
    ("Konu", "konu"),
    ("MEB Kazanım", "meb_kazanım"),
    ("Taxonomy", "taxonomy"),
    ("Soru Türü", "soru_türü"),
    ("Zorluk", "difficulty"),
    ("Sınıf", "sinif"),
];

const MISSING_DETAIL: &str = "Veri yok";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    QuestionSelected,
    Correct,
    RecommendationsRequested,
    RecommendationsReady { recommendations: Vec<Recommendation> },
    RecommendationsEmpty { message: &'static str },
}

impl SessionPhase {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::QuestionSelected => "question_selected",
            Self::Correct => "correct",
            Self::RecommendationsRequested => "recommendations_requested",
            Self::RecommendationsReady { .. } => "recommendations_ready",
            Self::RecommendationsEmpty { .. } => "recommendations_empty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionDetail {
    pub label: &'static str,
    pub value: String,
}

/// Vista de una pregunta para el cliente.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub question_text: String,
    pub choices: Vec<String>,
    pub details: Vec<QuestionDetail>,
}

impl QuestionView {
    pub fn from_row(row: &QuestionRow) -> Self {
        Self {
            id: row.id(),
            question_text: row.question_text().unwrap_or_default().to_string(),
            choices: parse_choices(row.get("şıklar").unwrap_or_default()),
            details: question_details(row),
        }
    }
}

pub fn question_details(row: &QuestionRow) -> Vec<QuestionDetail> {
    DETAIL_FIELDS
        .iter()
        .map(|&(label, column)| QuestionDetail {
            label,
            value: row.get(column).unwrap_or(MISSING_DETAIL).to_string(),
        })
        .collect()
}

/// Una respuesta es correcta si coincide con la opción correcta salvo espacios.
pub fn is_correct(choice: &str, correct: &str) -> bool {
    choice.trim() == correct.trim()
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    selected: Option<QuestionRow>,
    phase: SessionPhase,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self {
            selected: None,
            phase: SessionPhase::Idle,
        }
    }
}

impl QuizSession {
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<&QuestionRow> {
        self.selected.as_ref()
    }

    /// Cambia de pregunta desde cualquier fase.
    pub fn select(&mut self, row: QuestionRow) {
        self.selected = Some(row);
        self.phase = SessionPhase::QuestionSelected;
    }

    /// Evalúa la respuesta a la pregunta seleccionada.
    ///
    /// `Correct` es final: sólo `select` sale de ahí. Una petición de
    /// recomendaciones que nunca se cerró (cliente desconectado) no bloquea
    /// un nuevo intento.
    pub fn submit_answer(&mut self, choice: &str) -> Result<AnswerOutcome, SessionError> {
        let row = self.selected.as_ref().ok_or(SessionError::NoQuestionSelected)?;
        if matches!(self.phase, SessionPhase::Correct) {
            return Err(SessionError::InvalidTransition(self.phase.name()));
        }

        let correct = row.get("doğru_şık").unwrap_or_default();
        if is_correct(choice, correct) {
            self.phase = SessionPhase::Correct;
            Ok(AnswerOutcome::Correct)
        } else {
            self.phase = SessionPhase::RecommendationsRequested;
            Ok(AnswerOutcome::Incorrect)
        }
    }

    /// Texto con el que pedir recomendaciones, sólo tras una respuesta incorrecta.
    pub fn recommendation_query(&self) -> Result<String, SessionError> {
        if !matches!(self.phase, SessionPhase::RecommendationsRequested) {
            return Err(SessionError::InvalidTransition(self.phase.name()));
        }
        let row = self.selected.as_ref().ok_or(SessionError::NoQuestionSelected)?;
        Ok(row.question_text().unwrap_or_default().to_string())
    }

    /// Cierra la petición de recomendaciones con su resultado.
    pub fn complete_recommendations(
        &mut self,
        recommendations: Vec<Recommendation>,
    ) -> Result<&SessionPhase, SessionError> {
        if !matches!(self.phase, SessionPhase::RecommendationsRequested) {
            return Err(SessionError::InvalidTransition(self.phase.name()));
        }
        self.phase = if recommendations.is_empty() {
            SessionPhase::RecommendationsEmpty {
                message: NO_RECOMMENDATIONS_MESSAGE,
            }
        } else {
            SessionPhase::RecommendationsReady { recommendations }
        };
        Ok(&self.phase)
    }
}
