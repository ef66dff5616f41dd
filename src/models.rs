//! Modelos de dominio: preguntas en bruto, preguntas enriquecidas, entradas del
//! índice vectorial y resultados de similitud.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Metadatos de una pregunta indexada: columna → valor.
///
/// El conjunto de claves no es exhaustivo; una clave ausente significa "valor
/// desconocido", nunca un error.
pub type Metadata = BTreeMap<String, String>;

/// Marcador cuando los metadatos no traen el texto de la pregunta.
pub const NOT_AVAILABLE: &str = "N/A";

/// Columna con el texto de la pregunta (en los CSV y en los metadatos).
pub const QUESTION_TEXT_KEY: &str = "soru_metni";
/// Columna con el identificador de la pregunta.
pub const QUESTION_ID_KEY: &str = "soru_id";

/// Fila del dataset original, tal y como llega del CSV. Toda columna ausente
/// se trata como cadena vacía.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawQuestionRecord {
    #[serde(rename = "soru_id")]
    pub id: String,
    #[serde(rename = "soru_metni")]
    pub question: String,
    #[serde(rename = "şıklar")]
    pub choices: String,
    #[serde(rename = "doğru_şık")]
    pub correct_choice: String,
    #[serde(rename = "çözüm")]
    pub solution: String,
    #[serde(rename = "alt_konular")]
    pub subtopics: String,
    #[serde(rename = "meb_kazanım")]
    pub curriculum_outcome: String,
    pub taxonomy: String,
    #[serde(rename = "soru_türü")]
    pub question_type: String,
    #[serde(rename = "konu")]
    pub topic: String,
    #[serde(rename = "cozum_suresi")]
    pub solving_time: String,
    pub difficulty: String,
    #[serde(rename = "sinif")]
    pub grade: String,
    #[serde(rename = "sik_yapilan_hatalar")]
    pub common_mistakes: String,
    #[serde(rename = "matematik_formulu")]
    pub formula: String,
}

impl RawQuestionRecord {
    /// Campos con su etiqueta de columna, en el orden en que se presentan al LLM.
    pub fn labelled_fields(&self) -> [(&'static str, &str); 15] {
        [
            ("soru_id", self.id.as_str()),
            ("soru_metni", self.question.as_str()),
            ("şıklar", self.choices.as_str()),
            ("doğru_şık", self.correct_choice.as_str()),
            ("çözüm", self.solution.as_str()),
            ("alt_konular", self.subtopics.as_str()),
            ("meb_kazanım", self.curriculum_outcome.as_str()),
            ("taxonomy", self.taxonomy.as_str()),
            ("soru_türü", self.question_type.as_str()),
            ("konu", self.topic.as_str()),
            ("cozum_suresi", self.solving_time.as_str()),
            ("difficulty", self.difficulty.as_str()),
            ("sinif", self.grade.as_str()),
            ("sik_yapilan_hatalar", self.common_mistakes.as_str()),
            ("matematik_formulu", self.formula.as_str()),
        ]
    }

    /// Identificador para logs: el `soru_id` o un marcador si falta.
    pub fn display_id(&self) -> &str {
        let id = self.id.trim();
        if id.is_empty() {
            "Bilinmiyor"
        } else {
            id
        }
    }
}

/// Las cinco categorías cerradas de tipo de pregunta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionType {
    Interpretation,
    ProblemSolving,
    Application,
    AnalysisSynthesis,
    CriticalThinking,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        QuestionType::Interpretation,
        QuestionType::ProblemSolving,
        QuestionType::Application,
        QuestionType::AnalysisSynthesis,
        QuestionType::CriticalThinking,
    ];

    /// Nombre canónico, el que se pide al LLM y se persiste.
    pub fn label(self) -> &'static str {
        match self {
            Self::Interpretation => "Yorumlama Soruları",
            Self::ProblemSolving => "Problem Çözme Soruları",
            Self::Application => "Uygulama Soruları",
            Self::AnalysisSynthesis => "Analiz ve Sentez Soruları",
            Self::CriticalThinking => "Eleştirel Düşünme Soruları",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Interpretation => "Verilen bilgi veya metni analiz ederek yorum yapmanızı gerektiren sorulardır. Grafik, tablo veya paragraf yorumlama bu kategoriye girer.",
            Self::ProblemSolving => "Matematiksel veya mantıksal problemleri çözmenizi isteyen sorulardır. Genellikle birden fazla adımda çözüm gerektirir.",
            Self::Application => "Teorik bilgilerinizi pratik durumlara uygulamanızı isteyen sorulardır. Örneğin, fiziksel bir prensibi gerçek bir olaya uygulamak gibi.",
            Self::AnalysisSynthesis => "Birden fazla bilgiyi bir araya getirerek analiz yapmanızı ve yeni bir sonuç çıkarmanızı gerektiren sorulardır.",
            Self::CriticalThinking => "Verilen argümanları değerlendirmenizi ve eleştirmenizi isteyen sorulardır. Doğruyu yanlıştan ayırt etme becerisi önemlidir.",
        }
    }

    /// Acepta el nombre canónico con o sin el sufijo "Soruları", sin distinguir
    /// mayúsculas y con la numeración de la lista delante ("2. ...").
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_label(strip_numbering(value));
        Self::ALL.into_iter().find(|kind| {
            let label = normalize_label(kind.label());
            let short = label.trim_end_matches(" soruları").to_string();
            normalized == label || normalized == short
        })
    }
}

fn strip_numbering(value: &str) -> &str {
    let trimmed = value.trim();
    let rest = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() != trimmed.len() {
        rest.trim_start_matches(['.', ')']).trim_start()
    } else {
        trimmed
    }
}

fn normalize_label(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for QuestionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for QuestionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        QuestionType::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("tipo de pregunta desconocido: '{raw}'"))
        })
    }
}

/// Pregunta enriquecida por el LLM. El esquema es cerrado: claves desconocidas,
/// claves ausentes o tipos incorrectos hacen fallar la deserialización.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredQuestionRecord {
    #[serde(rename = "soru_id")]
    pub id: String,
    #[serde(rename = "soru_metni")]
    pub question: String,
    #[serde(rename = "şıklar")]
    pub choices: Vec<String>,
    #[serde(rename = "doğru_şık")]
    pub correct_choice: String,
    #[serde(rename = "çözüm")]
    pub solution: String,
    #[serde(rename = "alt_konular")]
    pub subtopics: Vec<String>,
    #[serde(rename = "meb_kazanım")]
    pub curriculum_outcome: String,
    pub taxonomy: String,
    #[serde(rename = "soru_türü")]
    pub question_type: QuestionType,
    #[serde(rename = "konu")]
    pub topic: String,
    #[serde(rename = "cozum_suresi")]
    pub solving_time: String,
    pub difficulty: String,
    #[serde(rename = "sinif")]
    pub grade: String,
    #[serde(rename = "sik_yapilan_hatalar")]
    pub common_mistakes: Vec<String>,
    #[serde(rename = "matematik_formulu")]
    pub formula: String,
    #[serde(rename = "ek_not", default)]
    pub note: Option<String>,
}

impl StructuredQuestionRecord {
    /// Columnas del CSV de salida, en orden.
    pub const COLUMNS: [&'static str; 16] = [
        "soru_id",
        "soru_metni",
        "şıklar",
        "doğru_şık",
        "çözüm",
        "alt_konular",
        "meb_kazanım",
        "taxonomy",
        "soru_türü",
        "konu",
        "cozum_suresi",
        "difficulty",
        "sinif",
        "sik_yapilan_hatalar",
        "matematik_formulu",
        "ek_not",
    ];

    /// Comprobaciones que el tipo no expresa por sí solo.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("'soru_metni' vacío".to_string());
        }
        if self.choices.is_empty() {
            return Err("'şıklar' no contiene opciones".to_string());
        }
        Ok(())
    }

    /// Valores de la fila en el orden de [`Self::COLUMNS`]; las listas se
    /// escriben como arrays JSON.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.question.clone(),
            list_literal(&self.choices),
            self.correct_choice.clone(),
            self.solution.clone(),
            list_literal(&self.subtopics),
            self.curriculum_outcome.clone(),
            self.taxonomy.clone(),
            self.question_type.label().to_string(),
            self.topic.clone(),
            self.solving_time.clone(),
            self.difficulty.clone(),
            self.grade.clone(),
            list_literal(&self.common_mistakes),
            self.formula.clone(),
            self.note.clone().unwrap_or_default(),
        ]
    }

}

fn list_literal(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Entrada del índice vectorial: id estable, vector y metadatos de la fila.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f64>,
    pub metadata: Metadata,
}

/// Candidato devuelto por una consulta top-k.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub id: String,
    pub score: f64,
    pub metadata: Metadata,
}

/// Pregunta recomendada tal y como se entrega al usuario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub question_text: String,
    pub score: f64,
}

impl From<SimilarityMatch> for Recommendation {
    fn from(m: SimilarityMatch) -> Self {
        let question_text = m
            .metadata
            .get(QUESTION_TEXT_KEY)
            .filter(|text| !text.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Self {
            id: m.id,
            question_text,
            score: m.score,
        }
    }
}

// ---------------------------------------------------------------------
// OPCIONES DE RESPUESTA
// ---------------------------------------------------------------------

/// Estrategias para leer la columna de opciones, probadas en orden.
///
/// `DelimiterSplit` es ambigua: una opción que contenga una coma se parte en dos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceStrategy {
    /// Lista literal: `['3', '4']`, `["3","4"]` o `[3, 4]`.
    LiteralList,
    /// Separación ingenua por comas.
    DelimiterSplit,
}

impl ChoiceStrategy {
    pub const ORDER: [ChoiceStrategy; 2] = [ChoiceStrategy::LiteralList, ChoiceStrategy::DelimiterSplit];

    pub fn parse(self, raw: &str) -> Option<Vec<String>> {
        match self {
            Self::LiteralList => parse_list_literal(raw),
            Self::DelimiterSplit => Some(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        }
    }
}

/// Opciones de respuesta a partir del valor bruto de la columna.
pub fn parse_choices(raw: &str) -> Vec<String> {
    ChoiceStrategy::ORDER
        .into_iter()
        .find_map(|strategy| strategy.parse(raw))
        .unwrap_or_default()
}

fn parse_list_literal(raw: &str) -> Option<Vec<String>> {
    let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };

        if first == '\'' || first == '"' {
            chars.next();
            let mut item = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next()? {
                        'n' => item.push('\n'),
                        't' => item.push('\t'),
                        other => item.push(other),
                    },
                    c if c == first => {
                        closed = true;
                        break;
                    }
                    c => item.push(c),
                }
            }
            if !closed {
                return None;
            }
            items.push(item);
        } else {
            let mut item = String::new();
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                item.push(c);
                chars.next();
            }
            let item = item.trim();
            if item.is_empty() || item.contains(['\'', '"', '[', ']']) {
                return None;
            }
            items.push(item.to_string());
        }

        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') | None => {}
            Some(_) => return None,
        }
    }

    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured_json() -> serde_json::Value {
        json!({
            "soru_id": "1",
            "soru_metni": "2+2=?",
            "şıklar": ["3", "4", "5"],
            "doğru_şık": "4",
            "çözüm": "2 ile 2 toplanır.",
            "alt_konular": ["Toplama"],
            "meb_kazanım": "9.1.1",
            "taxonomy": "Bilgi",
            "soru_türü": "Problem Çözme Soruları",
            "konu": "Sayılar",
            "cozum_suresi": "30 saniye",
            "difficulty": "kolay",
            "sinif": "9",
            "sik_yapilan_hatalar": [],
            "matematik_formulu": "a+b",
            "ek_not": null
        })
    }

    #[test]
    fn question_type_accepts_label_variants() {
        assert_eq!(QuestionType::parse("Problem Çözme Soruları"), Some(QuestionType::ProblemSolving));
        assert_eq!(QuestionType::parse("problem çözme"), Some(QuestionType::ProblemSolving));
        assert_eq!(QuestionType::parse("4. Analiz ve Sentez Soruları"), Some(QuestionType::AnalysisSynthesis));
        assert_eq!(QuestionType::parse("Eleştirel  Düşünme"), Some(QuestionType::CriticalThinking));
        assert_eq!(QuestionType::parse("Çoktan seçmeli"), None);
    }

    #[test]
    fn structured_record_parses_closed_schema() {
        let record: StructuredQuestionRecord = serde_json::from_value(structured_json()).unwrap();
        assert_eq!(record.id, "1");
        assert_eq!(record.question_type, QuestionType::ProblemSolving);
        assert_eq!(record.note, None);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn structured_record_rejects_unknown_missing_and_mistyped_fields() {
        let mut extra = structured_json();
        extra["yorum"] = json!("fazladan");
        assert!(serde_json::from_value::<StructuredQuestionRecord>(extra).is_err());

        let mut missing = structured_json();
        missing.as_object_mut().unwrap().remove("konu");
        assert!(serde_json::from_value::<StructuredQuestionRecord>(missing).is_err());

        let mut mistyped = structured_json();
        mistyped["şıklar"] = json!("3, 4, 5");
        assert!(serde_json::from_value::<StructuredQuestionRecord>(mistyped).is_err());

        let mut bad_type = structured_json();
        bad_type["soru_türü"] = json!("Test Sorusu");
        assert!(serde_json::from_value::<StructuredQuestionRecord>(bad_type).is_err());
    }

    #[test]
    fn validation_rejects_empty_question_or_choices() {
        let mut record: StructuredQuestionRecord = serde_json::from_value(structured_json()).unwrap();
        record.choices.clear();
        assert!(record.validate().is_err());
        record.choices.push("4".into());
        record.question = "  ".into();
        assert!(record.validate().is_err());
    }

    #[test]
    fn row_follows_column_order() {
        let record: StructuredQuestionRecord = serde_json::from_value(structured_json()).unwrap();
        let row = record.to_row();
        assert_eq!(row.len(), StructuredQuestionRecord::COLUMNS.len());
        assert_eq!(row[2], r#"["3","4","5"]"#);
        assert_eq!(row[8], "Problem Çözme Soruları");
        assert_eq!(row[1], "2+2=?");
        assert_eq!(row[15], "");
    }

    #[test]
    fn recommendation_falls_back_when_text_missing() {
        let m = SimilarityMatch { id: "7".into(), score: 0.8, metadata: Metadata::new() };
        let rec = Recommendation::from(m);
        assert_eq!(rec.question_text, NOT_AVAILABLE);
        assert_eq!(rec.id, "7");
    }

    #[test]
    fn literal_lists_are_parsed_first() {
        assert_eq!(parse_choices("['3', '4', '5']"), vec!["3", "4", "5"]);
        assert_eq!(parse_choices(r#"["x, y", "z"]"#), vec!["x, y", "z"]);
        assert_eq!(parse_choices("[1, 2.5, -3]"), vec!["1", "2.5", "-3"]);
        assert_eq!(parse_choices(r"['it\'s', 'ok']"), vec!["it's", "ok"]);
        assert!(parse_choices("[]").is_empty());
    }

    #[test]
    fn falls_back_to_naive_split() {
        assert_eq!(parse_choices("A) 3, B) 4, C) 5"), vec!["A) 3", "B) 4", "C) 5"]);
        // Lista sin cerrar: la estrategia literal falla y la coma interna parte la opción.
        assert_eq!(parse_choices("['1,5', '2'"), vec!["['1", "5'", "'2'"]);
        assert!(parse_choices("").is_empty());
    }
}
