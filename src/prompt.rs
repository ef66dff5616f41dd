//! Construcción del prompt de extracción estructurada para una pregunta.
//!
//! El prompt es una composición pura: la misma pregunta y el mismo programa
//! producen siempre el mismo texto.

use std::fmt::Write as _;

use crate::models::{QuestionType, RawQuestionRecord};

const INSTRUCTIONS: &str = r#"Aşağıdaki matematik sorusunu ilgili MEB müfredatına uygun olarak analiz et.
Eksik bilgileri tamamlayarak ve gerekirse yorum ekleyerek aşağıdaki formatta **sadece JSON** çıktısı üret.
Lütfen çıktı, yalnızca aşağıdaki anahtarları içermelidir:"#;

const OUTPUT_SCHEMA: &str = r#"{
  "soru_id": "<soru id'si>",
  "soru_metni": "<soru metni>",
  "şıklar": <şıklar listesi>,
  "doğru_şık": "<doğru şık>",
  "çözüm": "<çözüm açıklaması>",
  "alt_konular": <alt konular listesi>,
  "meb_kazanım": "<MEB kazanım>",
  "taxonomy": "<taxonomy>",
  "soru_türü": "<soru türü>",
  "konu": "<konu>",
  "cozum_suresi": "<çözüm süresi>",
  "difficulty": "<zorluk seviyesi>",
  "sinif": "<sınıf>",
  "sik_yapilan_hatalar": <sık yapılan hatalar listesi>,
  "matematik_formulu": "<matematik formülü>",
  "ek_not": "Varsa ek açıklamalar"
}"#;

const CURRICULUM_RULE: &str = "---------------------------------------------------------";

const JSON_ONLY: &str =
    "Lütfen **sadece JSON formatında** çıktı üret. JSON nesnesi dışında hiçbir açıklama, başlık veya kod bloğu ekleme.";

/// Explicación de las cinco categorías de tipo de pregunta.
pub fn question_type_guide() -> String {
    let mut guide = String::from("**Soru Türleri ve Açıklamaları**:\n");
    for (n, kind) in QuestionType::ALL.iter().enumerate() {
        let _ = writeln!(guide, "{}. {}: {}", n + 1, kind.label(), kind.description());
    }
    guide.push_str(
        "\nLütfen 'soru_türü' alanını yukarıdaki kategorilerden en uygun olanı seçerek, kategori adını aynen yazarak doldurun.",
    );
    guide
}

/// Prompt completo para `record`, con el texto del programa de su curso.
pub fn build_prompt(record: &RawQuestionRecord, curriculum: &str) -> String {
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_SCHEMA);
    prompt.push_str("\n\n");
    prompt.push_str(&question_type_guide());
    prompt.push_str("\n\nSoru bilgileri:\n");
    for (label, value) in record.labelled_fields() {
        let _ = writeln!(prompt, "{label}: {}", value.trim());
    }

    let _ = write!(
        prompt,
        "\nAyrıca, ilgili MEB müfredatı (Sınıf: {}) bilgisi aşağıdadır:\n{CURRICULUM_RULE}\n{}\n{CURRICULUM_RULE}\n\n",
        record.grade.trim(),
        curriculum.trim()
    );
    prompt.push_str(JSON_ONLY);
    prompt
}
