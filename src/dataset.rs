//! Lectura y escritura de los datasets tabulares (CSV) de preguntas.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{info, warn};

use crate::error::DatasetError;
use crate::models::{
    Metadata, RawQuestionRecord, StructuredQuestionRecord, QUESTION_ID_KEY, QUESTION_TEXT_KEY,
};

/// Columnas que forman el texto combinado que se convierte en embedding, en orden.
pub const COMBINED_TEXT_FIELDS: [&str; 11] = [
    "soru_metni",
    "çözüm",
    "alt_konular",
    "konu",
    "matematik_formulu",
    "meb_kazanım",
    "taxonomy",
    "soru_türü",
    "difficulty",
    "sinif",
    "sik_yapilan_hatalar",
];

/// Una fila cualquiera del dataset de preguntas, con su posición original.
///
/// Sólo se guardan las celdas no vacías: una columna ausente y una celda vacía
/// significan lo mismo.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRow {
    pub position: usize,
    pub fields: Metadata,
}

impl QuestionRow {
    pub fn new(position: usize, fields: Metadata) -> Self {
        let fields = fields
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();
        Self { position, fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Identificador estable: el `soru_id` de la fila o, si falta, su posición.
    pub fn id(&self) -> String {
        self.get(QUESTION_ID_KEY)
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| self.position.to_string())
    }

    pub fn question_text(&self) -> Option<&str> {
        self.get(QUESTION_TEXT_KEY)
    }

    /// Proyección de texto combinado: campos presentes unidos por un espacio.
    pub fn combined_text(&self) -> String {
        COMBINED_TEXT_FIELDS
            .iter()
            .filter_map(|field| self.get(field))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn open(path: &Path) -> Result<csv::Reader<File>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReaderBuilder::new().flexible(true).from_reader(file))
}

fn csv_error(path: &Path, source: csv::Error) -> DatasetError {
    DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Carga el dataset original. Un fichero ilegible es fatal para el lote.
pub fn load_raw_records(path: &Path) -> Result<Vec<RawQuestionRecord>, DatasetError> {
    let mut reader = open(path)?;
    let records = reader
        .deserialize::<RawQuestionRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| csv_error(path, e))?;
    info!("Cargadas {} preguntas desde {}", records.len(), path.display());
    Ok(records)
}

/// Carga cualquier dataset de preguntas como filas genéricas columna → valor.
pub fn load_question_rows(path: &Path) -> Result<Vec<QuestionRow>, DatasetError> {
    let mut reader = open(path)?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        rows.push(QuestionRow::new(position, zip_record(&headers, &record)));
    }
    info!("Cargadas {} filas desde {}", rows.len(), path.display());
    Ok(rows)
}

fn zip_record(headers: &StringRecord, record: &StringRecord) -> Metadata {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.trim_start_matches('\u{feff}').to_string(), v.to_string()))
        .collect()
}

/// Escribe las preguntas enriquecidas. Sin registros no se crea ningún fichero.
///
/// Devuelve `true` si se escribió el fichero.
pub fn write_structured(
    path: &Path,
    records: &[StructuredQuestionRecord],
) -> Result<bool, DatasetError> {
    if records.is_empty() {
        warn!("No hay preguntas enriquecidas; no se escribe {}", path.display());
        return Ok(false);
    }

    let file = File::create(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer
        .write_record(StructuredQuestionRecord::COLUMNS)
        .map_err(|e| csv_error(path, e))?;
    for record in records {
        writer
            .write_record(record.to_row())
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("{} preguntas guardadas en {}", records.len(), path.display());
    Ok(true)
}
