//! services/record_mapper.rs
//! Resuelve encabezados de la planilla contra la tabla de alias y proyecta
//! cada fila cruda a una `CampaignRow` normalizada.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use crate::{
    config::field_mapping::{AliasTable, CanonicalField},
    error::CampaignError,
    models::campaign_model::{CampaignRow, CellValue},
    services::phone_normalizer::normalize_phone,
};

/// 31/12/9999
const MAX_SERIAL_DATE: f64 = 2_958_465.0;

/// Índice de columna por campo canónico. Campos sin columna no aparecen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: HashMap<CanonicalField, usize>,
}

impl ColumnMapping {
    pub fn index_of(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Para cada campo toma el primer alias (en orden) presente en los encabezados.
/// Sin columna de identificador => `MissingRequiredColumn`.
pub fn map_headers(header_row: &[CellValue], aliases: &AliasTable) -> Result<ColumnMapping, CampaignError> {
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| normalize_header(&cell.as_text()))
        .collect();

    let mut columns = HashMap::new();
    for field in aliases.fields() {
        let found = aliases.aliases(field).iter().find_map(|alias| {
            let alias = normalize_header(alias);
            headers.iter().position(|h| *h == alias)
        });
        if let Some(index) = found {
            columns.insert(field, index);
        }
    }

    if !columns.contains_key(&CanonicalField::Identifier) {
        return Err(CampaignError::MissingRequiredColumn(
            CanonicalField::Identifier.label().to_string(),
        ));
    }

    Ok(ColumnMapping { columns })
}

fn cell<'a>(raw_row: &'a [CellValue], mapping: &ColumnMapping, field: CanonicalField) -> Option<&'a CellValue> {
    mapping.index_of(field).and_then(|i| raw_row.get(i))
}

fn text(raw_row: &[CellValue], mapping: &ColumnMapping, field: CanonicalField) -> String {
    cell(raw_row, mapping, field)
        .map(|c| c.as_text().trim().to_string())
        .unwrap_or_default()
}

fn digits(raw_row: &[CellValue], mapping: &ColumnMapping, field: CanonicalField) -> String {
    text(raw_row, mapping, field)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

/// Proyecta una fila cruda; los valores ausentes quedan como cadena vacía.
pub fn project_row(raw_row: &[CellValue], mapping: &ColumnMapping) -> CampaignRow {
    let birth_date = cell(raw_row, mapping, CanonicalField::BirthDate)
        .map(format_birth_date)
        .unwrap_or_default();

    CampaignRow {
        name: text(raw_row, mapping, CanonicalField::Name),
        identifier: digits(raw_row, mapping, CanonicalField::Identifier),
        branch: text(raw_row, mapping, CanonicalField::Branch),
        birth_date,
        area_codes: [0, 1, 2].map(|slot| digits(raw_row, mapping, CanonicalField::area_code(slot))),
        local_numbers: [0, 1, 2]
            .map(|slot| normalize_phone(&text(raw_row, mapping, CanonicalField::local_number(slot)))),
        phones: [0, 1, 2].map(|slot| digits(raw_row, mapping, CanonicalField::phone(slot))),
    }
}

/// Fechas numéricas => código serial de planilla; textos d/m/y, d-m-y o d.m.y
/// con año de 4 dígitos => dd/mm/yyyy. Lo demás pasa sin cambios.
pub fn format_birth_date(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Number(serial) => decode_serial_date(*serial)
            .map(|date| date.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| value.as_text()),
        CellValue::Text(raw) => reformat_date_text(raw.trim()),
    }
}

fn reformat_date_text(raw: &str) -> String {
    let parts: Vec<&str> = raw.split(['/', '-', '.']).collect();
    if let [day, month, year] = parts.as_slice() {
        if year.len() == 4 {
            return format!("{:0>2}/{:0>2}/{}", day, month, year);
        }
    }
    raw.to_string()
}

/// Serial de planilla (sistema 1900, con el 29/02/1900 ficticio en el 60).
fn decode_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_SERIAL_DATE).contains(&serial) {
        return None;
    }
    let days = serial.floor() as i64;
    let base = if days < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    base.checked_add_signed(Duration::days(days))
}
