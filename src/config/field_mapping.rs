//! config/field_mapping.rs
//! Tabla de alias: campo canónico -> lista ordenada de encabezados aceptados.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    Identifier,
    Branch,
    BirthDate,
    AreaCode1,
    AreaCode2,
    AreaCode3,
    LocalNumber1,
    LocalNumber2,
    LocalNumber3,
    Phone1,
    Phone2,
    Phone3,
}

impl CanonicalField {
    pub fn area_code(slot: usize) -> CanonicalField {
        match slot {
            0 => CanonicalField::AreaCode1,
            1 => CanonicalField::AreaCode2,
            _ => CanonicalField::AreaCode3,
        }
    }

    pub fn local_number(slot: usize) -> CanonicalField {
        match slot {
            0 => CanonicalField::LocalNumber1,
            1 => CanonicalField::LocalNumber2,
            _ => CanonicalField::LocalNumber3,
        }
    }

    pub fn phone(slot: usize) -> CanonicalField {
        match slot {
            0 => CanonicalField::Phone1,
            1 => CanonicalField::Phone2,
            _ => CanonicalField::Phone3,
        }
    }

    /// Nombre mostrado al operador cuando falta la columna.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::Name => "NOME",
            CanonicalField::Identifier => "CPF",
            CanonicalField::Branch => "AGENCIA",
            CanonicalField::BirthDate => "NASCIMENTO",
            CanonicalField::AreaCode1 => "DDD_01",
            CanonicalField::AreaCode2 => "DDD_02",
            CanonicalField::AreaCode3 => "DDD_03",
            CanonicalField::LocalNumber1 => "TEL_01",
            CanonicalField::LocalNumber2 => "TEL_02",
            CanonicalField::LocalNumber3 => "TEL_03",
            CanonicalField::Phone1 => "TELEFONE_01",
            CanonicalField::Phone2 => "TELEFONE_02",
            CanonicalField::Phone3 => "TELEFONE_03",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<CanonicalField, Vec<String>>,
}

impl AliasTable {
    /// Carga una tabla desde un JSON `{ "identifier": ["cpf"], ... }`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer la tabla de alias {:?}", path))?;
        let table: AliasTable = serde_json::from_str(&raw)
            .with_context(|| format!("Tabla de alias inválida en {:?}", path))?;
        Ok(table)
    }

    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.entries.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = CanonicalField> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        let pairs: [(CanonicalField, &[&str]); 13] = [
            (CanonicalField::Name, &["nome"]),
            (CanonicalField::Identifier, &["cpf"]),
            (CanonicalField::Branch, &["agencia", "prf_depe"]),
            (
                CanonicalField::BirthDate,
                &["nascimento", "dt_nascimento", "data_nascimento", "idade"],
            ),
            (CanonicalField::AreaCode1, &["ddd_01", "ddd01"]),
            (CanonicalField::AreaCode2, &["ddd_02", "ddd02"]),
            (CanonicalField::AreaCode3, &["ddd_03", "ddd03"]),
            (CanonicalField::LocalNumber1, &["tel_01", "tel01"]),
            (CanonicalField::LocalNumber2, &["tel_02", "tel02"]),
            (CanonicalField::LocalNumber3, &["tel_03", "tel03"]),
            (
                CanonicalField::Phone1,
                &["telefone_movel_01", "telefone_movel_1", "telefone_movel"],
            ),
            (
                CanonicalField::Phone2,
                &["telefone_movel_02", "telefone_movel_2", "telefone_movel2"],
            ),
            (
                CanonicalField::Phone3,
                &["telefone_movel_03", "telefone_movel_3", "telefone_movel3"],
            ),
        ];

        let entries = pairs
            .iter()
            .map(|(field, aliases)| (*field, aliases.iter().map(|a| a.to_string()).collect()))
            .collect();
        AliasTable { entries }
    }
}
