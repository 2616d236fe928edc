//! tests/mapping_tests.rs
//! Encabezados, proyección de filas, fechas y armado del mensaje.

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::config::field_mapping::{AliasTable, CanonicalField};
    use crate::error::CampaignError;
    use crate::models::campaign_model::{CampaignRow, CellValue};
    use crate::services::record_mapper::{format_birth_date, map_headers, project_row};
    use crate::services::send_dispatcher::{candidate_addresses, render_template};

    fn headers(names: &[&str]) -> Vec<CellValue> {
        names.iter().map(|n| CellValue::Text(n.to_string())).collect()
    }

    #[test]
    fn test_headers_are_matched_case_and_space_insensitive() {
        let mapping = map_headers(
            &headers(&["NOME ", " CPF", "DDD01", "Telefone_Movel_1"]),
            &AliasTable::default(),
        )
        .unwrap();

        assert_eq!(mapping.index_of(CanonicalField::Name), Some(0));
        assert_eq!(mapping.index_of(CanonicalField::Identifier), Some(1));
        assert_eq!(mapping.index_of(CanonicalField::AreaCode1), Some(2));
        assert_eq!(mapping.index_of(CanonicalField::Phone1), Some(3));
        assert_eq!(mapping.index_of(CanonicalField::Branch), None);
    }

    #[test]
    fn test_first_alias_in_order_wins() {
        let mapping = map_headers(&headers(&["ddd01", "ddd_01", "cpf"]), &AliasTable::default()).unwrap();
        assert_eq!(mapping.index_of(CanonicalField::AreaCode1), Some(1));
    }

    #[test]
    fn test_missing_identifier_column_fails() {
        let err = map_headers(&headers(&["nome", "ddd_01", "tel_01"]), &AliasTable::default()).unwrap_err();
        match err {
            CampaignError::MissingRequiredColumn(field) => assert_eq!(field, "CPF"),
            other => panic!("error inesperado: {:?}", other),
        }
    }

    #[test]
    fn test_project_row_normalizes_values() {
        let mapping = map_headers(
            &headers(&["nome", "cpf", "agencia", "nascimento", "ddd_01", "tel_01", "telefone_movel_01"]),
            &AliasTable::default(),
        )
        .unwrap();
        let raw = vec![
            CellValue::Text(" Ana Souza ".to_string()),
            CellValue::Text("111.222.333-44".to_string()),
            CellValue::Text("0001".to_string()),
            CellValue::Number(45000.0),
            CellValue::Number(41.0),
            CellValue::Text("91234-5678".to_string()),
            CellValue::Text("(41) 99999-0003".to_string()),
        ];

        let row = project_row(&raw, &mapping);
        assert_eq!(row.name, "Ana Souza");
        assert_eq!(row.identifier, "11122233344");
        assert_eq!(row.branch, "0001");
        assert_eq!(row.birth_date, "15/03/2023");
        assert_eq!(row.area_codes[0], "41");
        assert_eq!(row.local_numbers[0], "12345678");
        assert_eq!(row.phones[0], "41999990003");
        assert_eq!(row.area_codes[1], "");
    }

    #[test]
    fn test_short_rows_project_to_empty_fields() {
        let mapping = map_headers(&headers(&["nome", "cpf", "ddd_01"]), &AliasTable::default()).unwrap();
        let row = project_row(&[CellValue::Text("Solo nombre".to_string())], &mapping);
        assert_eq!(row.name, "Solo nombre");
        assert_eq!(row.identifier, "");
        assert_eq!(row.area_codes[0], "");
    }

    #[test]
    fn test_format_birth_date() {
        assert_eq!(format_birth_date(&CellValue::Number(1.0)), "01/01/1900");
        assert_eq!(format_birth_date(&CellValue::Number(45000.0)), "15/03/2023");
        assert_eq!(format_birth_date(&CellValue::Text("5/3/1990".to_string())), "05/03/1990");
        assert_eq!(format_birth_date(&CellValue::Text("05.03.1990".to_string())), "05/03/1990");
        assert_eq!(format_birth_date(&CellValue::Text("1990-03-05".to_string())), "1990-03-05");
        assert_eq!(format_birth_date(&CellValue::Text("sin fecha".to_string())), "sin fecha");
        assert_eq!(format_birth_date(&CellValue::Empty), "");
    }

    #[test]
    fn test_alias_table_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapeo.json");
        fs::write(&path, r#"{ "identifier": ["documento"], "name": ["cliente", "nome"] }"#).unwrap();

        let table = AliasTable::from_file(&path).unwrap();
        assert_eq!(table.aliases(CanonicalField::Identifier), ["documento".to_string()]);
        assert!(table.aliases(CanonicalField::Branch).is_empty());

        let mapping = map_headers(&headers(&["nome", "documento"]), &table).unwrap();
        assert_eq!(mapping.index_of(CanonicalField::Identifier), Some(1));
        assert_eq!(mapping.index_of(CanonicalField::Name), Some(0));
    }

    fn ana() -> CampaignRow {
        CampaignRow {
            name: "Ana Souza".to_string(),
            identifier: "111".to_string(),
            branch: "0001".to_string(),
            ..CampaignRow::default()
        }
    }

    #[test]
    fn test_render_template_replaces_all_placeholders() {
        let text = render_template("Olá @NOME, agência @agencia, CPF @cpf; @nomecompleto", &ana());
        assert_eq!(text, "Olá Ana, agência 0001, CPF 111; Ana Souza");

        let text = render_template("Hi @name (@fullname) @id @branch", &ana());
        assert_eq!(text, "Hi Ana (Ana Souza) 111 0001");
    }

    #[test]
    fn test_render_template_uses_default_name_and_single_pass() {
        let nameless = CampaignRow {
            identifier: "111".to_string(),
            ..CampaignRow::default()
        };
        assert_eq!(render_template("Oi @nome!", &nameless), "Oi Cliente!");

        let tricky = CampaignRow {
            name: "@cpf Silva".to_string(),
            identifier: "111".to_string(),
            ..CampaignRow::default()
        };
        assert_eq!(render_template("@nome/@cpf", &tricky), "@cpf/111");
    }

    #[test]
    fn test_candidates_keep_order_and_drop_duplicates() {
        let row = CampaignRow {
            identifier: "111".to_string(),
            area_codes: ["41".to_string(), String::new(), "11".to_string()],
            local_numbers: ["12345678".to_string(), "87654321".to_string(), "33334444".to_string()],
            phones: ["554112345678".to_string(), "11988887777".to_string(), "123".to_string()],
            ..CampaignRow::default()
        };

        assert_eq!(
            candidate_addresses(&row, "55"),
            vec![
                "554112345678".to_string(),
                "551133334444".to_string(),
                "5511988887777".to_string(),
            ]
        );
    }
}
