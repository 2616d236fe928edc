//! tests/phone_tests.rs

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::services::phone_normalizer::{
        compose_full_address, normalize_phone, reconcile_free_form_number, tenant_key,
    };

    #[test]
    fn test_normalize_strips_punctuation_and_mobile_prefix() {
        assert_eq!(normalize_phone("(41) 91234-5678"), "41912345678");
        assert_eq!(normalize_phone("91234-5678"), "12345678");
        assert_eq!(normalize_phone("3333-0001"), "33330001");
        assert_eq!(normalize_phone("81234-5678"), "812345678");
        assert_eq!(normalize_phone("sem telefone"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [
            "91234-5678",
            "(41) 3333-0001",
            "912345678",
            "",
            "abc",
            "99xxxxxxx",
            "999999999",
            "9912345678",
            "9 9 1 2 3 4 5 6 7",
        ] {
            let once = normalize_phone(raw);
            assert_eq!(normalize_phone(&once), once, "entrada: {}", raw);
        }
    }

    #[test]
    fn test_compose_full_address() {
        assert_eq!(
            compose_full_address("55", "41", "12345678"),
            Some("554112345678".to_string())
        );
        assert_eq!(compose_full_address("55", "", "12345678"), None);
        assert_eq!(compose_full_address("55", "41", ""), None);
        // 55 + 41 + 1234 queda corto
        assert_eq!(compose_full_address("55", "41", "1234"), None);
    }

    #[test]
    fn test_reconcile_free_form_number() {
        assert_eq!(
            reconcile_free_form_number("55", "+55 (41) 99999-0003"),
            Some("5541999990003".to_string())
        );
        assert_eq!(
            reconcile_free_form_number("55", "554133330001"),
            Some("554133330001".to_string())
        );
        assert_eq!(
            reconcile_free_form_number("55", "(41) 99999-0003"),
            Some("5541999990003".to_string())
        );
        assert_eq!(
            reconcile_free_form_number("55", "4133330001"),
            Some("554133330001".to_string())
        );
        assert_eq!(reconcile_free_form_number("55", "33330001"), None);
        assert_eq!(reconcile_free_form_number("55", "55413333000112"), None);
        assert_eq!(reconcile_free_form_number("55", ""), None);
    }

    #[test]
    fn test_tenant_key_keeps_only_digits() {
        assert_eq!(tenant_key("5541999990000"), Some("5541999990000".to_string()));
        assert_eq!(tenant_key("+55 (41) 99999-0000"), Some("5541999990000".to_string()));
        assert_eq!(tenant_key("5541999990000@c.us"), Some("5541999990000".to_string()));
        assert_eq!(tenant_key("  "), None);
        assert_eq!(tenant_key("@c.us"), None);
    }

    proptest! {
        #[test]
        fn property_normalize_phone_is_idempotent(raw in any::<String>()) {
            let once = normalize_phone(&raw);
            prop_assert_eq!(normalize_phone(&once), once);
        }

        #[test]
        fn property_normalize_phone_on_digit_strings_is_idempotent(raw in "[0-9() +-]{0,16}") {
            let once = normalize_phone(&raw);
            prop_assert!(once.chars().all(|c| c.is_ascii_digit()));
            prop_assert_eq!(normalize_phone(&once), once);
        }
    }
}
