//! services/phone_normalizer.rs
//! Conversión de fragmentos de teléfono de la planilla a direcciones marcables.
//! Funciones puras, sin I/O.

/// Dígito de prefijo móvil que se descarta en números locales de 9 dígitos
const MOBILE_PREFIX: char = '9';
/// Largo mínimo de una dirección completa (país + DDD + número local)
const MIN_FULL_ADDRESS_LEN: usize = 12;

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Clave canónica del tenant: los dígitos de su número, sin sufijo `@c.us`.
/// Es la misma clave para el control de campaña única, el almacén y los archivos.
pub fn tenant_key(raw: &str) -> Option<String> {
    let number = raw.split('@').next().unwrap_or_default();
    Some(digits_only(number)).filter(|digits| !digits.is_empty())
}

/// Deja solo dígitos y, si quedan 9 con prefijo móvil, se queda con los 8 finales.
/// Nunca falla; puede devolver una cadena vacía.
pub fn normalize_phone(raw: &str) -> String {
    let digits = digits_only(raw);
    if digits.len() == 9 && digits.starts_with(MOBILE_PREFIX) {
        return digits[1..].to_string();
    }
    digits
}

/// `país + DDD + número`; None si falta alguna parte o el resultado es corto.
pub fn compose_full_address(country_code: &str, area_code: &str, local_number: &str) -> Option<String> {
    let area = digits_only(area_code);
    let local = digits_only(local_number);
    if area.is_empty() || local.is_empty() {
        return None;
    }

    let address = format!("{}{}{}", country_code, area, local);
    if address.len() < MIN_FULL_ADDRESS_LEN {
        return None;
    }
    Some(address)
}

/// Teléfono libre: 12-13 dígitos ya vienen con código de país; 10-11 dígitos
/// son locales y se les antepone el país. Cualquier otro largo => None.
pub fn reconcile_free_form_number(country_code: &str, raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    match digits.len() {
        12 | 13 => Some(digits),
        10 | 11 => Some(format!("{}{}", country_code, digits)),
        _ => None,
    }
}
