//! Course code normalization.
//!
//! Every equality check between course codes in this crate goes through
//! [`base_code`], so `CS2040S`, `CS2040` and `cs2040s` all refer to the same
//! course family when matching prerequisites and requirement slots.

/// Trim and upper-case a course code.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Extract the base of a course code: 2 to 4 leading letters followed by
/// 4 digits. Anything after the digits (section or variant suffix) is
/// dropped. Codes that do not follow this shape are returned normalized
/// but otherwise unchanged.
///
/// A grade qualifier (`CS1010:D`) is stripped first.
pub fn base_code(code: &str) -> String {
    let code = normalize(strip_qualifier(code));
    let bytes = code.as_bytes();

    let letters = bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    if !(2..=4).contains(&letters) {
        return code;
    }

    let digits = bytes[letters..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits < 4 {
        return code;
    }

    code[..letters + 4].to_owned()
}

/// Remove a trailing `:<grade>` qualifier.
pub fn strip_qualifier(code: &str) -> &str {
    match code.split_once(':') {
        Some((head, _)) => head,
        None => code,
    }
}

/// Returns `true` if two codes share a base.
pub fn same_base(a: &str, b: &str) -> bool {
    base_code(a) == base_code(b)
}

/// Returns `true` if `code` is shaped like a real course code
/// (letters, 4 digits, optional letter suffix).
pub fn looks_like_code(code: &str) -> bool {
    let code = normalize(code);
    let bytes = code.as_bytes();
    let letters = bytes.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    if !(2..=4).contains(&letters) {
        return false;
    }
    let rest = &bytes[letters..];
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    digits == 4 && rest[digits..].iter().all(|b| b.is_ascii_alphabetic()) && rest.len() - digits <= 3
}
