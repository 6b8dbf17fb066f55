//! Validation codes and certificate file names.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

pub const VALIDATION_CODE_LEN: usize = 16;

const FILE_NAME_COMPONENT_MAX: usize = 30;

/// Derive a fresh public validation code for an (event, participant) pair.
///
/// The digest covers both identifiers, the issue instant, and a random nonce, so two
/// calls for the same pair still yield different codes. The store's unique index is the
/// backstop against the (negligible) chance of a collision.
pub fn generate_validation_code(
    event_id: i64,
    participant_id: i64,
    issued_at: OffsetDateTime,
) -> String {
    let nonce = Uuid::new_v4();
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{event_id}-{participant_id}-{}-{nonce}",
            issued_at.unix_timestamp_nanos()
        )
        .as_bytes(),
    );
    let mut code = hex::encode_upper(hasher.finalize());
    code.truncate(VALIDATION_CODE_LEN);
    code
}

/// Canonical form used for lookups: trimmed and upper-cased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == VALIDATION_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

/// Storage file name: `certificado_<event>_<participant>_<code>.pdf`.
pub fn build_file_name(event_name: &str, participant_name: &str, code: &str) -> String {
    format!(
        "certificado_{}_{}_{}.pdf",
        sanitize_component(event_name),
        sanitize_component(participant_name),
        code
    )
}

/// File name offered to recipients and download clients.
pub fn download_file_name(code: &str) -> String {
    format!("certificado_{code}.pdf")
}

fn sanitize_component(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end()
        .replace(' ', "_")
        .chars()
        .take(FILE_NAME_COMPONENT_MAX)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ten_thousand_codes_are_distinct_and_well_formed() {
        let now = OffsetDateTime::now_utc();
        let mut seen = HashSet::new();
        for index in 0..10_000i64 {
            let code = generate_validation_code(index % 7, index, now);
            assert!(is_well_formed_code(&code), "malformed code {code}");
            assert!(seen.insert(code), "duplicate code at {index}");
        }
    }

    #[test]
    fn same_pair_yields_different_codes() {
        let now = OffsetDateTime::now_utc();
        assert_ne!(
            generate_validation_code(1, 2, now),
            generate_validation_code(1, 2, now)
        );
    }

    #[test]
    fn normalization_accepts_lowercase_input() {
        let code = normalize_code("  a1b2c3d4e5f60718 ");
        assert_eq!(code, "A1B2C3D4E5F60718");
        assert!(is_well_formed_code(&code));
        assert!(!is_well_formed_code("A1B2"));
        assert!(!is_well_formed_code("A1B2C3D4E5F6071!"));
    }

    #[test]
    fn file_name_strips_punctuation_and_truncates() {
        let name = build_file_name(
            "Semana de Tecnologia: Edição 2025!",
            "José da Silva",
            "ABCDEF0123456789",
        );
        assert_eq!(
            name,
            "certificado_Semana_de_Tecnologia_Edição_20_José_da_Silva_ABCDEF0123456789.pdf"
        );
    }

    #[test]
    fn file_name_keeps_hyphens_and_underscores() {
        let name = build_file_name("Dev-Day_2025", "Ana", "0000000000000000");
        assert_eq!(name, "certificado_Dev-Day_2025_Ana_0000000000000000.pdf");
    }

    #[test]
    fn download_name_uses_code_only() {
        assert_eq!(
            download_file_name("ABCDEF0123456789"),
            "certificado_ABCDEF0123456789.pdf"
        );
    }
}
