use uuid::Uuid;

const HYPHENATED_LENGTH: usize = 36;

/// Accepts only the canonical 8-4-4-4-12 hyphenated UUID text, in any case.
///
/// `Uuid::try_parse` alone also takes the simple, braced and urn forms, so the
/// length pins it to the hyphenated layout. Version and variant bits are not
/// inspected.
pub fn is_valid_identifier(value: &str) -> bool {
    value.len() == HYPHENATED_LENGTH && Uuid::try_parse(value).is_ok()
}
