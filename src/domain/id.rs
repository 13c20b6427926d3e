//! Run ID generation
//!
//! Run IDs use the format: `{6-char-hex}-run-{slug}`.
//! Example: `019430-run-solve-for-x`.

/// Generate a run ID from the original input
pub fn generate_run_id(input: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    let slug = slugify(input, 32);
    if slug.is_empty() {
        format!("{hex_prefix}-run")
    } else {
        format!("{hex_prefix}-run-{slug}")
    }
}

/// Slugify free text for use in IDs, capped at `max_len` chars
fn slugify(text: &str, max_len: usize) -> String {
    let slug = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    slug.chars().take(max_len).collect::<String>()
        .trim_end_matches('-')
        .to_string()
}
