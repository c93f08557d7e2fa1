//! Security utilities for input validation and sanitization

use anyhow::Result;

/// Upper bound for the sanitized filename segment of a storage key
pub const MAX_SANITIZED_FILENAME_LEN: usize = 100;

/// Upper bound for user-facing display names
pub const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Extensions longer than this are treated as part of the stem when truncating
const MAX_PRESERVED_EXTENSION_LEN: usize = 10;

/// Validate a user-supplied display name (rename, custom upload name).
///
/// Display names are stored verbatim in the metadata row, so this only rejects
/// input that can never be a file name. Storage keys always go through
/// [`sanitize_filename`] separately.
pub fn validate_display_name(name: &str) -> Result<String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Filename cannot be empty"));
    }

    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(anyhow::anyhow!(
            "Filename too long (max {} characters)",
            MAX_DISPLAY_NAME_LEN
        ));
    }

    if trimmed.contains('\0') {
        return Err(anyhow::anyhow!("Filename contains null bytes"));
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(anyhow::anyhow!("Filename cannot contain path separators"));
    }

    if trimmed.chars().any(|ch| ch.is_control()) {
        return Err(anyhow::anyhow!("Filename contains control characters"));
    }

    if trimmed == "." || trimmed == ".." {
        return Err(anyhow::anyhow!("Filename cannot be a relative path reference"));
    }

    Ok(trimmed.to_string())
}

/// Sanitize a filename for use inside a storage key.
///
/// The output only ever contains ASCII letters, digits, `-`, `_` and single
/// `.` characters. Path separators and whitespace become `_`, runs collapse,
/// everything else (control characters, emoji, punctuation) is dropped and the
/// result is truncated to [`MAX_SANITIZED_FILENAME_LEN`] while keeping a short
/// extension intact.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::with_capacity(filename.len());

    for ch in filename.chars() {
        let mapped = match ch {
            c if c.is_ascii_alphanumeric() || c == '-' => Some(c),
            '.' => Some('.'),
            '_' | '/' | '\\' => Some('_'),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        };

        let Some(c) = mapped else { continue };

        // Collapse runs of separators and dots so `..` can never survive
        match (sanitized.chars().last(), c) {
            (Some('_'), '_') | (Some('.'), '.') => continue,
            _ => sanitized.push(c),
        }
    }

    let trimmed = sanitized.trim_matches(|c| c == '.' || c == '_' || c == '-');
    let truncated = truncate_preserving_extension(trimmed, MAX_SANITIZED_FILENAME_LEN);

    if truncated.is_empty() {
        "file".to_string()
    } else {
        truncated
    }
}

/// Truncate an ASCII filename to `max_len` bytes, keeping a short extension.
fn truncate_preserving_extension(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    match name.rfind('.') {
        Some(dot) if name.len() - dot <= MAX_PRESERVED_EXTENSION_LEN + 1 && dot > 0 => {
            let extension = &name[dot..];
            let stem_budget = max_len.saturating_sub(extension.len());
            let stem = name[..dot.min(stem_budget)].trim_end_matches(|c| c == '.' || c == '_' || c == '-');
            format!("{}{}", stem, extension)
        }
        _ => name[..max_len].trim_end_matches(|c| c == '.' || c == '_' || c == '-').to_string(),
    }
}
