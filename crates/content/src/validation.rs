use quill_core::{DomainError, DomainResult};

/// Trim `value` and require it to be non-empty and at most `max_chars` long.
pub(crate) fn required_text(
    field: &'static str,
    value: &str,
    max_chars: Option<usize>,
) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    if let Some(max) = max_chars {
        if trimmed.chars().count() > max {
            return Err(DomainError::validation(format!(
                "{field} cannot be more than {max} characters"
            )));
        }
    }
    Ok(trimmed.to_string())
}

/// Trimmed value, or `None` when absent or blank.
pub(crate) fn supplied(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
