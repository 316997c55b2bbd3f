use crate::error::AppError;

/// Title derived from the last path segment of a playlist URL, without its
/// extension and truncated if too long.
pub fn title_from_url(url_str: &str) -> Result<String, AppError> {
    let url = url_str
        .parse::<url::Url>()
        .map_err(|e| AppError::InvalidInput(format!("{url_str}: {e}")))?;

    let file_name = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or("stream");

    let stem = match file_name.rfind('.') {
        Some(pos) if pos > 0 => &file_name[..pos],
        _ => file_name,
    };

    // we dont want large filenames
    Ok(stem.chars().take(30).collect())
}

/// One title per URL: the base title itself for a single URL, otherwise
/// `"<base> <index>"` counting from zero.
pub fn output_titles(base: &str, count: usize) -> Vec<String> {
    if count == 1 {
        return vec![base.to_string()];
    }
    (0..count).map(|i| format!("{base} {i}")).collect()
}
