//! Model-backed collaborators over an Ollama-compatible HTTP API.

pub mod ollama;
pub mod prompt;

pub use ollama::OllamaClient;

/// Slice out the JSON document of a model reply.
///
/// Models often wrap JSON in Markdown code fences or add a sentence around
/// it; both are dropped.
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(fenced) = trimmed.strip_prefix("```") {
        // Skip the info string ("json") up to the first newline
        let body = fenced.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        let body = body.trim_end();
        return body.strip_suffix("```").unwrap_or(body).trim();
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_json_is_kept() {
        assert_eq!(extract_json("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_code_fence_is_removed() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n[1, 2]\n```\n"), "[1, 2]");
    }

    #[test]
    fn test_surrounding_prose_is_removed() {
        assert_eq!(
            extract_json("Here is the result: {\"confidence\": 0.9}. Hope it helps"),
            "{\"confidence\": 0.9}"
        );
        assert_eq!(extract_json("0.9"), "0.9");
    }
}
