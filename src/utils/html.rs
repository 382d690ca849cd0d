// src/utils/html.rs

/// Sanitizes user-written HTML with a tag whitelist.
///
/// Safe formatting tags (<b>, <p>, ...) survive; <script> and <iframe>
/// elements are dropped together with their content, as are event-handler
/// attributes such as onclick.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitized text, trimmed; `None` when nothing is left.
pub fn clean_text(input: &str) -> Option<String> {
    let cleaned = clean_html(input.trim());
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
