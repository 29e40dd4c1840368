/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) stay, while <script>, <iframe>
/// and event-handler attributes are stripped. Applied to the free text that
/// quiz authors write and learners read.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes an optional field, dropping it if nothing is left.
pub fn clean_optional(input: Option<String>) -> Option<String> {
    input
        .map(|s| clean_html(&s))
        .filter(|s| !s.trim().is_empty())
}
