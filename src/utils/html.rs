// src/utils/html.rs

/// Sanitizes teacher feedback before it is stored and shown to students.
///
/// Uses ammonia's whitelist: harmless formatting tags (<b>, <p>) survive,
/// <script>/<iframe> and event-handler attributes are stripped.
pub fn sanitize_feedback(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}
