// Prompt for the CV review call.
// The JSON keys requested here must match `ReviewResult`'s serde names.

const REVIEW_INSTRUCTIONS: &str = "\
You are an expert recruiter. Evaluate the following CV against the provided job vacancy.

Respond ONLY with a valid JSON object (no additional text) with EXACTLY these fields:
{
  \"apto\": \"yes\" or \"no\",
  \"puntuacion\": integer between 0 and 100,
  \"competenciasFaltantes\": [array of strings],
  \"cursosRecomendados\": [array of strings],
  \"resumen\": \"brief justification\"
}
";

const REVIEW_RULES: &str = "\
If you cannot determine a field, return it with a default value (for example puntuacion: 0 or an empty array).
Do not include comments, explanations, markdown or any text outside the JSON object.
";

/// Builds the review instruction for one CV / vacancy pair.
///
/// Both texts are escaped so they stay inside their quoted slots.
pub fn build_prompt(cv_text: &str, vacancy_text: &str) -> String {
    format!(
        "{REVIEW_INSTRUCTIONS}\nCV_TEXT: \"{}\"\n\nVACANCY: \"{}\"\n\n{REVIEW_RULES}",
        escape_literal(cv_text),
        escape_literal(vacancy_text),
    )
}

/// Escapes text for embedding in a double-quoted string literal.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
