/// Token used when a stream sanitizes down to nothing.
const FALLBACK_STREAM: &str = "OTHER";

/// Map the submitted stream, year and session to the name of the record file
/// they belong to, e.g. `("B.Tech CS", "2", "2023-2026")` ->
/// `BTECH_CS_2nd_2023-26.csv`.
///
/// Always returns a non-empty name made of ASCII letters, digits, `_`, `-`
/// and `.`.
pub fn derive_filename(stream: &str, year: &str, session: &str) -> String {
    let assembled = format!(
        "{}_{}_{}.csv",
        sanitize_stream(stream),
        year_ordinal(year),
        session_piece(session)
    );
    assembled
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

fn sanitize_stream(stream: &str) -> String {
    let s: String = stream
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase();
    if s.is_empty() {
        FALLBACK_STREAM.to_string()
    } else {
        s
    }
}

// Only 1-4 are special-cased, so "21" becomes "21th".
fn year_ordinal(year: &str) -> String {
    match year {
        "1" => "1st".to_string(),
        "2" => "2nd".to_string(),
        "3" => "3rd".to_string(),
        "4" => "4th".to_string(),
        other => format!("{other}th"),
    }
}

/// "2023-2026" -> "2023-26". Anything that is not two numeric parts keeps
/// only its digits and hyphens.
fn session_piece(session: &str) -> String {
    let parts: Vec<&str> = session.split('-').collect();
    if let [start, end] = parts.as_slice() {
        if is_numeric(start) && is_numeric(end) {
            let short = &end[end.len().saturating_sub(2)..];
            return format!("{start}-{short}");
        }
    }
    session
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect()
}

fn is_numeric(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}
