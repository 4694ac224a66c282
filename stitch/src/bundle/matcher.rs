//! Namespace request matcher

use axum::http::Method;

fn is_id_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '@' | '-')
}

/// True when `url` addresses the bundle namespace with a GET or HEAD request.
///
/// The namespace segment must be followed by at least one id character.
pub fn matches(url: &str, method: &Method, namespace: &str) -> bool {
    if *method != Method::GET && *method != Method::HEAD {
        return false;
    }

    let prefix = format!("/{}/", namespace);
    url.match_indices(&prefix).any(|(at, _)| {
        url[at + prefix.len()..]
            .chars()
            .next()
            .is_some_and(is_id_char)
    })
}
