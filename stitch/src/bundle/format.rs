//! Canonical bundle URLs

use reqwest::Url;

/// Point `origin` at `/<namespace>/<id>[/<id>...]`, dropping query and fragment.
///
/// Used for reduced fetches and for per-bundle cache keys.
pub fn format<S: AsRef<str>>(ids: &[S], origin: &Url, namespace: &str) -> Url {
    let mut url = origin.clone();
    let path = ids
        .iter()
        .map(AsRef::as_ref)
        .fold(format!("/{}", namespace), |mut path, id| {
            path.push('/');
            path.push_str(id);
            path
        });

    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_multiple() {
        let origin = Url::parse("https://example.com/some/page?debug=1#hash").unwrap();
        let url = format(&["foo@1.2.9", "bar@2.2.9"], &origin, "stitch");
        assert_eq!(url.as_str(), "https://example.com/stitch/foo@1.2.9/bar@2.2.9");
    }

    #[test]
    fn test_format_single_scoped() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        let url = format(&["@scope/pkg@1.0.0".to_string()], &origin, "stitch");
        assert_eq!(url.as_str(), "http://localhost:3000/stitch/@scope/pkg@1.0.0");
        assert_eq!(url.path(), "/stitch/@scope/pkg@1.0.0");
    }
}
