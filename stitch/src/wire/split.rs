//! Re-split a concatenated payload into chunks

use crate::error::Result;
use crate::wire::{chunk::BundleChunk, marker::Marker, preset::ContentKind};
use tracing::debug;

/// Split `payload` back into its chunks, in payload order.
///
/// The wrapper is stripped first so it does not end up in the first body.
/// Every line above a marker, back to the previous marker, is that chunk's
/// body. Text after the last marker is ignored. A line that looks like a
/// marker but does not parse fails the whole payload.
pub fn split(payload: &str, kind: ContentKind) -> Result<Vec<BundleChunk>> {
    let stripped = kind.strip(payload);
    let mut chunks = Vec::new();
    let mut body = String::new();

    for line in stripped.split_inclusive('\n') {
        match Marker::parse_line(line)? {
            Some(marker) => {
                let text = body.strip_suffix('\n').unwrap_or(&body);
                chunks.push(BundleChunk::from_marker(marker, text));
                body.clear();
            }
            None => body.push_str(line),
        }
    }

    if !body.trim().is_empty() {
        debug!("Ignoring {} trailing bytes after last marker", body.len());
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleRequest;
    use crate::error::StitchError;

    fn chunk(id: &str, body: &str, cacheable: bool) -> BundleChunk {
        BundleChunk::new(&BundleRequest::parse(id), body, cacheable)
    }

    fn join(kind: ContentKind, chunks: &[BundleChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.framed(kind).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_split_single() {
        let payload = join(ContentKind::Script, &[chunk("foo@1", "foo();", true)]);
        let chunks = split(&payload, ContentKind::Script).unwrap();
        assert_eq!(chunks, vec![chunk("foo@1", "foo();", true)]);
    }

    #[test]
    fn test_split_wrapped_multi_line_bodies() {
        let original = vec![
            chunk("foo@1.2.9", "var a = 1;\n\nfunction b() {\n  return a;\n}", true),
            chunk("bar@2.2.9", "console.error('missing');", false),
            chunk("baz", "", true),
        ];
        let payload = ContentKind::Script.wrap(&join(ContentKind::Script, &original));

        let chunks = split(&payload, ContentKind::Script).unwrap();
        assert_eq!(chunks, original);
    }

    #[test]
    fn test_split_style_and_svg() {
        for kind in [ContentKind::Style, ContentKind::Svg] {
            let original = vec![chunk("a@1", ".a { color: red; }", true), chunk("b@1", "x", true)];
            let payload = kind.wrap(&join(kind, &original));
            assert_eq!(split(&payload, kind).unwrap(), original);
        }
    }

    #[test]
    fn test_split_ignores_trailing_text() {
        let payload = format!("{}\nleftover();", join(ContentKind::Script, &[chunk("a", "x", true)]));
        let chunks = split(&payload, ContentKind::Script).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].body, "x");
    }

    #[test]
    fn test_split_without_markers() {
        assert!(split("console.log(1);", ContentKind::Script).unwrap().is_empty());
    }

    #[test]
    fn test_split_malformed_marker_fails() {
        let payload = "x\n/*! Stitch meta({broken) */";
        assert!(matches!(
            split(payload, ContentKind::Script),
            Err(StitchError::Parse(_))
        ));
    }
}
