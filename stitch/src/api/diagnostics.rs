//! Inert diagnostic bodies for bundles that could not be produced
//!
//! Scripts get a snippet that logs a console group and is safe to run on
//! its own. Other kinds get a comment, since they cannot execute anything.

use crate::bundle::BundleRequest;
use crate::wire::ContentKind;

const LOG_PREFIX: &str = "[STITCH] ";

/// Body for a bundle no handler produced
pub fn missing(request: &BundleRequest, kind: ContentKind) -> String {
    let lines = [
        format!("404: Could not find the requested bundle {}", request.id),
        "The following issues can cause this:".to_string(),
        "1. (client-side) The name of the bundle is misspelled".to_string(),
        "2. (server-side) The bundle is not registered with the server".to_string(),
        "3. (client/server-side) The requested version is not available".to_string(),
    ];
    render(&lines, kind)
}

/// Body for a bundle whose handler failed
pub fn failure(request: &BundleRequest, error: &str, kind: ContentKind) -> String {
    let lines = [
        format!("500: An error occurred while loading bundle {}", request.id),
        format!("Error message: {}", error),
        "This is most likely caused by an error in your bundle handler".to_string(),
    ];
    render(&lines, kind)
}

fn render(lines: &[String], kind: ContentKind) -> String {
    match kind {
        ContentKind::Script => console_group(lines),
        ContentKind::Style | ContentKind::Svg => {
            let text = lines
                .iter()
                .map(|line| format!("{}{}", LOG_PREFIX, line))
                .collect::<Vec<_>>()
                .join(" | ")
                .replace("*/", "* /")
                .replace("--", "- -");
            kind.comment(&text)
        }
    }
}

fn console_group(lines: &[String]) -> String {
    let mut calls = Vec::with_capacity(lines.len() + 1);
    for (index, line) in lines.iter().enumerate() {
        let method = if index == 0 { "group" } else { "error" };
        calls.push(format!("    ['{}', {}],", method, js_string(line)));
    }
    calls.push("    ['groupEnd']".to_string());

    format!(
        "if (typeof console !== 'undefined' && console.error && console.group) {{\n  [\n{}\n  ].forEach(function log(line) {{\n    console[line[0]](line[1] ? {} + line[1] : undefined);\n  }});\n}}",
        calls.join("\n"),
        js_string(LOG_PREFIX)
    )
}

/// JSON string literal, which is also a valid JS string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_script() {
        let body = missing(&BundleRequest::parse("foo@1.2.9"), ContentKind::Script);
        assert!(body.contains("\"404: Could not find the requested bundle foo@1.2.9\""));
        assert!(body.contains("\"[STITCH] \""));
        assert!(body.contains("['groupEnd']"));
    }

    #[test]
    fn test_failure_escapes_message() {
        let body = failure(
            &BundleRequest::parse("foo@1"),
            "bad \"quote\"\nnewline",
            ContentKind::Script,
        );
        assert!(body.contains(r#"Error message: bad \"quote\"\nnewline"#));
    }

    #[test]
    fn test_style_diagnostic_is_a_single_comment() {
        let body = failure(&BundleRequest::parse("a"), "oops */ --", ContentKind::Style);
        assert!(body.starts_with("/*! [STITCH] 500"));
        assert_eq!(body.matches("*/").count(), 1);
        assert!(!body.contains('\n'));
    }
}
