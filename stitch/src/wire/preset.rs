//! Content kinds and their executable wrappers
//!
//! A wrapped payload stays runnable on its own. For scripts the wrapper is
//! a named IIFE whose `toString()` gives the agent the raw payload back on
//! the very first load, before anything could be intercepted.

use crate::error::{Result, StitchError};
use crate::wire::marker::Marker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SCRIPT_PREFIX: &str = "(function __STITCH_BUNDLE_WRAPPER__() {";
const SCRIPT_SOURCE_PREFIX: &str = "function __STITCH_BUNDLE_WRAPPER__() {";
const SCRIPT_NOTIFY: &str = r#";if (typeof fetch === 'function' && typeof document !== 'undefined') {
  fetch('/__stitch/message', {
    method: 'POST',
    headers: { 'content-type': 'application/json' },
    body: JSON.stringify({
      type: 'stitch:raw',
      base: document.baseURI,
      payload: __STITCH_BUNDLE_WRAPPER__.toString()
    })
  }).catch(function ignore() {});
}
"#;
const SCRIPT_CLOSE: &str = "}());";
const SCRIPT_SOURCE_CLOSE: &str = "}";

const STYLE_PREFIX: &str = "@media all, (__STITCH_CSS_BUNDLE_WRAPPER__) {";
const STYLE_SUFFIX: &str = "}";

const SVG_PREFIX: &str = r#"<svg width="100" height="100" xmlns="http://www.w3.org/2000/svg">"#;
const SVG_SUFFIX: &str = "</svg>";

/// Kind of content served through one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Script,
    Style,
    Svg,
}

impl ContentKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ContentKind::Script => "text/javascript",
            ContentKind::Style => "text/css",
            ContentKind::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContentKind::Script => "js",
            ContentKind::Style => "css",
            ContentKind::Svg => "svg",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ContentKind::Script => SCRIPT_PREFIX,
            ContentKind::Style => STYLE_PREFIX,
            ContentKind::Svg => SVG_PREFIX,
        }
    }

    pub fn suffix(&self) -> String {
        match self {
            ContentKind::Script => format!("{}{}", SCRIPT_NOTIFY, SCRIPT_CLOSE),
            ContentKind::Style => STYLE_SUFFIX.to_string(),
            ContentKind::Svg => SVG_SUFFIX.to_string(),
        }
    }

    /// Wrap a joined payload so it executes standalone
    pub fn wrap(&self, payload: &str) -> String {
        format!("{}\n{}\n{}", self.prefix(), payload, self.suffix())
    }

    /// Remove the wrapper if present.
    ///
    /// Accepts both the served form and, for scripts, the `toString()` form
    /// of the wrapper function posted back by the page. Unwrapped input is
    /// returned unchanged.
    pub fn strip<'a>(&self, payload: &'a str) -> &'a str {
        let (prefixes, suffixes) = match self {
            ContentKind::Script => (
                vec![SCRIPT_PREFIX, SCRIPT_SOURCE_PREFIX],
                vec![
                    format!("{}{}", SCRIPT_NOTIFY, SCRIPT_CLOSE),
                    format!("{}{}", SCRIPT_NOTIFY, SCRIPT_SOURCE_CLOSE),
                ],
            ),
            _ => (vec![self.prefix()], vec![self.suffix()]),
        };

        let trimmed = payload.trim_start();
        let Some(body) = prefixes.iter().find_map(|p| trimmed.strip_prefix(p)) else {
            return payload;
        };
        let body = body.strip_prefix('\n').unwrap_or(body);

        let tail = body.trim_end();
        let body = suffixes
            .iter()
            .find_map(|s| tail.strip_suffix(s.as_str()))
            .unwrap_or(body);
        body.strip_suffix('\n').unwrap_or(body)
    }

    /// Wrap `text` in this kind's comment syntax
    pub fn comment(&self, text: &str) -> String {
        match self {
            ContentKind::Script | ContentKind::Style => format!("/*! {} */", text),
            ContentKind::Svg => format!("<!-- {} -->", text),
        }
    }

    /// Marker line in this kind's comment syntax
    pub fn marker_line(&self, marker: &Marker) -> Result<String> {
        Ok(self.comment(&marker.payload()?))
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for ContentKind {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "js" | "script" | "javascript" | "text/javascript" | "application/javascript" => {
                Ok(ContentKind::Script)
            }
            "css" | "style" | "text/css" => Ok(ContentKind::Style),
            "svg" | "image/svg+xml" => Ok(ContentKind::Svg),
            other => Err(StitchError::Config(format!("unknown content kind: {}", other))),
        }
    }
}
