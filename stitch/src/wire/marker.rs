//! Trailing meta marker

use crate::error::{Result, StitchError};
use serde::{Deserialize, Serialize};

const TAG: &str = "Stitch meta(";

/// Comment syntaxes a marker may be wrapped in
const COMMENTS: [(&str, &str); 2] = [("/*!", "*/"), ("<!--", "-->")];

/// Structured data carried by a marker line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub cache: bool,
}

impl Marker {
    pub fn new(name: impl Into<String>, version: Option<String>, cache: bool) -> Self {
        Self {
            name: name.into(),
            version,
            cache,
        }
    }

    /// Marker payload without the comment delimiters: `Stitch meta({...})`
    pub fn payload(&self) -> Result<String> {
        // `*/` inside a value would close the comment early
        let json = serde_json::to_string(self)?.replace("*/", "*\\/");
        Ok(format!("{}{})", TAG, json))
    }

    /// Render as a `/*! ... */` comment line
    pub fn render(&self) -> Result<String> {
        Ok(format!("/*! {} */", self.payload()?))
    }

    /// Parse one line.
    ///
    /// Returns `Ok(None)` for ordinary body lines and an error for lines that
    /// look like a marker but carry malformed data.
    pub fn parse_line(line: &str) -> Result<Option<Marker>> {
        let line = line.trim();

        for (open, close) in COMMENTS {
            let Some(inner) = line
                .strip_prefix(open)
                .and_then(|rest| rest.strip_suffix(close))
            else {
                continue;
            };

            let Some(data) = inner.trim().strip_prefix(TAG) else {
                continue;
            };

            let json = data
                .strip_suffix(')')
                .ok_or_else(|| StitchError::Parse(format!("unterminated marker: {}", line)))?;

            return serde_json::from_str(json)
                .map(Some)
                .map_err(|e| StitchError::Parse(format!("invalid marker {}: {}", line, e)));
        }

        Ok(None)
    }

    pub fn id(&self) -> String {
        crate::bundle::identifier(&self.name, self.version.as_deref())
    }
}
