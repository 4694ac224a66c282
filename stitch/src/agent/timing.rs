//! `Server-Timing` header describing one intercepted request

use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct ServerTiming {
    entries: Vec<String>,
}

impl ServerTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name;desc="id,id"`
    pub fn ids(&mut self, name: &str, ids: &[String]) -> &mut Self {
        let desc = ids.join(",").replace('\\', "\\\\").replace('"', "\\\"");
        self.entries.push(format!("{};desc=\"{}\"", name, desc));
        self
    }

    /// Add `name;dur=<milliseconds>`
    pub fn duration(&mut self, name: &str, elapsed: Duration) -> &mut Self {
        self.entries
            .push(format!("{};dur={:.3}", name, elapsed.as_secs_f64() * 1000.0));
        self
    }

    pub fn header_value(&self) -> String {
        self.entries.join(", ")
    }
}
