//! Free-text sanitization for values written to the backend.
//!
//! Incident titles, descriptions and JSON payloads are rendered by the
//! dashboard, so angle brackets, script URL schemes and inline event handler
//! attributes are stripped before they are stored.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

/// Strips markup and script vectors from user-supplied text.
#[derive(Debug, Clone)]
pub struct InputSanitizer {
    /// Patterns removed from the input, in order.
    patterns: Vec<Regex>,
}

impl Default for InputSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSanitizer {
    const DEFAULT_PATTERNS: &'static [&'static str] = &[
        // Angle brackets
        r"[<>]",
        // Script-capable URL schemes
        r"(?i)javascript:",
        // Inline event handlers: onclick=, onerror=, ...
        r"(?i)on\w+=",
        r"(?i)data:",
        r"(?i)vbscript:",
    ];

    /// Creates a sanitizer with the default patterns.
    pub fn new() -> Self {
        // Constant patterns, validated by the tests below
        let patterns = Self::DEFAULT_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("Invalid default sanitizer pattern"))
            .collect();
        Self { patterns }
    }

    /// Returns a process-wide default sanitizer.
    pub fn shared() -> &'static InputSanitizer {
        static SHARED: OnceLock<InputSanitizer> = OnceLock::new();
        SHARED.get_or_init(InputSanitizer::new)
    }

    /// Trims `input` and removes every dangerous pattern.
    ///
    /// Removal repeats until nothing matches, so fragments such as
    /// `javajavascript:script:` cannot reassemble into a scheme.
    pub fn sanitize(&self, input: &str) -> String {
        let mut current = input.trim().to_string();
        loop {
            let mut next = current.clone();
            for pattern in &self.patterns {
                next = pattern.replace_all(&next, "").into_owned();
            }
            if next == current {
                return next;
            }
            current = next;
        }
    }

    /// Sanitizes every object key and string value in `value`, recursively.
    pub fn sanitize_json(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.sanitize(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_json(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (self.sanitize(k), self.sanitize_json(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Sanitizes a JSON value with the shared sanitizer.
pub fn sanitize_json(value: &Value) -> Value {
    InputSanitizer::shared().sanitize_json(value)
}

/// Returns true if `id` is a UUID in the 36-character hyphenated form.
pub fn is_valid_uuid(id: &str) -> bool {
    id.len() == 36 && Uuid::try_parse(id).is_ok()
}
