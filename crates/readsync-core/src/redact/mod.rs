//! Redaction engine.
//!
//! Scans strings and JSON values for credentials and personal data and
//! replaces them with typed placeholders. Two rules apply:
//!
//! - **Key name**: a field whose key contains a sensitive keyword has its whole
//!   value replaced, whatever its shape.
//! - **Content**: other strings have Bearer tokens, JWTs, API-key shaped
//!   tokens, emails, URL userinfo and IPv4 addresses replaced in place.
//!
//! Redaction is idempotent: markers never match a detection pattern.

mod patterns;

pub use patterns::{
    classify, is_marker, RedactionKind, BEARER_MARKER, EMAIL_MARKER, GENERIC_MARKER, IP_MARKER,
    JWT_MARKER, MAX_DEPTH_MARKER, TOKEN_MARKER, UNREADABLE_MARKER, URL_AUTH_MARKER,
};

use patterns::{
    is_plain_identifier, BEARER_RE, EMAIL_RE, IPV4_RE, JWT_RE, MAC_HOME_RE, TOKEN_RE, UNIX_HOME_RE,
    URL_AUTH_RE, WINDOWS_HOME_RE,
};
use serde_json::Value;
use url::Url;

/// Nesting beyond this is replaced by [`MAX_DEPTH_MARKER`].
pub const DEFAULT_MAX_DEPTH: usize = 10;

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "authorization",
    "secret",
    "key",
    "credential",
    "bearer",
    "session",
    "cookie",
    "auth",
];

const SENSITIVE_PARAMS: &[&str] = &["token", "key", "secret", "password", "auth", "session"];

/// Keyword and pattern based redactor
#[derive(Debug, Clone)]
pub struct Redactor {
    sensitive_keys: Vec<String>,
    sensitive_params: Vec<String>,
    max_depth: usize,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self {
            sensitive_keys: SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
            sensitive_params: SENSITIVE_PARAMS.iter().map(|k| k.to_string()).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Add extra key-name keywords (matched case-insensitively as substrings).
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_keys
            .extend(keys.into_iter().map(|k| k.into().to_lowercase()));
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether a field name alone marks its value as secret.
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_keys.iter().any(|k| key.contains(k.as_str()))
    }

    fn is_sensitive_param(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.sensitive_params.iter().any(|p| name.contains(p.as_str()))
    }

    /// Replace sensitive substrings of free text.
    pub fn redact_text(&self, text: &str) -> String {
        let text = BEARER_RE.replace_all(text, BEARER_MARKER);
        let text = JWT_RE.replace_all(&text, JWT_MARKER);
        let text = URL_AUTH_RE.replace_all(&text, format!("${{scheme}}{URL_AUTH_MARKER}@").as_str());
        let text = EMAIL_RE.replace_all(&text, EMAIL_MARKER);
        let text = TOKEN_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
            let candidate = &caps[0];
            if is_plain_identifier(candidate) {
                candidate.to_string()
            } else {
                TOKEN_MARKER.to_string()
            }
        });
        IPV4_RE.replace_all(&text, IP_MARKER).into_owned()
    }

    /// Text redaction plus home-directory scrubbing, for exception traces.
    pub fn redact_stack_trace(&self, trace: &str) -> String {
        let trace = UNIX_HOME_RE.replace_all(trace, "/home/[REDACTED]");
        let trace = MAC_HOME_RE.replace_all(&trace, "/Users/[REDACTED]");
        let trace = WINDOWS_HOME_RE.replace_all(&trace, "${prefix}[REDACTED]");
        self.redact_text(&trace)
    }

    /// Structurally identical copy of `value` with secrets replaced.
    pub fn redact_value(&self, value: &Value) -> Value {
        self.redact_node(value, None, 0)
    }

    fn redact_node(&self, value: &Value, key: Option<&str>, depth: usize) -> Value {
        if depth > self.max_depth {
            return Value::String(MAX_DEPTH_MARKER.to_string());
        }

        match value {
            Value::String(s) => Value::String(self.redact_text(s)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_key = format!("{}[{}]", key.unwrap_or(""), i);
                        if self.is_sensitive_key(&item_key) {
                            mask(item)
                        } else {
                            self.redact_node(item, Some(&item_key), depth + 1)
                        }
                    })
                    .collect(),
            ),
            Value::Object(map) => {
                let mut result = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    let redacted = if self.is_sensitive_key(k) {
                        mask(v)
                    } else {
                        self.redact_node(v, Some(k), depth + 1)
                    };
                    result.insert(k.clone(), redacted);
                }
                Value::Object(result)
            }
            other => other.clone(),
        }
    }

    /// Strip URL userinfo and replace the values of sensitive query
    /// parameters, keeping every other parameter verbatim and in order.
    ///
    /// Unparseable input falls back to text redaction.
    pub fn sanitize_url(&self, raw: &str) -> String {
        match self.sanitize_parsed_url(raw) {
            Some(url) => url.to_string(),
            None => self.redact_text(raw),
        }
    }

    /// Scheme, host, port and path of a server URL, sensitive query values
    /// replaced, fragment dropped.
    pub fn sanitize_server_url(&self, raw: &str) -> String {
        match self.sanitize_parsed_url(raw) {
            Some(mut url) => {
                url.set_fragment(None);
                url.to_string()
            }
            None => self.redact_text(raw),
        }
    }

    fn sanitize_parsed_url(&self, raw: &str) -> Option<Url> {
        let mut url = Url::parse(raw).ok()?;
        // Both fail only for cannot-be-a-base URLs, which carry no userinfo.
        let _ = url.set_username("");
        let _ = url.set_password(None);

        if let Some(query) = url.query().map(str::to_owned) {
            let encoded_marker: String =
                url::form_urlencoded::byte_serialize(GENERIC_MARKER.as_bytes()).collect();
            let rebuilt = query
                .split('&')
                .map(|pair| {
                    let (raw_name, value) = match pair.split_once('=') {
                        Some((name, value)) => (name, Some(value)),
                        None => (pair, None),
                    };
                    let name = url::form_urlencoded::parse(raw_name.as_bytes())
                        .next()
                        .map(|(name, _)| name.into_owned())
                        .unwrap_or_else(|| raw_name.to_string());
                    match value {
                        Some(_) if self.is_sensitive_param(&name) => {
                            format!("{}={}", raw_name, encoded_marker)
                        }
                        _ => pair.to_string(),
                    }
                })
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&rebuilt));
        }

        Some(url)
    }
}

/// Replacement for a value under a sensitive key: kind-specific when the
/// content is recognisable, generic otherwise.
fn mask(value: &Value) -> Value {
    match value {
        Value::String(s) if is_marker(s) => Value::String(s.clone()),
        Value::String(s) => Value::String(
            classify(s)
                .map(|kind| kind.marker())
                .unwrap_or(GENERIC_MARKER)
                .to_string(),
        ),
        _ => Value::String(GENERIC_MARKER.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
