//! Title prefixes and the hidden uid marker.
//!
//! A destination event is ours when its title starts with one of our prefixes
//! *and* its body ends with a `[HA_UID:...]` marker we can decode. The prefix
//! is what users see; the marker is what makes sync idempotent. An event with
//! a prefix but a damaged marker is treated as foreign and never touched.

use std::collections::BTreeMap;

const MARKER_OPEN: &str = "[HA_UID:";
const MARKER_CLOSE: char = ']';
const SEPARATOR: &str = "\n\n";

/// Destination title for a source summary.
pub fn title_for(prefix: &str, summary: &str) -> String {
    format!("{prefix} {summary}")
}

/// Encode `uid` as a marker token.
pub fn embed_uid(uid: &str) -> String {
    format!("{MARKER_OPEN}{}{MARKER_CLOSE}", escape(uid))
}

/// Recover the uid from the last marker in `text`.
pub fn extract_uid(text: &str) -> Option<String> {
    locate(text).map(|found| found.uid)
}

/// Body written to the destination: description, blank line, marker.
pub fn compose_body(description: &str, uid: &str) -> String {
    if description.is_empty() {
        embed_uid(uid)
    } else {
        format!("{description}{SEPARATOR}{}", embed_uid(uid))
    }
}

/// Split a destination body into `(description, uid)`.
pub fn decompose_body(body: &str) -> Option<(String, String)> {
    let found = locate(body)?;
    let before = &body[..found.start];
    let before = before.strip_suffix(SEPARATOR).unwrap_or(before);
    let after = &body[found.end..];
    Some((format!("{before}{}", after.trim_end()), found.uid))
}

struct Located {
    start: usize,
    end: usize,
    uid: String,
}

fn locate(text: &str) -> Option<Located> {
    let start = text.rfind(MARKER_OPEN)?;
    let token_start = start + MARKER_OPEN.len();
    let token_len = text[token_start..].find(MARKER_CLOSE)?;
    let token = &text[token_start..token_start + token_len];
    let uid = unescape(token)?;
    if uid.is_empty() {
        return None;
    }
    Some(Located {
        start,
        end: token_start + token_len + MARKER_CLOSE.len_utf8(),
        uid,
    })
}

fn needs_escape(c: char) -> bool {
    c == '%' || c == '[' || c == ']' || c.is_control()
}

fn escape(uid: &str) -> String {
    let mut out = String::with_capacity(uid.len());
    for c in uid.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = token.get(i + 1..i + 3)?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// `calendar.family` -> `[Family]`
pub fn derived_prefix(entity_id: &str) -> String {
    let name = entity_id.rsplit('.').next().unwrap_or(entity_id);
    let mut chars = name.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    };
    format!("[{capitalized}]")
}

/// Which prefix applies to which source calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    default: String,
    per_calendar: BTreeMap<String, String>,
}

/// A destination event recognized as managed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognized {
    pub uid: String,
    pub description: String,
}

impl Prefixes {
    pub fn new(default: impl Into<String>) -> Self {
        Prefixes {
            default: default.into(),
            per_calendar: BTreeMap::new(),
        }
    }

    pub fn with_calendar(mut self, calendar: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.per_calendar.insert(calendar.into(), prefix.into());
        self
    }

    pub fn for_calendar(&self, calendar: &str) -> &str {
        self.per_calendar
            .get(calendar)
            .map(String::as_str)
            .unwrap_or(&self.default)
    }

    /// Every prefix a managed title may start with.
    pub fn all(&self) -> Vec<&str> {
        let mut all: Vec<&str> = std::iter::once(self.default.as_str())
            .chain(self.per_calendar.values().map(String::as_str))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    pub fn is_managed_title(&self, title: &str) -> bool {
        self.all().iter().any(|prefix| title.starts_with(prefix))
    }

    /// Classify a destination event by its title and body.
    pub fn recognize(&self, title: &str, body: &str) -> Option<Recognized> {
        if !self.is_managed_title(title) {
            return None;
        }
        let (description, uid) = decompose_body(body)?;
        Some(Recognized { uid, description })
    }
}
