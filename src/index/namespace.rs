use std::fmt;
use std::path::Path;

use crate::{AskPdfError, Result};

/// Name of a persisted index, derived from the uploaded document's file name.
///
/// Characters that cannot appear in a directory name, `%` itself and a
/// leading `.` are percent-encoded, so distinct names never share a
/// directory and the result is always a single, non-hidden directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

const RESERVED: &[char] = &['%', '/', '\\', ':', '*', '?', '"', '<', '>', '|'];

impl Namespace {
    /// Build a namespace from a raw document name
    #[inline]
    pub fn new(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(AskPdfError::DocumentParse(format!(
                "'{}' does not name a document",
                raw
            )));
        }

        let mut encoded = String::with_capacity(raw.len());
        for (position, c) in raw.chars().enumerate() {
            if RESERVED.contains(&c) || c.is_control() || (position == 0 && c == '.') {
                let mut buf = [0; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    encoded.push_str(&format!("%{:02X}", byte));
                }
            } else {
                encoded.push(c);
            }
        }

        Ok(Self(encoded))
    }

    /// Accept a namespace as `list` shows it, that is already encoded
    #[inline]
    pub fn parse(encoded: &str) -> Result<Self> {
        decode(encoded)
            .and_then(|raw| Self::new(&raw).ok())
            .filter(|namespace| namespace.0 == encoded)
            .ok_or_else(|| {
                AskPdfError::DocumentParse(format!("'{}' is not a namespace name", encoded))
            })
    }

    /// The namespace of an uploaded document: its file name without extension
    #[inline]
    pub fn from_document_name(name: &str) -> Result<Self> {
        let stem = Path::new(name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(&stem)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok()
}
