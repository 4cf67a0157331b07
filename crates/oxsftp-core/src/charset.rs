//! Filename encoding conversion between the wire (UTF-8) and the host's
//! locale encoding.
//!
//! The local encoding is resolved once from the locale environment; each
//! worker owns a [`PathCodec`] so conversions never share state across
//! workers.

use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

/// A filename failed conversion; handlers report it as a status error.
#[derive(Debug, Error)]
#[error("filename not representable in {encoding}")]
pub struct CharsetError {
    pub encoding: &'static str,
}

/// Resolve the host's locale encoding from `LC_ALL`/`LC_CTYPE`/`LANG`
/// (first match wins), defaulting to UTF-8. Resolved once per process.
pub fn local_encoding() -> &'static Encoding {
    static LOCAL: OnceLock<&'static Encoding> = OnceLock::new();
    LOCAL.get_or_init(|| {
        for var in ["LC_ALL", "LC_CTYPE", "LANG"] {
            if let Ok(value) = std::env::var(var) {
                if value.is_empty() {
                    continue;
                }
                return encoding_from_locale(&value);
            }
        }
        UTF_8
    })
}

/// `en_US.ISO-8859-1` → ISO-8859-1; a locale without a codeset, or with one
/// we cannot resolve, means UTF-8.
fn encoding_from_locale(locale: &str) -> &'static Encoding {
    let codeset = match locale.split_once('.') {
        Some((_, rest)) => rest.split('@').next().unwrap_or(rest),
        None => return UTF_8,
    };
    Encoding::for_label(codeset.as_bytes()).unwrap_or(UTF_8)
}

/// Worker-owned converter pair: wire UTF-8 → local bytes and back.
#[derive(Debug)]
pub struct PathCodec {
    local: &'static Encoding,
}

impl Default for PathCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PathCodec {
    pub fn new() -> Self {
        Self {
            local: local_encoding(),
        }
    }

    #[cfg(test)]
    fn with_encoding(local: &'static Encoding) -> Self {
        Self { local }
    }

    /// Wire bytes (UTF-8) to local filesystem bytes.
    pub fn to_local(&self, wire: &[u8]) -> Result<Vec<u8>, CharsetError> {
        let text = std::str::from_utf8(wire).map_err(|_| CharsetError { encoding: "UTF-8" })?;
        if self.local == UTF_8 {
            return Ok(wire.to_vec());
        }
        let (converted, _, unmappable) = self.local.encode(text);
        if unmappable {
            return Err(CharsetError {
                encoding: self.local.name(),
            });
        }
        Ok(converted.into_owned())
    }

    /// Local filesystem bytes to a wire (UTF-8) string.
    pub fn to_wire(&self, local: &[u8]) -> Result<String, CharsetError> {
        if self.local == UTF_8 {
            return std::str::from_utf8(local)
                .map(str::to_owned)
                .map_err(|_| CharsetError { encoding: "UTF-8" });
        }
        let (converted, _, malformed) = self.local.decode(local);
        if malformed {
            return Err(CharsetError {
                encoding: self.local.name(),
            });
        }
        Ok(converted.into_owned())
    }
}
