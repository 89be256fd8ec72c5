//! `encode <TARGET>`: rewrite a text file in another character encoding.
//!
//! The source encoding is detected: a BOM wins, then valid UTF-8, then a
//! statistical guess. UTF-16 output is produced here since `encoding_rs` only
//! decodes UTF-16.

use anyhow::{Context, Result};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, EUC_JP, ISO_2022_JP, SHIFT_JIS, UTF_8};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Accepted spellings of `encode` targets.
pub const SUPPORTED_ENCODINGS: &[&str] = &[
    "EUC-JP",
    "ISO-2022-JP",
    "Shift_JIS",
    "UTF-8",
    "UTF-16",
    "UTF-16BE",
    "UTF-16LE",
    "UNICODE",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEncoding {
    Utf8,
    ShiftJis,
    EucJp,
    Iso2022Jp,
    /// Little endian with a BOM.
    Utf16,
    Utf16Be,
    Utf16Le,
}

impl TargetEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::ShiftJis => "Shift_JIS",
            Self::EucJp => "EUC-JP",
            Self::Iso2022Jp => "ISO-2022-JP",
            Self::Utf16 => "UTF-16",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
        }
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        let encoding: &'static Encoding = match self {
            Self::Utf16 => {
                let mut out = vec![0xFF, 0xFE];
                out.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
                return out;
            }
            Self::Utf16Le => return text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => return text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf8 => UTF_8,
            Self::ShiftJis => SHIFT_JIS,
            Self::EucJp => EUC_JP,
            Self::Iso2022Jp => ISO_2022_JP,
        };

        let (bytes, _, unmappable) = encoding.encode(text);
        if unmappable {
            warn!(
                "Some characters cannot be represented in {} and were replaced",
                self.label()
            );
        }
        bytes.into_owned()
    }
}

impl fmt::Display for TargetEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TargetEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "UTF8" => Ok(Self::Utf8),
            "SHIFTJIS" | "SJIS" => Ok(Self::ShiftJis),
            "EUCJP" => Ok(Self::EucJp),
            "ISO2022JP" | "JIS" => Ok(Self::Iso2022Jp),
            "UTF16" | "UNICODE" => Ok(Self::Utf16),
            "UTF16BE" => Ok(Self::Utf16Be),
            "UTF16LE" => Ok(Self::Utf16Le),
            _ => Err(format!(
                "unsupported encoding '{}', expected one of {}",
                s,
                SUPPORTED_ENCODINGS.join(", ")
            )),
        }
    }
}

// ============================================================================
// Conversion
// ============================================================================

/// Rewrites `path` in place in the target encoding.
pub fn convert_file(path: &Path, target: TargetEncoding) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read: {}", path.display()))?;

    let (text, source) = decode_auto(&bytes);
    debug!("Detected {} for {}", source.name(), path.display());

    std::fs::write(path, target.encode(&text))
        .with_context(|| format!("Failed to write: {}", path.display()))?;

    info!(
        "Converted encoding of {} from {} to {}",
        path.display(),
        source.name(),
        target
    );
    Ok(())
}

fn decode_auto(bytes: &[u8]) -> (String, &'static Encoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), encoding);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), UTF_8);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    (text.into_owned(), encoding)
}
