//! Decoding of multi-part coverage responses into named binary parts.
//!
//! The coverage service answers `image/x-aaigrid` requests with a body of the
//! form
//!
//! ```text
//! --wcs
//! Content-Type: text/plain
//! Content-Disposition: INLINE; filename="result.asc"
//!
//! <bytes>
//! --wcs
//! ...
//! --wcs--
//! ```
//!
//! Part payloads are copied byte for byte from the body. Nothing is decoded
//! as text except the header block.

use crate::{FetchError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Boundary token used by the coverage service.
pub const WCS_BOUNDARY: &[u8] = b"--wcs";

/// Parts of an `image/x-aaigrid` response, in order.
pub const AAIGRID_PARTS: [&str; 3] = ["result.asc", "result.asc.aux.xml", "result.prj"];

/// One named segment of a multi-part body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// File name taken from the part header, or `part<index>.bin`.
    pub filename: String,
    /// Payload, verbatim.
    pub data: Vec<u8>,
}

/// Splits multi-part bodies on a fixed boundary token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartDecoder {
    boundary: Vec<u8>,
}

impl Default for MultipartDecoder {
    fn default() -> Self {
        Self::new(WCS_BOUNDARY)
    }
}

impl MultipartDecoder {
    /// Decoder for bodies delimited by `boundary` (including any leading `--`).
    pub fn new(boundary: impl Into<Vec<u8>>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    /// Decode `body` into its parts, in body order.
    ///
    /// With `expected`, the part names must match it position by position.
    pub fn decode(&self, body: &[u8], expected: Option<&[&str]>) -> Result<Vec<Part>> {
        let mut parts = Vec::new();

        for segment in split_on(body, &self.boundary) {
            let trimmed = segment.trim_ascii();
            if trimmed.is_empty() || trimmed == b"--" {
                continue;
            }

            let header_end = find_blank_line(segment);
            let filename = header_end
                .map(|(start, _)| &segment[..start])
                .and_then(filename_from_header)
                .unwrap_or_else(|| format!("part{}.bin", parts.len()));

            let Some((_, data_start)) = header_end else {
                warn!(filename = %filename, "Part has no data section, skipping");
                continue;
            };

            parts.push(Part {
                filename,
                data: strip_trailing_break(&segment[data_start..]).to_vec(),
            });
        }

        if let Some(expected) = expected {
            check_expected(&parts, expected)?;
        }
        Ok(parts)
    }
}

/// Write each part to `dir/<filename>`, returning the paths in part order.
pub fn extract_to_dir(parts: &[Part], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(parts.len());
    for part in parts {
        let path = dir.join(&part.filename);
        fs::write(&path, &part.data)?;
        info!(path = %path.display(), bytes = part.data.len(), "Saved part");
        paths.push(path);
    }
    Ok(paths)
}

fn check_expected(parts: &[Part], expected: &[&str]) -> Result<()> {
    if parts.len() != expected.len() {
        return Err(FetchError::PartCountMismatch {
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual: parts.iter().map(|p| p.filename.clone()).collect(),
        });
    }
    for (position, (part, want)) in parts.iter().zip(expected).enumerate() {
        if part.filename != *want {
            return Err(FetchError::PartNameMismatch {
                position,
                expected: want.to_string(),
                actual: part.filename.clone(),
            });
        }
    }
    Ok(())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_on<'a>(body: &'a [u8], boundary: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut rest = body;
    while let Some(pos) = find_subslice(rest, boundary) {
        segments.push(&rest[..pos]);
        rest = &rest[pos + boundary.len()..];
    }
    segments.push(rest);
    segments
}

/// Earliest blank line in `segment` as `(header_end, data_start)`.
fn find_blank_line(segment: &[u8]) -> Option<(usize, usize)> {
    let lf = find_subslice(segment, b"\n\n").map(|p| (p, p + 2));
    let crlf = find_subslice(segment, b"\r\n\r\n").map(|p| (p, p + 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn strip_trailing_break(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .unwrap_or(data)
}

/// `filename="..."` (quotes optional, case-insensitive), last path component.
fn filename_from_header(header: &[u8]) -> Option<String> {
    const KEY: &[u8] = b"filename=";
    let lower = header.to_ascii_lowercase();
    let start = find_subslice(&lower, KEY)? + KEY.len();

    let value = &header[start..];
    let value = value.strip_prefix(b"\"").unwrap_or(value);
    let end = value
        .iter()
        .position(|&b| matches!(b, b'"' | b'\r' | b'\n'))
        .unwrap_or(value.len());

    let name = String::from_utf8_lossy(&value[..end]);
    let name = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
