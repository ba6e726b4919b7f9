//! Two-integer signature form
//!
//! Envelopes carry a signature as two base-16 integers, R and S, one per line.
//! For Ed25519 these are the two 32-byte halves of the signature, read as
//! big-endian numbers. Leading zeros are dropped on output and restored on
//! input, so the text form is exactly what an arbitrary-precision integer
//! printer would produce.

use crate::error::{ConverseError, ConverseResult};

/// Radix used for signature integers in envelope text.
pub const SIGNATURE_BASE: u32 = 16;

const COMPONENT_LEN: usize = 32;

/// A signature as its two integer components.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature {
    r: [u8; COMPONENT_LEN],
    s: [u8; COMPONENT_LEN],
}

impl Signature {
    pub fn from_components(r: [u8; COMPONENT_LEN], s: [u8; COMPONENT_LEN]) -> Self {
        Self { r, s }
    }

    /// Split a 64-byte signature into R and S.
    pub fn from_bytes(bytes: &[u8; 2 * COMPONENT_LEN]) -> Self {
        let mut r = [0u8; COMPONENT_LEN];
        let mut s = [0u8; COMPONENT_LEN];
        r.copy_from_slice(&bytes[..COMPONENT_LEN]);
        s.copy_from_slice(&bytes[COMPONENT_LEN..]);
        Self { r, s }
    }

    pub fn to_bytes(&self) -> [u8; 2 * COMPONENT_LEN] {
        let mut out = [0u8; 2 * COMPONENT_LEN];
        out[..COMPONENT_LEN].copy_from_slice(&self.r);
        out[COMPONENT_LEN..].copy_from_slice(&self.s);
        out
    }

    /// R as a base-16 integer.
    pub fn r_text(&self) -> String {
        integer_text(&self.r)
    }

    /// S as a base-16 integer.
    pub fn s_text(&self) -> String {
        integer_text(&self.s)
    }

    /// Parse the two integer lines of an envelope footer.
    pub fn from_text_parts(r: &str, s: &str) -> ConverseResult<Self> {
        Ok(Self {
            r: parse_integer(r)?,
            s: parse_integer(s)?,
        })
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("r", &self.r_text())
            .field("s", &self.s_text())
            .finish()
    }
}

fn integer_text(bytes: &[u8; COMPONENT_LEN]) -> String {
    let digits = hex::encode(bytes);
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_integer(text: &str) -> ConverseResult<[u8; COMPONENT_LEN]> {
    let invalid = || {
        ConverseError::MalformedEnvelope(format!("invalid signature integer '{}'", text))
    };

    let digits = text.strip_prefix('+').unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(SIGNATURE_BASE)) {
        return Err(invalid());
    }
    let digits = digits.trim_start_matches('0');
    if digits.len() > 2 * COMPONENT_LEN {
        return Err(invalid());
    }

    let padded = format!("{:0>width$}", digits, width = 2 * COMPONENT_LEN);
    let mut out = [0u8; COMPONENT_LEN];
    hex::decode_to_slice(padded, &mut out).map_err(|_| invalid())?;
    Ok(out)
}
