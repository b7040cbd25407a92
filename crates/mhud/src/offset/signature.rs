use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One position of a signature template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigByte {
    /// Must match exactly
    Literal(u8),
    /// Matches any byte
    Wildcard,
    /// Matches any byte and is copied to the scan output
    Capture,
}

/// Byte template used to locate landmarks in a module image.
///
/// Text form is a whitespace separated token list: `8B` literal, `??` (or `?`)
/// wildcard, `vv` (or `v`) capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySignature {
    bytes: Vec<SigByte>,
}

impl MemorySignature {
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        for token in pattern.split_whitespace() {
            match token {
                "??" | "?" => bytes.push(SigByte::Wildcard),
                "vv" | "v" | "VV" | "V" => bytes.push(SigByte::Capture),
                _ => {
                    let value = u8::from_str_radix(token, 16).map_err(|e| {
                        Error::InvalidSignature(format!(
                            "Invalid signature token '{}': {}",
                            token, e
                        ))
                    })?;
                    bytes.push(SigByte::Literal(value));
                }
            }
        }

        if bytes.is_empty() {
            return Err(Error::InvalidSignature(
                "Signature pattern is empty".to_string(),
            ));
        }

        Ok(Self { bytes })
    }

    /// Build from a byte string and a mask of the same length
    /// (`x` literal, `?` wildcard, `v` capture).
    pub fn from_mask(bytes: &[u8], mask: &str) -> Result<Self> {
        if bytes.len() != mask.len() {
            return Err(Error::InvalidSignature(format!(
                "Mask length {} does not match byte length {}",
                mask.len(),
                bytes.len()
            )));
        }

        let bytes = bytes
            .iter()
            .zip(mask.chars())
            .map(|(&b, m)| match m {
                'x' => Ok(SigByte::Literal(b)),
                '?' => Ok(SigByte::Wildcard),
                'v' => Ok(SigByte::Capture),
                other => Err(Error::InvalidSignature(format!(
                    "Invalid mask character '{}'",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        if bytes.is_empty() {
            return Err(Error::InvalidSignature(
                "Signature pattern is empty".to_string(),
            ));
        }

        Ok(Self { bytes })
    }

    pub fn positions(&self) -> &[SigByte] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capture_count(&self) -> usize {
        self.bytes
            .iter()
            .filter(|b| matches!(b, SigByte::Capture))
            .count()
    }

    /// Copy of this signature with `value` embedded as four little-endian
    /// literal bytes starting at `position`.
    pub fn with_literal_u32(&self, position: usize, value: u32) -> Result<Self> {
        if position + 4 > self.bytes.len() {
            return Err(Error::InvalidSignature(format!(
                "Cannot embed u32 at position {} in a {}-byte signature",
                position,
                self.bytes.len()
            )));
        }

        let mut bytes = self.bytes.clone();
        for (slot, b) in bytes[position..position + 4]
            .iter_mut()
            .zip(value.to_le_bytes())
        {
            *slot = SigByte::Literal(b);
        }
        Ok(Self { bytes })
    }
}

impl FromStr for MemorySignature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MemorySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens = self
            .bytes
            .iter()
            .map(|b| match b {
                SigByte::Literal(value) => format!("{:02X}", value),
                SigByte::Wildcard => "??".to_string(),
                SigByte::Capture => "vv".to_string(),
            })
            .collect::<Vec<_>>();
        write!(f, "{}", tokens.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub name: String,
    pub pattern: String,
    /// Position where a previously resolved address is embedded before scanning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_at: Option<usize>,
}

impl SignatureEntry {
    pub fn signature(&self) -> Result<MemorySignature> {
        MemorySignature::parse(&self.pattern)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    pub version: String,
    pub entries: Vec<SignatureEntry>,
}

impl SignatureSet {
    pub fn entry(&self, name: &str) -> Option<&SignatureEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

/// Name of the signature locating the static PlayerManager pointer slot
pub const PLAYER_MANAGER: &str = "playerManager";
/// Name of the signature locating the player list offset
pub const PLAYER_LIST: &str = "playerList";

/// Signatures for the supported game build.
pub fn builtin_signatures() -> SignatureSet {
    SignatureSet {
        version: "rebirth-1.05".to_string(),
        entries: vec![
            // mov eax, [slot]; mov ecx, [eax+disp32]; test ecx, ecx; jz
            SignatureEntry {
                name: PLAYER_MANAGER.to_string(),
                pattern: "A1 vv vv vv vv 8B 88 ?? ?? ?? ?? 85 C9 74 ?? 8B 01".to_string(),
                embed_at: None,
            },
            // mov esi, [slot]; mov eax, [esi+list]; sub eax, [esi+list+4]; sar eax, 2
            SignatureEntry {
                name: PLAYER_LIST.to_string(),
                pattern: "8B 35 ?? ?? ?? ?? 8B 86 vv vv 00 00 2B 86 ?? ?? 00 00 C1 F8 02"
                    .to_string(),
                embed_at: Some(2),
            },
        ],
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &SignatureSet) -> Result<()> {
    let content = serde_json::to_string_pretty(signatures)?;
    fs::write(path, content)?;
    Ok(())
}
