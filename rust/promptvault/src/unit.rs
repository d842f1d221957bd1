//! Provider unit images.
//!
//! A unit image is the versioned container a provider unit is shipped in
//! when the sealed artifact carries more than the raw secret:
//!
//! ```text
//! "PVUNIT" | version u8 | entry_count u16 BE | entry*
//! entry = name_len u8 | name | kind u8 | payload_len u32 BE | payload
//! ```
//!
//! The only symbol the loader resolves is [`ACCESSOR_SYMBOL`], which must be
//! of kind [`SymbolKind::Accessor`].

use crate::error::{Error, Result};
use std::fmt;
use zeroize::Zeroizing;

pub const UNIT_MAGIC: &[u8; 6] = b"PVUNIT";
pub const UNIT_VERSION: u8 = 1;
pub const ACCESSOR_SYMBOL: &str = "get_data";

/// Shape of an exported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Zero-argument accessor returning bytes.
    Accessor,
    /// A plain constant; not callable.
    Constant,
}

impl SymbolKind {
    fn to_byte(self) -> u8 {
        match self {
            SymbolKind::Accessor => 1,
            SymbolKind::Constant => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(SymbolKind::Accessor),
            2 => Some(SymbolKind::Constant),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Accessor => f.write_str("fn() -> bytes"),
            SymbolKind::Constant => f.write_str("constant"),
        }
    }
}

struct UnitEntry {
    name: String,
    kind: SymbolKind,
    payload: Zeroizing<Vec<u8>>,
}

/// A decoded (or to-be-encoded) provider unit.
#[derive(Default)]
pub struct UnitImage {
    entries: Vec<UnitEntry>,
}

impl fmt::Debug for UnitImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.name, e.kind)))
            .finish()
    }
}

impl UnitImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit exporting only the accessor for `secret`.
    pub fn with_accessor(secret: &[u8]) -> Self {
        let mut image = Self::new();
        image.export(ACCESSOR_SYMBOL, SymbolKind::Accessor, secret);
        image
    }

    /// Adds an exported symbol. Names longer than 255 bytes are truncated.
    pub fn export(&mut self, name: &str, kind: SymbolKind, payload: &[u8]) -> &mut Self {
        let mut name = name.to_owned();
        while name.len() > usize::from(u8::MAX) {
            name.pop();
        }
        self.entries.push(UnitEntry {
            name,
            kind,
            payload: Zeroizing::new(payload.to_vec()),
        });
        self
    }

    pub fn encode(&self) -> Result<Zeroizing<Vec<u8>>> {
        let count = u16::try_from(self.entries.len())
            .map_err(|_| Error::Activation("too many symbols for one unit".into()))?;

        let size = self.entries.iter().fold(UNIT_MAGIC.len() + 3, |acc, e| {
            acc + 1 + e.name.len() + 1 + 4 + e.payload.len()
        });
        let mut out = Zeroizing::new(Vec::with_capacity(size));

        out.extend_from_slice(UNIT_MAGIC);
        out.push(UNIT_VERSION);
        out.extend_from_slice(&count.to_be_bytes());
        for entry in &self.entries {
            let payload_len = u32::try_from(entry.payload.len()).map_err(|_| {
                Error::Activation(format!("symbol `{}` is larger than 4 GiB", entry.name))
            })?;
            // bounded to 255 by `export`
            out.push(entry.name.len() as u8);
            out.extend_from_slice(entry.name.as_bytes());
            out.push(entry.kind.to_byte());
            out.extend_from_slice(&payload_len.to_be_bytes());
            out.extend_from_slice(&entry.payload);
        }
        Ok(out)
    }

    /// Parses an image. Anything structurally wrong is `Activation`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };

        if cursor.take(UNIT_MAGIC.len())? != UNIT_MAGIC {
            return Err(Error::Activation(
                "not a provider unit (bad magic); was the artifact sealed with --format unit?"
                    .into(),
            ));
        }
        let version = cursor.byte()?;
        if version != UNIT_VERSION {
            return Err(Error::Activation(format!(
                "unit format version {version} is not supported (expected {UNIT_VERSION}); \
                 reseal the artifact with this build"
            )));
        }

        let count = u16::from_be_bytes([cursor.byte()?, cursor.byte()?]);
        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name_len = usize::from(cursor.byte()?);
            let name = std::str::from_utf8(cursor.take(name_len)?)
                .map_err(|_| Error::Activation("symbol name is not UTF-8".into()))?
                .to_owned();
            let kind_byte = cursor.byte()?;
            let kind = SymbolKind::from_byte(kind_byte).ok_or_else(|| {
                Error::Activation(format!("symbol `{name}` has unknown kind {kind_byte}"))
            })?;
            let len_bytes = cursor.take(4)?;
            let payload_len =
                u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
            let payload = Zeroizing::new(cursor.take(payload_len as usize)?.to_vec());
            entries.push(UnitEntry {
                name,
                kind,
                payload,
            });
        }

        if cursor.pos != bytes.len() {
            return Err(Error::Activation(format!(
                "{} trailing bytes after the last symbol",
                bytes.len() - cursor.pos
            )));
        }
        Ok(Self { entries })
    }

    /// Names of all exported symbols, in order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Resolves `symbol` as a byte accessor and moves its payload out.
    pub fn resolve_accessor(mut self, symbol: &str) -> Result<Zeroizing<Vec<u8>>> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == symbol)
            .ok_or_else(|| Error::SymbolMissing(symbol.to_owned()))?;

        let entry = self.entries.swap_remove(index);
        if entry.kind != SymbolKind::Accessor {
            return Err(Error::SymbolTypeMismatch {
                symbol: symbol.to_owned(),
                expected: SymbolKind::Accessor.to_string(),
                found: entry.kind.to_string(),
            });
        }
        Ok(entry.payload)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::Activation("unit image is truncated".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}
