use rand::Rng;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Separator between the byte and bit halves of an offset string.
const OFFSET_SEPARATOR: char = '@';
/// Highest valid bit index within a byte, counted from the least-significant bit.
pub const MAX_BIT_OFFSET: u8 = 7;

/// Failure to read one numeric half of an offset string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumberError {
    /// A leading `+` was present. Offsets are plain unsigned decimals.
    #[error("explicit sign is not allowed")]
    Signed,
    #[error(transparent)]
    Parse(#[from] ParseIntError),
}

/// Errors produced while parsing a `<byte>@<bit>` offset string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OffsetError {
    #[error("invalid offset string, no '@' symbols found")]
    NoSeparator,

    #[error("invalid offset string, too many '@' symbols found")]
    TooManySeparators,

    /// The part before `@` is not an unsigned 64-bit decimal.
    #[error("invalid byte offset {input:?}: {source}")]
    InvalidByteOffset {
        input: String,
        #[source]
        source: NumberError,
    },

    /// The part after `@` is not an unsigned 8-bit decimal.
    #[error("invalid bit offset {input:?}: {source}")]
    InvalidBitOffset {
        input: String,
        #[source]
        source: NumberError,
    },

    #[error("bit offset must be between 0 and 7, was {0}")]
    BitOutOfRange(u8),
}

/// A single bit location inside a file: a byte index and a bit index within that byte.
///
/// Bit 0 is the least-significant bit (value `1`), bit 7 the most-significant (value `128`).
/// The bit index is always in `0..=7`; the byte index is not checked against any file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffsetSpec {
    byte_offset: u64,
    bit_offset: u8,
}

impl OffsetSpec {
    /// Builds an offset, rejecting bit indices above [`MAX_BIT_OFFSET`].
    pub fn new(byte_offset: u64, bit_offset: u8) -> Result<Self, OffsetError> {
        if bit_offset > MAX_BIT_OFFSET {
            return Err(OffsetError::BitOutOfRange(bit_offset));
        }
        Ok(Self {
            byte_offset,
            bit_offset,
        })
    }

    /// Draws a uniformly random location in a file of `file_size` bytes.
    ///
    /// The byte and the bit are drawn independently. Returns `None` for an empty file,
    /// which has no bit to pick.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, file_size: u64) -> Option<Self> {
        if file_size == 0 {
            return None;
        }
        Some(Self {
            byte_offset: rng.random_range(0..file_size),
            bit_offset: rng.random_range(0..=MAX_BIT_OFFSET),
        })
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub fn bit_offset(&self) -> u8 {
        self.bit_offset
    }
}

impl fmt::Display for OffsetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.byte_offset, OFFSET_SEPARATOR, self.bit_offset)
    }
}

/// Parses an unsigned decimal. `str::parse` accepts a leading `+`, which the offset
/// notation does not.
fn parse_unsigned<T>(input: &str) -> Result<T, NumberError>
where
    T: FromStr<Err = ParseIntError>,
{
    if input.starts_with('+') {
        return Err(NumberError::Signed);
    }
    Ok(input.parse::<T>()?)
}

impl FromStr for OffsetSpec {
    type Err = OffsetError;

    /// Parses `"<byte>@<bit>"`, e.g. `"122@0"`. No surrounding whitespace is allowed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(OFFSET_SEPARATOR);
        let (byte_part, bit_part) = match (parts.next(), parts.next(), parts.next()) {
            (Some(byte_part), Some(bit_part), None) => (byte_part, bit_part),
            (_, _, Some(_)) => return Err(OffsetError::TooManySeparators),
            _ => return Err(OffsetError::NoSeparator),
        };

        let byte_offset =
            parse_unsigned::<u64>(byte_part).map_err(|source| OffsetError::InvalidByteOffset {
                input: byte_part.to_string(),
                source,
            })?;
        let bit_offset =
            parse_unsigned::<u8>(bit_part).map_err(|source| OffsetError::InvalidBitOffset {
                input: bit_part.to_string(),
                source,
            })?;

        Self::new(byte_offset, bit_offset)
    }
}
