use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;

/// A byte stream that can be read, written and repositioned, e.g. a `std::fs::File`
/// opened read-write or an in-memory `Cursor<Vec<u8>>`.
pub trait ReadWriteSeek: Read + Write + Seek {}

impl<T: Read + Write + Seek + ?Sized> ReadWriteSeek for T {}

/// The step of a read-modify-write flip that failed.
///
/// A failure before [`FlipError::Write`] leaves the byte untouched. Nothing is rolled back
/// after a failed write.
#[derive(Error, Debug)]
pub enum FlipError {
    #[error("seeking to flip offset: {0}")]
    Seek(#[source] io::Error),

    #[error("reading data from flip offset: {0}")]
    Read(#[source] io::Error),

    #[error("seeking back to flip offset: {0}")]
    SeekBack(#[source] io::Error),

    #[error("writing back the flipped bit: {0}")]
    Write(#[source] io::Error),
}

/// Returns `byte` with bit `n` inverted, counting from the least-significant bit.
///
/// The index is not range checked: for `n >= 8` the mask falls off the byte and `byte`
/// comes back unchanged.
pub fn toggle_nth_bit(byte: u8, n: u8) -> u8 {
    let single_bit_mask = 1u8.checked_shl(u32::from(n)).unwrap_or(0);
    byte ^ single_bit_mask
}

/// Flips one bit of the byte at `byte_offset` in `stream`.
///
/// Exactly one byte is read and one byte written. On success the stream is positioned
/// immediately after the flipped byte. Offsets past the end of the stream fail on the read.
pub fn flip_bit_at_offset<S>(
    stream: &mut S,
    byte_offset: u64,
    bit_offset: u8,
) -> Result<(), FlipError>
where
    S: Read + Write + Seek + ?Sized,
{
    stream
        .seek(SeekFrom::Start(byte_offset))
        .map_err(FlipError::Seek)?;

    let mut one_byte = [0u8; 1];
    stream.read_exact(&mut one_byte).map_err(FlipError::Read)?;

    one_byte[0] = toggle_nth_bit(one_byte[0], bit_offset);

    stream
        .seek(SeekFrom::Current(-1))
        .map_err(FlipError::SeekBack)?;
    stream.write_all(&one_byte).map_err(FlipError::Write)?;
    Ok(())
}
