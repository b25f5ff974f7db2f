//! On-disk cache for a local-shape tracker's successor table.
//!
//! The table is a deterministic function of `(board_size, w, h)`, so it is
//! computed once and cached under a name that encodes those three numbers —
//! rebuilding it for a large local shape on a large board is the dominant
//! one-time cost of starting a training run.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::persistence::FORMAT_VERSION;

pub fn path_for(dir: &Path, board_size: usize, w: usize, h: usize) -> PathBuf {
    dir.join(format!("successor-{board_size}x{board_size}-{w}x{h}.bin"))
}

/// Writes `successor` (length `n * w * h * 3`) and one ignore bit per of the
/// `n` features, packed eight to a byte.
pub fn save(out: &mut impl Write, successor: &[u32], ignore_bits: &[bool]) -> Result<(), PersistenceError> {
    out.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    out.write_u32::<LittleEndian>(successor.len() as u32)?;
    out.write_u32::<LittleEndian>(ignore_bits.len() as u32)?;
    for &s in successor {
        out.write_u32::<LittleEndian>(s)?;
    }
    for chunk in ignore_bits.chunks(8) {
        let mut byte = 0u8;
        for (bit, &set) in chunk.iter().enumerate() {
            if set {
                byte |= 1 << bit;
            }
        }
        out.write_u8(byte)?;
    }
    Ok(())
}

/// Reads back a table previously written by [`save`]. The caller is
/// expected to already know the expected lengths (from the feature set it
/// just constructed) and to discard the file and rebuild on any mismatch.
pub fn load(input: &mut impl Read) -> Result<(Vec<u32>, Vec<bool>), PersistenceError> {
    let version = input.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(PersistenceError::BadHeader(format!(
            "unsupported successor-cache version {version} (supported: {FORMAT_VERSION})"
        )));
    }
    let successor_len = input.read_u32::<LittleEndian>()? as usize;
    let ignore_len = input.read_u32::<LittleEndian>()? as usize;

    let mut successor = Vec::with_capacity(successor_len);
    for _ in 0..successor_len {
        successor.push(input.read_u32::<LittleEndian>()?);
    }

    let packed_len = ignore_len.div_ceil(8);
    let mut packed = vec![0u8; packed_len];
    input.read_exact(&mut packed)?;
    let mut ignore_bits = Vec::with_capacity(ignore_len);
    for i in 0..ignore_len {
        ignore_bits.push(packed[i / 8] & (1 << (i % 8)) != 0);
    }

    Ok((successor, ignore_bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_values_and_packed_bits() {
        let successor = vec![0u32, 1, 2, u32::MAX, 4];
        let ignore_bits = vec![true, false, true, true, false, false, false, true, true];
        let mut buf = Vec::new();
        save(&mut buf, &successor, &ignore_bits).unwrap();

        let (loaded_successor, loaded_ignore) = load(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded_successor, successor);
        assert_eq!(loaded_ignore, ignore_bits);
    }

    #[test]
    fn path_matches_template() {
        let p = path_for(Path::new("/tmp/cache"), 5, 2, 1);
        assert_eq!(p, Path::new("/tmp/cache/successor-5x5-2x1.bin"));
    }
}
