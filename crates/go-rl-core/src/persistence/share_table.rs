//! On-disk cache for a shared feature set's lookup/inverse tables.
//!
//! Path template `share-{set-name}[-si]-size-{S}.bin`. The `-si` suffix is
//! present when self-inverse detection is *disabled* — the default
//! (self-inverse features ignored) gets no suffix, matching the naming this
//! was grounded on rather than the more obvious "suffix means the feature is
//! on" reading.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::features::shared::ShareTable;
use crate::persistence::FORMAT_VERSION;

pub fn path_for(dir: &Path, set_name: &str, ignore_self_inverse: bool, board_size: usize) -> PathBuf {
    let suffix = if ignore_self_inverse { "" } else { "-si" };
    dir.join(format!("share-{set_name}{suffix}-size-{board_size}.bin"))
}

pub fn save(out: &mut impl Write, table: &ShareTable) -> Result<(), PersistenceError> {
    out.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    out.write_u32::<LittleEndian>(table.lookup.len() as u32)?;
    out.write_u32::<LittleEndian>(table.inverse.len() as u32)?;
    for &(output_index, sign) in &table.lookup {
        out.write_u32::<LittleEndian>(output_index)?;
        out.write_i8(sign)?;
    }
    for &canonical in &table.inverse {
        out.write_u32::<LittleEndian>(canonical)?;
    }
    Ok(())
}

pub fn load(input: &mut impl Read) -> Result<ShareTable, PersistenceError> {
    let version = input.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(PersistenceError::BadHeader(format!(
            "unsupported share-table version {version} (supported: {FORMAT_VERSION})"
        )));
    }
    let input_count = input.read_u32::<LittleEndian>()? as usize;
    let output_count = input.read_u32::<LittleEndian>()? as usize;

    let mut lookup = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let output_index = input.read_u32::<LittleEndian>()?;
        let sign = input.read_i8()?;
        lookup.push((output_index, sign));
    }
    let mut inverse = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        inverse.push(input.read_u32::<LittleEndian>()?);
    }
    Ok(ShareTable { lookup, inverse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_lookup_and_inverse() {
        let table = ShareTable { lookup: vec![(0, 1), (0, -1), (1, 0)], inverse: vec![2, 5] };
        let mut buf = Vec::new();
        save(&mut buf, &table).unwrap();
        let loaded = load(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.lookup, table.lookup);
        assert_eq!(loaded.inverse, table.inverse);
    }

    #[test]
    fn suffix_present_only_when_self_inverse_detection_disabled() {
        let p1 = path_for(Path::new("."), "ld", true, 9);
        assert_eq!(p1, Path::new("./share-ld-size-9.bin"));
        let p2 = path_for(Path::new("."), "ld", false, 9);
        assert_eq!(p2, Path::new("./share-ld-si-size-9.bin"));
    }
}
