//! Weight-file format (version, feature-set name, count, then the scalar
//! array as little-endian `f32`). Only the scalar is persisted; eligibility
//! traces and step sizes are rebuilt by the caller.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::PersistenceError;
use crate::persistence::FORMAT_VERSION;
use crate::weight::{LoadReport, Weight};

pub fn save(w: &mut impl Write, feature_set_name: &str, weights: &[Weight]) -> Result<(), PersistenceError> {
    w.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    let name_bytes = feature_set_name.as_bytes();
    w.write_u32::<LittleEndian>(name_bytes.len() as u32)?;
    w.write_all(name_bytes)?;
    w.write_u32::<LittleEndian>(weights.len() as u32)?;
    for weight in weights {
        w.write_f32::<LittleEndian>(weight.value)?;
    }
    Ok(())
}

/// Loads into `weights` in place (its length is the in-memory feature count).
/// Returns `Ok(None)` on an exact match, or `Ok(Some(report))` when a
/// non-strict load dropped entries from either side.
pub fn load(
    r: &mut impl Read,
    feature_set_name: &str,
    weights: &mut [Weight],
    strict: bool,
) -> Result<Option<LoadReport>, PersistenceError> {
    let version = r.read_u32::<LittleEndian>()?;
    if version != FORMAT_VERSION {
        return Err(PersistenceError::BadHeader(format!(
            "unsupported weight-file version {version} (supported: {FORMAT_VERSION})"
        )));
    }
    let name_len = r.read_u32::<LittleEndian>()? as usize;
    let mut name_bytes = vec![0u8; name_len];
    r.read_exact(&mut name_bytes)?;
    let found_name = String::from_utf8(name_bytes)
        .map_err(|_| PersistenceError::BadHeader("feature-set name is not valid UTF-8".to_string()))?;
    if strict && found_name != feature_set_name {
        return Err(PersistenceError::NameMismatch {
            expected: feature_set_name.to_string(),
            found: found_name,
        });
    }

    let file_count = r.read_u32::<LittleEndian>()? as usize;
    if strict && file_count != weights.len() {
        return Err(PersistenceError::SizeMismatch { expected: weights.len(), found: file_count });
    }

    let shared = file_count.min(weights.len());
    for weight in weights.iter_mut().take(shared) {
        weight.value = r.read_f32::<LittleEndian>()?;
    }
    // Drain any remaining file entries so a caller reusing the reader for
    // something else afterwards doesn't trip over leftover bytes.
    for _ in shared..file_count {
        r.read_f32::<LittleEndian>()?;
    }

    if file_count == weights.len() {
        Ok(None)
    } else {
        Ok(Some(LoadReport {
            dropped_from_file: file_count.saturating_sub(shared),
            dropped_from_memory: weights.len().saturating_sub(shared),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_exact_size() {
        let mut weights = vec![Weight::new(0.1); 3];
        weights[0].value = 1.5;
        weights[1].value = -2.5;
        let mut buf = Vec::new();
        save(&mut buf, "shape-1x1", &weights).unwrap();

        let mut loaded = vec![Weight::new(0.1); 3];
        let report = load(&mut Cursor::new(buf), "shape-1x1", &mut loaded, true).unwrap();
        assert!(report.is_none());
        assert_eq!(loaded[0].value, 1.5);
        assert_eq!(loaded[1].value, -2.5);
    }

    #[test]
    fn strict_rejects_name_mismatch() {
        let weights = vec![Weight::new(0.1); 2];
        let mut buf = Vec::new();
        save(&mut buf, "shape-a", &weights).unwrap();

        let mut loaded = vec![Weight::new(0.1); 2];
        let err = load(&mut Cursor::new(buf), "shape-b", &mut loaded, true).unwrap_err();
        assert!(matches!(err, PersistenceError::NameMismatch { .. }));
    }

    #[test]
    fn non_strict_loads_shared_prefix_and_reports_drop() {
        let weights = vec![Weight::new(0.1); 5];
        let mut buf = Vec::new();
        save(&mut buf, "shape-a", &weights).unwrap();

        let mut loaded = vec![Weight::new(0.1); 3];
        let report = load(&mut Cursor::new(buf), "shape-a", &mut loaded, false).unwrap().unwrap();
        assert_eq!(report.dropped_from_file, 2);
        assert_eq!(report.dropped_from_memory, 0);
    }
}
