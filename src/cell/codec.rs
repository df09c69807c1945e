//! Cell codec
//!
//! Fixed binary layout for cells, shared by segment files and the sparse
//! index. Round trips byte-exactly: `decode(encode(c)) == c`.
//!
//! ## Layout
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬─────────┬──────────┐
//! │RowLen (2)│FamLen (1)│QualLen(2)│  TS (8)  │ Kind (1)│ValLen (4)│
//! ├──────────┴──────────┴──────────┴──────────┴─────────┴──────────┤
//! │ Row │ Family │ Qualifier │ Value                               │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//! All integers big-endian. Tombstone kinds carry ValLen = 0.

use bytes::Bytes;

use crate::error::{Result, StoreError};

use super::{Cell, CellKey, CellKind};

/// Fixed prefix: row_len(2) + fam_len(1) + qual_len(2) + ts(8) + kind(1) + val_len(4)
pub(crate) const CELL_HEADER_SIZE: usize = 18;

/// Encoded size of a cell
pub fn encoded_len(cell: &Cell) -> usize {
    CELL_HEADER_SIZE
        + cell.key.row.len()
        + cell.key.family.len()
        + cell.key.qualifier.len()
        + cell.value.len()
}

/// Encoded size of a cell key alone (value omitted, ValLen still present)
pub fn encoded_key_len(key: &CellKey) -> usize {
    CELL_HEADER_SIZE + key.row.len() + key.family.len() + key.qualifier.len()
}

/// Encode a cell to a fresh buffer
pub fn encode_cell(cell: &Cell) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len(cell));
    encode_cell_into(cell, &mut buf)?;
    Ok(buf)
}

/// Encode a cell, appending to `buf`
pub fn encode_cell_into(cell: &Cell, buf: &mut Vec<u8>) -> Result<()> {
    let key = &cell.key;

    if key.row.len() > u16::MAX as usize {
        return Err(StoreError::InvalidRequest(format!(
            "row key too long: {} bytes (max {})",
            key.row.len(),
            u16::MAX
        )));
    }
    if key.family.len() > u8::MAX as usize {
        return Err(StoreError::InvalidRequest(format!(
            "family too long: {} bytes (max {})",
            key.family.len(),
            u8::MAX
        )));
    }
    if key.qualifier.len() > u16::MAX as usize {
        return Err(StoreError::InvalidRequest(format!(
            "qualifier too long: {} bytes (max {})",
            key.qualifier.len(),
            u16::MAX
        )));
    }
    if key.kind.is_tombstone() && !cell.value.is_empty() {
        return Err(StoreError::InvalidRequest(
            "tombstone cell carries a value payload".to_string(),
        ));
    }

    buf.extend_from_slice(&(key.row.len() as u16).to_be_bytes());
    buf.push(key.family.len() as u8);
    buf.extend_from_slice(&(key.qualifier.len() as u16).to_be_bytes());
    buf.extend_from_slice(&key.timestamp.to_be_bytes());
    buf.push(key.kind.rank());
    buf.extend_from_slice(&(cell.value.len() as u32).to_be_bytes());
    buf.extend_from_slice(&key.row);
    buf.extend_from_slice(&key.family);
    buf.extend_from_slice(&key.qualifier);
    buf.extend_from_slice(&cell.value);

    Ok(())
}

/// Decode one cell from the front of `bytes`
///
/// Returns the cell and the number of bytes consumed.
pub fn decode_cell(bytes: &[u8]) -> Result<(Cell, usize)> {
    if bytes.len() < CELL_HEADER_SIZE {
        return Err(StoreError::CorruptRecord(format!(
            "cell header truncated: {} bytes, need {}",
            bytes.len(),
            CELL_HEADER_SIZE
        )));
    }

    let row_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let fam_len = bytes[2] as usize;
    let qual_len = u16::from_be_bytes([bytes[3], bytes[4]]) as usize;
    let timestamp = u64::from_be_bytes(bytes[5..13].try_into().unwrap());
    let kind = CellKind::from_u8(bytes[13]).ok_or_else(|| {
        StoreError::CorruptRecord(format!("unknown cell kind byte: 0x{:02x}", bytes[13]))
    })?;
    let val_len = u32::from_be_bytes(bytes[14..18].try_into().unwrap()) as usize;

    let total = CELL_HEADER_SIZE + row_len + fam_len + qual_len + val_len;
    if bytes.len() < total {
        return Err(StoreError::CorruptRecord(format!(
            "cell body truncated: {} bytes, need {}",
            bytes.len(),
            total
        )));
    }
    if kind.is_tombstone() && val_len != 0 {
        return Err(StoreError::CorruptRecord(format!(
            "tombstone cell with {} value bytes",
            val_len
        )));
    }

    let mut pos = CELL_HEADER_SIZE;
    let row = Bytes::copy_from_slice(&bytes[pos..pos + row_len]);
    pos += row_len;
    let family = Bytes::copy_from_slice(&bytes[pos..pos + fam_len]);
    pos += fam_len;
    let qualifier = Bytes::copy_from_slice(&bytes[pos..pos + qual_len]);
    pos += qual_len;
    let value = Bytes::copy_from_slice(&bytes[pos..pos + val_len]);

    let cell = Cell {
        key: CellKey {
            row,
            family,
            qualifier,
            timestamp,
            kind,
        },
        value,
    };

    Ok((cell, total))
}

/// Encode a cell key alone (ValLen written as 0), for the sparse index
pub(crate) fn encode_key_into(key: &CellKey, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(key.row.len() as u16).to_be_bytes());
    buf.push(key.family.len() as u8);
    buf.extend_from_slice(&(key.qualifier.len() as u16).to_be_bytes());
    buf.extend_from_slice(&key.timestamp.to_be_bytes());
    buf.push(key.kind.rank());
    buf.extend_from_slice(&0u32.to_be_bytes());
    buf.extend_from_slice(&key.row);
    buf.extend_from_slice(&key.family);
    buf.extend_from_slice(&key.qualifier);
}

/// Decode a cell key written by [`encode_key_into`]
pub(crate) fn decode_key(bytes: &[u8]) -> Result<(CellKey, usize)> {
    let (cell, consumed) = decode_cell(bytes)?;
    Ok((cell.key, consumed))
}
