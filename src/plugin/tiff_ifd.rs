//! In-place rewrite of the IFD0 resolution entries of a TIFF file.
//!
//! Reading goes through [`super::exif`]; only the patch needs raw offsets.

use super::exif::{TAG_RESOLUTION_UNIT, TAG_X_RESOLUTION, TAG_Y_RESOLUTION, UNIT_INCH};
use crate::error::MetadataError;

const TYPE_SHORT: u16 = 3;
const TYPE_RATIONAL: u16 = 5;

const ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        })
    }

    fn encode_u16(self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    fn encode_u32(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Position of the 4-byte value/offset field within the TIFF data.
    value_pos: usize,
}

/// Byte order and entry table of IFD0.
fn directory(data: &[u8]) -> Result<(ByteOrder, Vec<Entry>), MetadataError> {
    let order = match data.get(0..2) {
        Some(b"II") => ByteOrder::Little,
        Some(b"MM") => ByteOrder::Big,
        _ => return Err(MetadataError::malformed("TIFF", "invalid byte order mark")),
    };
    if order.u16(data, 2) != Some(42) {
        return Err(MetadataError::malformed("TIFF", "missing magic number"));
    }

    let ifd_offset = order
        .u32(data, 4)
        .ok_or_else(|| MetadataError::malformed("TIFF", "truncated header"))? as usize;
    let count = order
        .u16(data, ifd_offset)
        .ok_or_else(|| MetadataError::malformed("TIFF", "IFD0 offset out of bounds"))? as usize;

    let start = ifd_offset + 2;
    if start + count * ENTRY_SIZE > data.len() {
        return Err(MetadataError::malformed("TIFF", "IFD0 entries extend beyond data"));
    }

    let entries = (0..count)
        .filter_map(|i| {
            let at = start + i * ENTRY_SIZE;
            Some(Entry {
                tag: order.u16(data, at)?,
                field_type: order.u16(data, at + 2)?,
                count: order.u32(data, at + 4)?,
                value_pos: at + 8,
            })
        })
        .collect();
    Ok((order, entries))
}

/// Rewrite the resolution entries of IFD0 in place as pixels per inch.
///
/// The entries must already exist; the directory layout is never changed.
pub(crate) fn patch_resolution(data: &mut [u8], x_dpi: f64, y_dpi: f64) -> Result<(), MetadataError> {
    let (order, entries) = directory(data)?;
    let entry = |tag: u16| entries.iter().find(|e| e.tag == tag);
    let rational_offset = |tag: u16| -> Result<usize, MetadataError> {
        let entry = entry(tag)
            .filter(|e| e.field_type == TYPE_RATIONAL && e.count > 0)
            .ok_or_else(|| MetadataError::malformed("TIFF", format!("no RATIONAL entry for tag {tag:#06x}")))?;
        let offset = order
            .u32(data, entry.value_pos)
            .ok_or_else(|| MetadataError::malformed("TIFF", "truncated entry"))? as usize;
        if offset + 8 > data.len() {
            return Err(MetadataError::malformed("TIFF", "rational value out of bounds"));
        }
        Ok(offset)
    };
    let x = rational_offset(TAG_X_RESOLUTION)?;
    let y = rational_offset(TAG_Y_RESOLUTION)?;
    let unit = entry(TAG_RESOLUTION_UNIT)
        .filter(|e| e.field_type == TYPE_SHORT)
        .map(|e| e.value_pos);

    for (offset, dpi) in [(x, x_dpi), (y, y_dpi)] {
        let (numerator, denominator) = to_rational(dpi);
        data[offset..offset + 4].copy_from_slice(&order.encode_u32(numerator));
        data[offset + 4..offset + 8].copy_from_slice(&order.encode_u32(denominator));
    }
    if let Some(pos) = unit {
        data[pos..pos + 2].copy_from_slice(&order.encode_u16(UNIT_INCH));
    }
    Ok(())
}

/// Pixels per inch as a rational in thousandths.
fn to_rational(dpi: f64) -> (u32, u32) {
    let scaled = (dpi * 1000.0).round().clamp(1.0, f64::from(u32::MAX));
    (scaled as u32, 1000)
}
