//! IFD0 fields of TIFF files and JPEG EXIF blocks, read through nom-exif.

use anyhow::{Context, Result};
use nom_exif::*;
use std::io::Cursor;

use crate::resolution::MM_PER_INCH;

pub(crate) const TAG_COMPRESSION: u16 = 0x0103;
pub(crate) const TAG_SAMPLES_PER_PIXEL: u16 = 0x0115;
pub(crate) const TAG_X_RESOLUTION: u16 = 0x011A;
pub(crate) const TAG_Y_RESOLUTION: u16 = 0x011B;
pub(crate) const TAG_RESOLUTION_UNIT: u16 = 0x0128;

pub(crate) const UNIT_INCH: u16 = 2;
pub(crate) const UNIT_CENTIMETER: u16 = 3;

/// Tags of the first image file directory.
pub(crate) struct Ifd0 {
    exif: Exif,
}

impl Ifd0 {
    /// Parse a complete JPEG or TIFF file held in memory.
    ///
    /// Data nom-exif does not recognise as a container is an error; a
    /// recognised container without EXIF gives `Ok(None)`.
    pub(crate) fn read(data: &[u8]) -> Result<Option<Self>> {
        let mut parser = MediaParser::new();
        let ms = MediaSource::seekable(Cursor::new(data)).context("Unrecognised EXIF container")?;

        let iter: ExifIter = match parser.parse(ms) {
            Ok(iter) => iter,
            Err(e) => {
                log::debug!("No EXIF data found: {e}");
                return Ok(None);
            }
        };
        Ok(Some(Self { exif: iter.into() }))
    }

    fn value(&self, tag: u16) -> Option<&EntryValue> {
        self.exif.get_by_ifd_tag_code(0, tag)
    }

    /// Value of a BYTE, SHORT or LONG entry.
    pub(crate) fn unsigned(&self, tag: u16) -> Option<u32> {
        match self.value(tag)? {
            EntryValue::U8(v) => Some(u32::from(*v)),
            EntryValue::U16(v) => Some(u32::from(*v)),
            EntryValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Value of a RATIONAL entry, if its denominator is non-zero.
    pub(crate) fn rational(&self, tag: u16) -> Option<f64> {
        match self.value(tag)? {
            EntryValue::URational(r) if r.1 != 0 => Some(f64::from(r.0) / f64::from(r.1)),
            _ => None,
        }
    }

    /// Physical pixel size in millimeters per axis.
    ///
    /// A missing unit means inches. Unit "none", or any unit outside the
    /// SHORT range, carries no physical size.
    pub(crate) fn pixel_size_mm(&self) -> (Option<f64>, Option<f64>) {
        let unit = self.unsigned(TAG_RESOLUTION_UNIT).map(|u| u16::try_from(u).ok());
        let mm_per_unit = match unit {
            None | Some(Some(UNIT_INCH)) => MM_PER_INCH,
            Some(Some(UNIT_CENTIMETER)) => 10.0,
            Some(_) => return (None, None),
        };
        let size = |tag| {
            self.rational(tag)
                .filter(|per_unit| *per_unit > 0.0)
                .map(|per_unit| mm_per_unit / per_unit)
        };
        (size(TAG_X_RESOLUTION), size(TAG_Y_RESOLUTION))
    }
}
