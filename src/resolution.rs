//! Conversion between print resolution and the standard `Dimension` fragment.
//!
//! Resolution is carried in pixels per inch; the standard tree stores the
//! physical size of one pixel in millimeters, per axis:
//!
//! ```text
//! <standard_image_metadata_1.0>
//!   <Dimension>
//!     <HorizontalPixelSize value="0.08466666666666667"/>
//!     <VerticalPixelSize value="0.08466666666666667"/>
//!   </Dimension>
//! </standard_image_metadata_1.0>
//! ```
//!
//! # Example
//!
//! ```rust
//! use metaprobe::resolution::{decode, encode};
//!
//! let fragment = encode(300.0).unwrap();
//! let resolution = decode(&fragment).unwrap();
//! assert_eq!(format!("{:.1}", resolution.horizontal.unwrap()), "300.0");
//! ```

use serde::Serialize;

use crate::error::MetadataError;
use crate::metadata::{MetadataNode, STANDARD_FORMAT_NAME};

pub const MM_PER_INCH: f64 = 25.4;

pub const DIMENSION: &str = "Dimension";
pub const HORIZONTAL_PIXEL_SIZE: &str = "HorizontalPixelSize";
pub const VERTICAL_PIXEL_SIZE: &str = "VerticalPixelSize";

/// Physical resolution read from a metadata tree, in pixels per inch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Resolution {
    pub horizontal: Option<f64>,
    pub vertical: Option<f64>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.horizontal.is_none() && self.vertical.is_none()
    }
}

pub fn dpi_to_mm_per_pixel(dpi: f64) -> f64 {
    MM_PER_INCH / dpi
}

pub fn mm_per_pixel_to_dpi(mm_per_pixel: f64) -> f64 {
    MM_PER_INCH / mm_per_pixel
}

/// Build the standard fragment declaring square pixels at `dpi`.
///
/// The stored value is the shortest decimal that round-trips the computed
/// `f64`, with no rounding for storage.
pub fn encode(dpi: f64) -> Result<MetadataNode, MetadataError> {
    if !dpi.is_finite() || dpi <= 0.0 {
        return Err(MetadataError::InvalidResolution(dpi));
    }

    let pixel_size = dpi_to_mm_per_pixel(dpi).to_string();

    Ok(MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
        MetadataNode::new(DIMENSION)
            .with_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE).with_attribute("value", pixel_size.clone()))
            .with_child(MetadataNode::new(VERTICAL_PIXEL_SIZE).with_attribute("value", pixel_size)),
    ))
}

/// Read the resolution declared by a standard tree.
///
/// Only direct children are consulted: `Dimension` under the root, then each
/// pixel size under `Dimension`. Either axis may be missing independently.
/// A missing `value` attribute counts as missing; a value that is not a
/// decimal number is an error.
pub fn decode(tree: &MetadataNode) -> Result<Resolution, MetadataError> {
    let Some(dimension) = tree.child(DIMENSION) else {
        return Ok(Resolution::default());
    };

    Ok(Resolution {
        horizontal: axis(dimension, HORIZONTAL_PIXEL_SIZE)?,
        vertical: axis(dimension, VERTICAL_PIXEL_SIZE)?,
    })
}

fn axis(dimension: &MetadataNode, element: &str) -> Result<Option<f64>, MetadataError> {
    let value = dimension.child(element).and_then(|e| e.attribute("value"));
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };

    let mm_per_pixel: f64 = value
        .trim()
        .parse()
        .map_err(|_| MetadataError::InvalidPixelSize {
            element: element.to_string(),
            value: value.to_string(),
        })?;

    Ok(Some(mm_per_pixel_to_dpi(mm_per_pixel)))
}

/// `"<n> pixels per inch"` with `precision` decimals, or `"(none)"`.
pub fn format_resolution(dpi: Option<f64>, precision: usize) -> String {
    match dpi {
        Some(dpi) => format!("{dpi:.precision$} pixels per inch"),
        None => "(none)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round1(v: f64) -> String {
        format!("{v:.1}")
    }

    #[test]
    fn encode_300_dpi() {
        let tree = encode(300.0).unwrap();
        assert_eq!(tree.name(), STANDARD_FORMAT_NAME);
        let dim = tree.child(DIMENSION).unwrap();
        let h = dim.child(HORIZONTAL_PIXEL_SIZE).unwrap().attribute("value").unwrap();
        let v = dim.child(VERTICAL_PIXEL_SIZE).unwrap().attribute("value").unwrap();
        assert!(h.starts_with("0.08466666"), "{h}");
        assert_eq!(h, v);
    }

    #[test]
    fn encode_keeps_full_precision() {
        let tree = encode(72.0).unwrap();
        let h = tree
            .child(DIMENSION)
            .and_then(|d| d.child(HORIZONTAL_PIXEL_SIZE))
            .and_then(|e| e.attribute("value"))
            .unwrap();
        assert_eq!(h.parse::<f64>().unwrap(), 25.4 / 72.0);
    }

    #[test]
    fn round_trip_various_resolutions() {
        for dpi in [1.0, 72.0, 96.0, 150.0, 300.0, 333.3, 600.0, 1200.0, 2540.0] {
            let decoded = decode(&encode(dpi).unwrap()).unwrap();
            assert_eq!(round1(decoded.horizontal.unwrap()), round1(dpi), "dpi {dpi}");
            assert_eq!(round1(decoded.vertical.unwrap()), round1(dpi), "dpi {dpi}");
        }
    }

    #[test]
    fn encode_rejects_non_positive() {
        assert!(matches!(encode(0.0), Err(MetadataError::InvalidResolution(_))));
        assert!(matches!(encode(-72.0), Err(MetadataError::InvalidResolution(_))));
        assert!(matches!(encode(f64::NAN), Err(MetadataError::InvalidResolution(_))));
        assert!(matches!(encode(f64::INFINITY), Err(MetadataError::InvalidResolution(_))));
    }

    #[test]
    fn decode_without_dimension() {
        let tree = MetadataNode::new(STANDARD_FORMAT_NAME)
            .with_child(MetadataNode::new("Chroma"));
        assert_eq!(decode(&tree).unwrap(), Resolution::default());
        assert!(decode(&tree).unwrap().is_empty());
    }

    #[test]
    fn decode_axes_independently() {
        let tree = MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
            MetadataNode::new(DIMENSION)
                .with_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE).with_attribute("value", "0.254")),
        );
        let res = decode(&tree).unwrap();
        assert_eq!(round1(res.horizontal.unwrap()), "100.0");
        assert!(res.vertical.is_none());
    }

    #[test]
    fn decode_missing_value_attribute_is_none() {
        let tree = MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
            MetadataNode::new(DIMENSION)
                .with_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE))
                .with_child(MetadataNode::new(VERTICAL_PIXEL_SIZE).with_attribute("value", "0.127")),
        );
        let res = decode(&tree).unwrap();
        assert!(res.horizontal.is_none());
        assert_eq!(round1(res.vertical.unwrap()), "200.0");
    }

    #[test]
    fn decode_empty_value_attribute_is_none() {
        let tree = MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
            MetadataNode::new(DIMENSION)
                .with_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE).with_attribute("value", ""))
                .with_child(MetadataNode::new(VERTICAL_PIXEL_SIZE).with_attribute("value", "0.254")),
        );
        let res = decode(&tree).unwrap();
        assert!(res.horizontal.is_none());
        assert_eq!(round1(res.vertical.unwrap()), "100.0");
    }

    #[test]
    fn decode_only_looks_at_direct_children() {
        let tree = MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
            MetadataNode::new("Wrapper").with_child(
                MetadataNode::new(DIMENSION)
                    .with_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE).with_attribute("value", "0.254")),
            ),
        );
        assert!(decode(&tree).unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_non_numeric() {
        let tree = MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
            MetadataNode::new(DIMENSION)
                .with_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE).with_attribute("value", "wide")),
        );
        let err = decode(&tree).unwrap_err();
        assert!(err.to_string().contains("wide"));
    }

    #[test]
    fn format_resolution_rounds_to_precision() {
        assert_eq!(format_resolution(Some(299.9994), 1), "300.0 pixels per inch");
        assert_eq!(format_resolution(Some(72.0), 2), "72.00 pixels per inch");
        assert_eq!(format_resolution(None, 1), "(none)");
    }
}
