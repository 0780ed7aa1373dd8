//! Raw image samples to 8-bit pixels, and CCITT fax data to a TIFF file.

use image::{DynamicImage, GrayImage, RgbImage};
use thiserror::Error;

/// Why raw samples could not be turned into pixels.
#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum SampleError {
    #[error("{0}")]
    Unsupported(String),

    #[error("truncated sample data: {actual} < {expected} bytes")]
    Truncated { actual: usize, expected: usize },
}

/// Process color spaces samples can be converted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl DeviceSpace {
    fn components(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    Device(DeviceSpace),
    /// One sample per pixel, looked up in `palette` (entries in `base`).
    Indexed {
        base: DeviceSpace,
        hival: u8,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            Self::Device(space) => space.components(),
            Self::Indexed { .. } => 1,
        }
    }

    fn output(&self) -> DeviceSpace {
        match self {
            Self::Device(space) | Self::Indexed { base: space, .. } => *space,
        }
    }
}

/// Palette entry for indices the lookup table does not cover.
static NO_COLOR: [u8; 4] = [0; 4];

/// Shape of an unfiltered sample stream.
#[derive(Debug, Clone)]
pub(crate) struct SampleLayout {
    pub width: u32,
    pub height: u32,
    pub bits: u8,
    pub color_space: ColorSpace,
    /// `/Decode [1 0]` on a direct color space.
    pub inverted: bool,
}

/// Reads big-endian packed samples from one row.
struct SampleReader<'a> {
    row: &'a [u8],
    bits: usize,
    position: usize,
}

impl<'a> SampleReader<'a> {
    fn new(row: &'a [u8], bits: u8) -> Self {
        Self {
            row,
            bits: bits as usize,
            position: 0,
        }
    }

    fn next_sample(&mut self) -> u16 {
        let byte = self.position / 8;
        let value = match self.bits {
            16 => u16::from_be_bytes([self.row[byte], self.row[byte + 1]]),
            8 => self.row[byte] as u16,
            bits => {
                let shift = 8 - bits - self.position % 8;
                ((self.row[byte] >> shift) & ((1u8 << bits) - 1)) as u16
            }
        };
        self.position += self.bits;
        value
    }
}

/// Map a `bits`-wide sample onto 0..=255.
fn scale(value: u16, bits: u8, inverted: bool) -> u8 {
    let max = (1u32 << bits) - 1;
    let scaled = ((value as u32 * 255 + max / 2) / max) as u8;
    if inverted { 255 - scaled } else { scaled }
}

fn push_color(space: DeviceSpace, color: &[u8], out: &mut Vec<u8>) {
    match space {
        DeviceSpace::Gray | DeviceSpace::Rgb => out.extend_from_slice(color),
        DeviceSpace::Cmyk => {
            let black = 255 - color[3] as u32;
            out.extend(color[..3].iter().map(|&ink| ((255 - ink as u32) * black / 255) as u8));
        }
    }
}

/// Expand packed samples into an 8-bit gray or RGB image. Rows are padded
/// to a byte boundary; CMYK and palettes over RGB or CMYK produce RGB.
pub(crate) fn decode_samples(
    layout: &SampleLayout,
    data: &[u8],
) -> Result<DynamicImage, SampleError> {
    let bits = layout.bits;
    let indexed = matches!(layout.color_space, ColorSpace::Indexed { .. });
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) || (indexed && bits == 16) {
        return Err(SampleError::Unsupported(format!("{bits} bits per component")));
    }

    let width = layout.width as usize;
    let row_bytes = (width * layout.color_space.components() * bits as usize).div_ceil(8);
    let expected = row_bytes * layout.height as usize;
    if data.len() < expected {
        return Err(SampleError::Truncated {
            actual: data.len(),
            expected,
        });
    }

    let output = layout.color_space.output();
    let channels = if output == DeviceSpace::Gray { 1 } else { 3 };
    let mut pixels = Vec::with_capacity(width * layout.height as usize * channels);
    let mut color = vec![0u8; layout.color_space.components()];

    for row in data[..expected].chunks_exact(row_bytes.max(1)) {
        let mut reader = SampleReader::new(row, bits);
        for _ in 0..width {
            match &layout.color_space {
                ColorSpace::Device(space) => {
                    for component in color.iter_mut() {
                        *component = scale(reader.next_sample(), bits, layout.inverted);
                    }
                    push_color(*space, &color, &mut pixels);
                }
                ColorSpace::Indexed { base, hival, palette } => {
                    let n = base.components();
                    let index = reader.next_sample().min(*hival as u16) as usize;
                    let entry = palette.get(index * n..(index + 1) * n).unwrap_or(&NO_COLOR[..n]);
                    push_color(*base, entry, &mut pixels);
                }
            }
        }
    }

    let mismatch =
        || SampleError::Unsupported("sample buffer does not match dimensions".to_string());
    if channels == 1 {
        GrayImage::from_raw(layout.width, layout.height, pixels)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(mismatch)
    } else {
        RgbImage::from_raw(layout.width, layout.height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(mismatch)
    }
}

/// `/DecodeParms` of a CCITTFaxDecode stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FaxParams {
    pub columns: u32,
    pub rows: u32,
    /// Negative for Group 4, zero for Group 3 1-D, positive for Group 3 2-D.
    pub k: i64,
    /// Decoded black pixels show as white.
    pub reversed: bool,
}

const TIFF_SHORT: u16 = 3;
const TIFF_LONG: u16 = 4;

/// Wrap CCITT fax data, unchanged, as a single-strip little-endian TIFF.
pub(crate) fn ccitt_tiff(params: &FaxParams, data: &[u8]) -> Result<Vec<u8>, SampleError> {
    let byte_count = u32::try_from(data.len())
        .map_err(|_| SampleError::Unsupported("fax data too large for TIFF".to_string()))?;

    let (compression, options_tag, options) = match params.k {
        k if k < 0 => (4, 293, 0),
        0 => (3, 292, 0),
        _ => (3, 292, 1),
    };

    // Header, entry count, ten entries, next-IFD offset.
    let strip_offset: u32 = 8 + 2 + 10 * 12 + 4;
    let entries: [(u16, u16, u32); 10] = [
        (256, TIFF_LONG, params.columns),
        (257, TIFF_LONG, params.rows),
        (258, TIFF_SHORT, 1),
        (259, TIFF_SHORT, compression),
        (262, TIFF_SHORT, params.reversed as u32),
        (273, TIFF_LONG, strip_offset),
        (277, TIFF_SHORT, 1),
        (278, TIFF_LONG, params.rows),
        (279, TIFF_LONG, byte_count),
        (options_tag, TIFF_LONG, options),
    ];

    let mut tiff = Vec::with_capacity(strip_offset as usize + data.len());
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, kind, value) in entries {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&kind.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        if kind == TIFF_SHORT {
            tiff.extend_from_slice(&(value as u16).to_le_bytes());
            tiff.extend_from_slice(&[0, 0]);
        } else {
            tiff.extend_from_slice(&value.to_le_bytes());
        }
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(data);
    Ok(tiff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn layout(width: u32, height: u32, bits: u8, color_space: ColorSpace) -> SampleLayout {
        SampleLayout {
            width,
            height,
            bits,
            color_space,
            inverted: false,
        }
    }

    fn gray(width: u32, height: u32, bits: u8) -> SampleLayout {
        layout(width, height, bits, ColorSpace::Device(DeviceSpace::Gray))
    }

    #[test]
    fn test_one_bit_rows_are_byte_padded() {
        let image = decode_samples(&gray(3, 2, 1), &[0b1010_0000, 0b0100_0000]).unwrap();
        assert_eq!(image.to_luma8().into_raw(), vec![255, 0, 255, 0, 255, 0]);
    }

    #[test]
    fn test_sub_byte_samples_are_scaled() {
        let two_bit = decode_samples(&gray(4, 1, 2), &[0b0001_1011]).unwrap();
        assert_eq!(two_bit.to_luma8().into_raw(), vec![0, 85, 170, 255]);

        let four_bit = decode_samples(&gray(2, 1, 4), &[0x0F]).unwrap();
        assert_eq!(four_bit.to_luma8().into_raw(), vec![0, 255]);
    }

    #[test]
    fn test_sixteen_bit_rgb_keeps_high_byte() {
        let rgb = layout(1, 1, 16, ColorSpace::Device(DeviceSpace::Rgb));
        let image = decode_samples(&rgb, &[0xFF, 0xFF, 0x80, 0x00, 0x00, 0x10]).unwrap();
        assert_eq!(image.to_rgb8().into_raw(), vec![255, 128, 0]);
    }

    #[test]
    fn test_decode_array_inverts_samples() {
        let mask = SampleLayout {
            inverted: true,
            ..gray(2, 1, 1)
        };
        let image = decode_samples(&mask, &[0b1000_0000]).unwrap();
        assert_eq!(image.to_luma8().into_raw(), vec![0, 255]);
    }

    #[test]
    fn test_cmyk_becomes_rgb() {
        let cmyk = layout(3, 1, 8, ColorSpace::Device(DeviceSpace::Cmyk));
        let samples = [0, 0, 0, 0, 0, 0, 0, 255, 255, 0, 0, 0];
        let image = decode_samples(&cmyk, &samples).unwrap();
        assert_eq!(
            image.to_rgb8().into_raw(),
            vec![255, 255, 255, 0, 0, 0, 0, 255, 255]
        );
    }

    #[test]
    fn test_indexed_looks_up_palette() {
        let palette = ColorSpace::Indexed {
            base: DeviceSpace::Rgb,
            hival: 1,
            palette: vec![10, 20, 30, 200, 100, 50],
        };
        // Index 15 is past hival and clamps to the last entry.
        let image = decode_samples(&layout(3, 1, 4, palette), &[0x01, 0xF0]).unwrap();
        assert_eq!(
            image.to_rgb8().into_raw(),
            vec![10, 20, 30, 200, 100, 50, 200, 100, 50]
        );
    }

    #[test]
    fn test_indexed_gray_stays_gray() {
        let palette = ColorSpace::Indexed {
            base: DeviceSpace::Gray,
            hival: 2,
            palette: vec![0, 128],
        };
        let image = decode_samples(&layout(3, 1, 8, palette), &[1, 0, 2]).unwrap();
        // Entry 2 is missing from the short palette and reads as zero.
        assert_eq!(image.to_luma8().into_raw(), vec![128, 0, 0]);
    }

    #[test]
    fn test_rejects_bad_bit_depth_and_short_data() {
        assert_eq!(
            decode_samples(&gray(1, 1, 3), &[0]).unwrap_err(),
            SampleError::Unsupported("3 bits per component".to_string())
        );
        assert_eq!(
            decode_samples(&gray(9, 2, 1), &[0, 0, 0]).unwrap_err(),
            SampleError::Truncated {
                actual: 3,
                expected: 4
            }
        );
    }

    #[test]
    fn test_ccitt_tiff_layout() {
        let params = FaxParams {
            columns: 16,
            rows: 4,
            k: -1,
            reversed: false,
        };
        let tiff = ccitt_tiff(&params, &[0xAA, 0xBB]).unwrap();

        assert_eq!(&tiff[..8], b"II*\0\x08\0\0\0");
        assert_eq!(u16::from_le_bytes([tiff[8], tiff[9]]), 10);

        let entry = |n: usize| {
            let at = 10 + n * 12;
            (
                u16::from_le_bytes([tiff[at], tiff[at + 1]]),
                u32::from_le_bytes([tiff[at + 8], tiff[at + 9], tiff[at + 10], tiff[at + 11]]),
            )
        };
        assert_eq!(entry(0), (256, 16));
        assert_eq!(entry(1), (257, 4));
        assert_eq!(entry(3), (259, 4));
        assert_eq!(entry(5), (273, 134));
        assert_eq!(entry(8), (279, 2));
        assert_eq!(entry(9), (293, 0));
        assert_eq!(&tiff[134..], &[0xAA, 0xBB]);
    }

    #[test]
    fn test_ccitt_group3_options() {
        let params = FaxParams {
            columns: 8,
            rows: 1,
            k: 2,
            reversed: true,
        };
        let tiff = ccitt_tiff(&params, &[]).unwrap();
        let value = |at: usize| u16::from_le_bytes([tiff[at], tiff[at + 1]]);

        // Compression, photometric, and the T4Options tag.
        assert_eq!(value(10 + 3 * 12 + 8), 3);
        assert_eq!(value(10 + 4 * 12 + 8), 1);
        assert_eq!(value(10 + 9 * 12), 292);
        assert_eq!(value(10 + 9 * 12 + 8), 1);
    }
}
