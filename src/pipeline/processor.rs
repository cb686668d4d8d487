//! Colormap application
//!
//! [`apply`] is a pure function of its inputs: the same raw frame and table
//! always produce byte-identical output. The LUT is passed in per call, so a
//! swap can only ever take effect between frames.

use crate::colormap::Lut;
use crate::types::{ColorFrame, RawFrame};

/// Map every sample of `raw` through `lut`
///
/// Samples beyond the end of the table saturate to the last entry. When the
/// frame and table depths differ, samples are rescaled so the full sensor
/// range spans the full table.
pub fn apply(raw: &RawFrame, lut: &Lut) -> ColorFrame {
    let mut rgb = Vec::with_capacity(raw.samples().len() * 3);
    let depth = raw.bit_depth().min(16);
    if depth == 0 || depth == lut.bit_depth() {
        for &sample in raw.samples() {
            rgb.extend_from_slice(&lut.color(sample));
        }
    } else {
        let in_max = (1u64 << depth) - 1;
        let out_max = (lut.len() - 1) as u64;
        let entries = lut.entries();
        for &sample in raw.samples() {
            let sample = u64::from(sample).min(in_max);
            let idx = (sample * out_max + in_max / 2) / in_max;
            rgb.extend_from_slice(&entries[idx as usize]);
        }
    }
    ColorFrame::new(raw.width(), raw.height(), raw.sequence(), lut.name(), rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::{ColorMapRegistry, IsothermBand, LutName};
    use proptest::prelude::*;

    fn frame(width: u32, height: u32, samples: Vec<u16>) -> RawFrame {
        RawFrame::new(width, height, 8, 7, samples).unwrap()
    }

    #[test]
    fn test_apply_uses_table_entries() {
        let registry = ColorMapRegistry::default();
        let lut = registry.get(LutName::WhiteHot);
        let out = apply(&frame(2, 1, vec![0, 255]), &lut);

        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.sequence(), 7);
        assert_eq!(out.lut(), LutName::WhiteHot);
        assert_eq!(out.pixel(0, 0), [0, 0, 0]);
        assert_eq!(out.pixel(1, 0), [255, 255, 255]);
    }

    #[test]
    fn test_out_of_range_samples_saturate() {
        let lut = Lut::build(LutName::Viridis, 8, IsothermBand::default());
        let out = apply(&frame(2, 1, vec![255, 1000]), &lut);
        assert_eq!(out.pixel(0, 0), out.pixel(1, 0));
        assert_eq!(out.pixel(1, 0), [253, 231, 37]);
    }

    #[test]
    fn test_shallow_frames_span_a_deeper_table() {
        let registry = ColorMapRegistry::new(12, IsothermBand::default());
        let lut = registry.get(LutName::WhiteHot);
        let out = apply(&frame(3, 1, vec![0, 128, 255]), &lut);

        assert_eq!(out.pixel(0, 0), [0, 0, 0]);
        assert_eq!(out.pixel(2, 0), [255, 255, 255]);
        assert_eq!(out.pixel(1, 0), lut.entries()[2056]);
    }

    #[test]
    fn test_deep_frames_span_a_shallower_table() {
        let lut = Lut::build(LutName::Viridis, 8, IsothermBand::default());
        let raw = RawFrame::new(3, 1, 14, 1, vec![0, 8191, 16383]).unwrap();
        let out = apply(&raw, &lut);

        assert_eq!(out.pixel(0, 0), [68, 1, 84]);
        assert_eq!(out.pixel(1, 0), lut.entries()[127]);
        assert_eq!(out.pixel(2, 0), [253, 231, 37]);
    }

    proptest! {
        #[test]
        fn test_apply_is_deterministic(
            samples in proptest::collection::vec(0u16..512, 12),
            lut_index in 0usize..LutName::ALL.len(),
        ) {
            let lut = Lut::build(LutName::ALL[lut_index], 8, IsothermBand::default());
            let raw = frame(4, 3, samples);
            let a = apply(&raw, &lut);
            let b = apply(&raw, &lut);
            prop_assert_eq!(a.as_rgb(), b.as_rgb());
            prop_assert_eq!(a.as_rgb().len(), 4 * 3 * 3);
        }

        #[test]
        fn test_every_pixel_is_a_table_entry(
            samples in proptest::collection::vec(0u16..256, 6),
        ) {
            let lut = Lut::build(LutName::IsothermGreen, 8, IsothermBand::default());
            let raw = frame(3, 2, samples.clone());
            let out = apply(&raw, &lut);
            for (i, &s) in samples.iter().enumerate() {
                let (x, y) = ((i % 3) as u32, (i / 3) as u32);
                prop_assert_eq!(out.pixel(x, y), lut.entries()[s as usize]);
            }
        }
    }
}
