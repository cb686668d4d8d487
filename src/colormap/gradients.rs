//! Color stop definitions for the standard gradients
//!
//! Every gradient is a list of `(position, rgb)` stops with positions in
//! `0.0..=1.0`, first stop at 0 and last at 1. Tables are produced by linear
//! interpolation between neighbouring stops.

pub(crate) type Stop = (f32, [u8; 3]);

pub(crate) const BONE: &[Stop] = &[
    (0.0, [0, 0, 0]),
    (0.375, [84, 84, 116]),
    (0.75, [167, 199, 199]),
    (1.0, [255, 255, 255]),
];

pub(crate) const JET: &[Stop] = &[
    (0.0, [0, 0, 128]),
    (0.125, [0, 0, 255]),
    (0.375, [0, 255, 255]),
    (0.625, [255, 255, 0]),
    (0.875, [255, 0, 0]),
    (1.0, [128, 0, 0]),
];

pub(crate) const HOT: &[Stop] = &[
    (0.0, [0, 0, 0]),
    (0.375, [255, 0, 0]),
    (0.75, [255, 255, 0]),
    (1.0, [255, 255, 255]),
];

pub(crate) const RAINBOW: &[Stop] = &[
    (0.0, [255, 0, 0]),
    (0.2, [255, 255, 0]),
    (0.4, [0, 255, 0]),
    (0.6, [0, 255, 255]),
    (0.8, [0, 0, 255]),
    (1.0, [170, 0, 255]),
];

pub(crate) const OCEAN: &[Stop] = &[
    (0.0, [0, 128, 0]),
    (0.333, [0, 0, 85]),
    (0.667, [0, 128, 170]),
    (1.0, [255, 255, 255]),
];

pub(crate) const PINK: &[Stop] = &[
    (0.0, [30, 0, 0]),
    (0.375, [196, 140, 140]),
    (0.75, [232, 232, 182]),
    (1.0, [255, 255, 255]),
];

pub(crate) const WINTER: &[Stop] = &[(0.0, [0, 0, 255]), (1.0, [0, 255, 128])];

pub(crate) const PARULA: &[Stop] = &[
    (0.0, [53, 42, 135]),
    (0.25, [20, 132, 212]),
    (0.5, [56, 185, 158]),
    (0.75, [209, 187, 89]),
    (1.0, [249, 251, 14]),
];

pub(crate) const AUTUMN: &[Stop] = &[(0.0, [255, 0, 0]), (1.0, [255, 255, 0])];

pub(crate) const SUMMER: &[Stop] = &[(0.0, [0, 128, 102]), (1.0, [255, 255, 102])];

pub(crate) const SPRING: &[Stop] = &[(0.0, [255, 0, 255]), (1.0, [255, 255, 0])];

pub(crate) const COOL: &[Stop] = &[(0.0, [0, 255, 255]), (1.0, [255, 0, 255])];

pub(crate) const HSV: &[Stop] = &[
    (0.0, [255, 0, 0]),
    (1.0 / 6.0, [255, 255, 0]),
    (2.0 / 6.0, [0, 255, 0]),
    (3.0 / 6.0, [0, 255, 255]),
    (4.0 / 6.0, [0, 0, 255]),
    (5.0 / 6.0, [255, 0, 255]),
    (1.0, [255, 0, 0]),
];

pub(crate) const MAGMA: &[Stop] = &[
    (0.0, [0, 0, 4]),
    (0.25, [81, 18, 124]),
    (0.5, [183, 55, 121]),
    (0.75, [252, 137, 97]),
    (1.0, [252, 253, 191]),
];

pub(crate) const INFERNO: &[Stop] = &[
    (0.0, [0, 0, 4]),
    (0.25, [87, 16, 110]),
    (0.5, [188, 55, 84]),
    (0.75, [249, 142, 9]),
    (1.0, [252, 255, 164]),
];

pub(crate) const PLASMA: &[Stop] = &[
    (0.0, [13, 8, 135]),
    (0.25, [126, 3, 168]),
    (0.5, [204, 71, 120]),
    (0.75, [248, 149, 64]),
    (1.0, [240, 249, 33]),
];

pub(crate) const VIRIDIS: &[Stop] = &[
    (0.0, [68, 1, 84]),
    (0.25, [59, 82, 139]),
    (0.5, [33, 145, 140]),
    (0.75, [94, 201, 98]),
    (1.0, [253, 231, 37]),
];

pub(crate) const CIVIDIS: &[Stop] = &[
    (0.0, [0, 34, 78]),
    (0.25, [65, 77, 107]),
    (0.5, [124, 123, 120]),
    (0.75, [187, 175, 113]),
    (1.0, [254, 232, 56]),
];

/// Expand color stops into a table of `size` entries
pub(crate) fn interpolate(stops: &[Stop], size: usize) -> Vec<[u8; 3]> {
    debug_assert!(stops.len() >= 2);
    if size == 1 {
        return vec![stops[0].1];
    }

    let mut table = Vec::with_capacity(size);
    let mut segment = 0;
    for i in 0..size {
        let t = i as f32 / (size - 1) as f32;
        while segment + 2 < stops.len() && t > stops[segment + 1].0 {
            segment += 1;
        }
        let (p0, c0) = stops[segment];
        let (p1, c1) = stops[segment + 1];
        let local = if p1 > p0 {
            ((t - p0) / (p1 - p0)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        table.push([
            lerp(c0[0], c1[0], local),
            lerp(c0[1], c1[1], local),
            lerp(c0[2], c1[2], local),
        ]);
    }
    table
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[&[Stop]] = &[
        BONE, JET, HOT, RAINBOW, OCEAN, PINK, WINTER, PARULA, AUTUMN, SUMMER, SPRING, COOL, HSV,
        MAGMA, INFERNO, PLASMA, VIRIDIS, CIVIDIS,
    ];

    #[test]
    fn test_stops_cover_unit_interval() {
        for stops in ALL {
            assert_eq!(stops.first().map(|s| s.0), Some(0.0));
            assert_eq!(stops.last().map(|s| s.0), Some(1.0));
            assert!(stops.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }

    #[test]
    fn test_interpolate_hits_endpoints() {
        let table = interpolate(HOT, 256);
        assert_eq!(table.len(), 256);
        assert_eq!(table[0], [0, 0, 0]);
        assert_eq!(table[255], [255, 255, 255]);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let table = interpolate(&[(0.0, [0, 0, 0]), (1.0, [200, 100, 50])], 3);
        assert_eq!(table[1], [100, 50, 25]);
    }
}
