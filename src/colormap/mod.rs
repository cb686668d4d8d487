//! False-color lookup tables
//!
//! [`ColorMapRegistry`] precomputes one table per [`LutName`] when it is built
//! and hands out `Arc<Lut>` afterwards. Tables never change after
//! construction, so the registry and the tables it returns are shared freely
//! between the controller and the capture thread without locking.
//!
//! # LUT families
//!
//! - **Standard** gradients (bone, jet, hot, viridis, ...) interpolated from
//!   color stops to `2^bit_depth` entries. Several product names are aliases
//!   for the same gradient (`WHITEHOT` is bone, `REDHOT` is hot).
//! - **Isotherm** tables: black to white grayscale with a highlighted band
//!   drawn in a single hue from dark to bright. The band position comes from
//!   [`IsothermBand`], which is configuration.

mod gradients;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::UnknownLut;
use gradients::Stop;

/// Default bit depth of the precomputed tables
pub const DEFAULT_BIT_DEPTH: u8 = 8;

/// Maximum supported bit depth
pub const MAX_BIT_DEPTH: u8 = 16;

/// Closed set of LUT names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LutName {
    WhiteHot,
    BlackHot,
    #[default]
    RedHot,
    Rainbow,
    Ocean,
    Lava,
    Arctic,
    Globow,
    GradedFire,
    InstAlert,
    Spring,
    Summer,
    Cool,
    Hsv,
    Pink,
    Hot,
    Magma,
    Inferno,
    Plasma,
    Viridis,
    Cividis,
    IsothermRed,
    IsothermGreen,
    IsothermBlue,
}

impl LutName {
    pub const ALL: [LutName; 24] = [
        LutName::WhiteHot,
        LutName::BlackHot,
        LutName::RedHot,
        LutName::Rainbow,
        LutName::Ocean,
        LutName::Lava,
        LutName::Arctic,
        LutName::Globow,
        LutName::GradedFire,
        LutName::InstAlert,
        LutName::Spring,
        LutName::Summer,
        LutName::Cool,
        LutName::Hsv,
        LutName::Pink,
        LutName::Hot,
        LutName::Magma,
        LutName::Inferno,
        LutName::Plasma,
        LutName::Viridis,
        LutName::Cividis,
        LutName::IsothermRed,
        LutName::IsothermGreen,
        LutName::IsothermBlue,
    ];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            LutName::WhiteHot => "WHITEHOT",
            LutName::BlackHot => "BLACKHOT",
            LutName::RedHot => "REDHOT",
            LutName::Rainbow => "RAINBOW",
            LutName::Ocean => "OCEAN",
            LutName::Lava => "LAVA",
            LutName::Arctic => "ARCTIC",
            LutName::Globow => "GLOBOW",
            LutName::GradedFire => "GRADEDFIRE",
            LutName::InstAlert => "INSTALERT",
            LutName::Spring => "SPRING",
            LutName::Summer => "SUMMER",
            LutName::Cool => "COOL",
            LutName::Hsv => "HSV",
            LutName::Pink => "PINK",
            LutName::Hot => "HOT",
            LutName::Magma => "MAGMA",
            LutName::Inferno => "INFERNO",
            LutName::Plasma => "PLASMA",
            LutName::Viridis => "VIRIDIS",
            LutName::Cividis => "CIVIDIS",
            LutName::IsothermRed => "ISOTHERM_RED",
            LutName::IsothermGreen => "ISOTHERM_GREEN",
            LutName::IsothermBlue => "ISOTHERM_BLUE",
        }
    }

    /// Whether this is an isotherm (band overlay) table
    pub fn is_isotherm(&self) -> bool {
        self.isotherm_channel().is_some()
    }

    /// Highlight channel (0 = red, 1 = green, 2 = blue) for isotherm tables
    fn isotherm_channel(&self) -> Option<usize> {
        match self {
            LutName::IsothermRed => Some(0),
            LutName::IsothermGreen => Some(1),
            LutName::IsothermBlue => Some(2),
            _ => None,
        }
    }

    /// Color stops for standard tables
    fn stops(&self) -> Option<&'static [Stop]> {
        use gradients::*;
        let stops = match self {
            LutName::WhiteHot => BONE,
            LutName::BlackHot => JET,
            LutName::RedHot | LutName::Hot => HOT,
            LutName::Rainbow => RAINBOW,
            LutName::Ocean => OCEAN,
            LutName::Lava | LutName::Pink => PINK,
            LutName::Arctic => WINTER,
            LutName::Globow => PARULA,
            LutName::GradedFire => AUTUMN,
            LutName::InstAlert | LutName::Summer => SUMMER,
            LutName::Spring => SPRING,
            LutName::Cool => COOL,
            LutName::Hsv => HSV,
            LutName::Magma => MAGMA,
            LutName::Inferno => INFERNO,
            LutName::Plasma => PLASMA,
            LutName::Viridis => VIRIDIS,
            LutName::Cividis => CIVIDIS,
            LutName::IsothermRed | LutName::IsothermGreen | LutName::IsothermBlue => return None,
        };
        Some(stops)
    }
}

impl fmt::Display for LutName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LutName {
    type Err = UnknownLut;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        LutName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLut(s.to_string()))
    }
}

impl Serialize for LutName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LutName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Highlighted band of an isotherm table, as fractions of full scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsothermBand {
    pub start: f32,
    pub end: f32,
}

impl Default for IsothermBand {
    /// Top 32 of 256 levels
    fn default() -> Self {
        Self {
            start: 0.875,
            end: 1.0,
        }
    }
}

impl IsothermBand {
    /// Dark end of the highlight gradient
    pub const DARK: u8 = 64;
    /// Bright end of the highlight gradient
    pub const BRIGHT: u8 = 255;

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.start) && (0.0..=1.0).contains(&self.end) && self.start < self.end
    }

    /// Inclusive index range of the band in a table of `size` entries
    pub fn index_range(&self, size: usize) -> std::ops::RangeInclusive<usize> {
        let lo = ((self.start * size as f32).floor() as usize).min(size - 1);
        let hi = ((self.end * size as f32).ceil() as usize).clamp(lo + 1, size) - 1;
        lo..=hi
    }
}

/// One precomputed lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut {
    name: LutName,
    bit_depth: u8,
    table: Vec<[u8; 3]>,
}

impl Lut {
    /// Build a standard or isotherm table with `2^bit_depth` entries
    pub fn build(name: LutName, bit_depth: u8, band: IsothermBand) -> Self {
        let size = 1usize << bit_depth;
        let table = match (name.stops(), name.isotherm_channel()) {
            (Some(stops), _) => gradients::interpolate(stops, size),
            (None, Some(channel)) => isotherm_table(size, band, channel),
            (None, None) => unreachable!("every LUT is either standard or isotherm"),
        };
        Self {
            name,
            bit_depth,
            table,
        }
    }

    pub fn name(&self) -> LutName {
        self.name
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Number of entries (always `2^bit_depth`)
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn entries(&self) -> &[[u8; 3]] {
        &self.table
    }

    /// Color for a sample; samples past the end saturate to the last entry
    #[inline]
    pub fn color(&self, sample: u16) -> [u8; 3] {
        let idx = (sample as usize).min(self.table.len() - 1);
        self.table[idx]
    }
}

fn isotherm_table(size: usize, band: IsothermBand, channel: usize) -> Vec<[u8; 3]> {
    let max = (size - 1).max(1) as f32;
    let mut table: Vec<[u8; 3]> = (0..size)
        .map(|i| {
            let g = (i as f32 * 255.0 / max).round() as u8;
            [g, g, g]
        })
        .collect();

    let range = band.index_range(size);
    let (lo, hi) = (*range.start(), *range.end());
    let steps = hi - lo;
    for (j, entry) in table[lo..=hi].iter_mut().enumerate() {
        let value = if steps == 0 {
            IsothermBand::BRIGHT
        } else {
            let t = j as f32 / steps as f32;
            (IsothermBand::DARK as f32 + (IsothermBand::BRIGHT - IsothermBand::DARK) as f32 * t).round() as u8
        };
        *entry = [0, 0, 0];
        entry[channel] = value;
    }
    table
}

/// Process-wide set of precomputed LUTs
#[derive(Debug)]
pub struct ColorMapRegistry {
    bit_depth: u8,
    band: IsothermBand,
    luts: HashMap<LutName, Arc<Lut>>,
}

impl Default for ColorMapRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BIT_DEPTH, IsothermBand::default())
    }
}

impl ColorMapRegistry {
    /// Precompute every LUT at `bit_depth`
    pub fn new(bit_depth: u8, band: IsothermBand) -> Self {
        let bit_depth = bit_depth.clamp(1, MAX_BIT_DEPTH);
        let luts = LutName::ALL
            .into_iter()
            .map(|name| (name, Arc::new(Lut::build(name, bit_depth, band))))
            .collect();
        tracing::debug!(bit_depth, count = LutName::ALL.len(), "Precomputed colormap tables");
        Self {
            bit_depth,
            band,
            luts,
        }
    }

    /// Build from the `[colormap]` config section
    pub fn from_config(config: &crate::config::ColorMapConfig) -> Self {
        Self::new(config.bit_depth, config.isotherm_band())
    }

    /// Look up a LUT by (case-insensitive) name
    pub fn lookup(&self, name: &str) -> Result<Arc<Lut>, UnknownLut> {
        let name: LutName = name.parse()?;
        Ok(self.get(name))
    }

    /// Look up a LUT by typed name; the set is closed so this cannot fail
    pub fn get(&self, name: LutName) -> Arc<Lut> {
        Arc::clone(&self.luts[&name])
    }

    /// All LUT names, sorted for menus
    pub fn list(&self) -> Vec<LutName> {
        let mut names = LutName::ALL.to_vec();
        names.sort_by_key(|n| n.as_str());
        names
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn isotherm_band(&self) -> IsothermBand {
        self.band
    }
}
