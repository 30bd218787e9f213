//! Pixel size resolution for providers.
//!
//! Providers that accept an explicit `width x height` get a size from
//! [`resolve`], which keeps the requested ratio while staying inside the
//! provider's pixel budget. Providers with a fixed menu of sizes use
//! [`lookup_bucket`], and providers that only take a ratio label use
//! [`nearest_named_ratio`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AspectRatio, QualityTier};

/// Pixel budget and rounding rules of one provider model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraints {
    pub min_pixels: u64,
    pub max_pixels: u64,
    /// Both dimensions are multiples of this.
    pub unit: u32,
}

impl SizeConstraints {
    pub const fn new(min_pixels: u64, max_pixels: u64, unit: u32) -> Self {
        Self {
            min_pixels,
            max_pixels,
            unit,
        }
    }

    pub fn contains(&self, size: ResolvedSize) -> bool {
        let pixels = size.pixels();
        pixels >= self.min_pixels
            && pixels <= self.max_pixels
            && size.width % self.unit == 0
            && size.height % self.unit == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedSize {
    pub width: u32,
    pub height: u32,
}

impl ResolvedSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// `1664*928` style, for APIs that do not use `x`.
    pub fn to_string_with(&self, separator: &str) -> String {
        format!("{}{}{}", self.width, separator, self.height)
    }
}

impl fmt::Display for ResolvedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `"W:H"` where both sides are positive integers.
pub fn parse_ratio(raw: &str) -> Option<f64> {
    let (w, h) = raw.trim().split_once(':')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some(w as f64 / h as f64)
}

fn named_ratio(aspect: &AspectRatio) -> Option<f64> {
    let ratio = match aspect {
        AspectRatio::Square => 1.0,
        AspectRatio::Widescreen => 16.0 / 9.0,
        AspectRatio::Vertical => 9.0 / 16.0,
        AspectRatio::Standard => 4.0 / 3.0,
        AspectRatio::Portrait => 3.0 / 4.0,
        AspectRatio::Photo => 3.0 / 2.0,
        AspectRatio::PhotoPortrait => 2.0 / 3.0,
        AspectRatio::Ultrawide => 21.0 / 9.0,
        AspectRatio::Custom(raw) => match AspectRatio::parse(raw) {
            AspectRatio::Custom(_) => return None,
            named => return named_ratio(&named),
        },
    };
    Some(ratio)
}

/// Width / height for the requested ratio. Unparseable custom ratios fall
/// back to a square.
pub fn target_ratio(aspect: &AspectRatio) -> f64 {
    match aspect {
        AspectRatio::Custom(raw) => parse_ratio(raw)
            .or_else(|| named_ratio(aspect))
            .unwrap_or(1.0),
        named => named_ratio(named).unwrap_or(1.0),
    }
}

/// Computes a size whose area approximates the tier's pixel budget while
/// keeping the requested ratio, then snaps both sides to `constraints.unit`.
pub fn resolve(
    tier: QualityTier,
    aspect: &AspectRatio,
    constraints: SizeConstraints,
) -> ResolvedSize {
    let min = constraints.min_pixels as f64;
    let max = constraints.max_pixels as f64;
    let unit = constraints.unit.max(1);

    let budget = (tier.nominal_pixels() as f64).min(max);
    let ratio = target_ratio(aspect);

    let mut height = (budget / ratio).sqrt();
    let mut width = height * ratio;

    let area = width * height;
    if area > max {
        let scale = (max / area).sqrt();
        width *= scale;
        height *= scale;
    }

    let area = width * height;
    if area < min {
        let scale = (min / area).sqrt();
        width *= scale;
        height *= scale;
    }

    let mut size = ResolvedSize::new(round_to_unit(width, unit), round_to_unit(height, unit));

    while size.pixels() > constraints.max_pixels {
        if size.width >= size.height && size.width > unit {
            size.width -= unit;
        } else if size.height > unit {
            size.height -= unit;
        } else {
            break;
        }
    }

    // Rounding down can leave the area just under the minimum.
    if size.pixels() < constraints.min_pixels {
        if let Some(snapped) = snap_above_minimum(height, ratio, constraints) {
            size = snapped;
        }
    }

    log::debug!(
        "Resolved {} @ {} -> {} ({} px)",
        aspect,
        tier.as_str(),
        size,
        size.pixels()
    );
    size
}

fn round_to_unit(value: f64, unit: u32) -> u32 {
    let steps = (value / unit as f64).round().max(1.0);
    steps as u32 * unit
}

/// Searches the unit grid around `height` for the in-budget size
/// whose ratio is closest to the target.
fn snap_above_minimum(
    height: f64,
    ratio: f64,
    constraints: SizeConstraints,
) -> Option<ResolvedSize> {
    let unit = constraints.unit.max(1);
    let base = (height / unit as f64).floor() as i64;

    let mut best: Option<(f64, u64, ResolvedSize)> = None;
    for step in (base - 1)..=(base + 2) {
        if step < 1 {
            continue;
        }
        let h = step as u32 * unit;
        let ideal_w = h as f64 * ratio / unit as f64;
        for w_steps in [ideal_w.floor(), ideal_w.ceil()] {
            if w_steps < 1.0 {
                continue;
            }
            let candidate = ResolvedSize::new(w_steps as u32 * unit, h);
            if !constraints.contains(candidate) {
                continue;
            }
            let error = (candidate.ratio() - ratio).abs();
            let better = match &best {
                None => true,
                Some((best_error, best_pixels, _)) => {
                    error < *best_error || (error == *best_error && candidate.pixels() < *best_pixels)
                }
            };
            if better {
                best = Some((error, candidate.pixels(), candidate));
            }
        }
    }
    best.map(|(_, _, size)| size)
}

/// Picks a fixed size keyed by ratio label, or `default` when the ratio has no
/// entry.
pub fn lookup_bucket(
    aspect: &AspectRatio,
    table: &[(&str, ResolvedSize)],
    default: ResolvedSize,
) -> ResolvedSize {
    let label = aspect.label().trim();
    table
        .iter()
        .find(|(key, _)| *key == label)
        .map(|(_, size)| *size)
        .unwrap_or(default)
}

/// Chooses the supported ratio label closest to the requested ratio, comparing
/// in log space so 2:1 and 1:2 are equally far from 1:1.
pub fn nearest_named_ratio<'a>(aspect: &AspectRatio, supported: &[&'a str]) -> &'a str {
    let target = target_ratio(aspect).ln();
    supported
        .iter()
        .filter_map(|label| parse_ratio(label).map(|r| (*label, (r.ln() - target).abs())))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(label, _)| label)
        .unwrap_or("1:1")
}
