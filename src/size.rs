//! Target image size parsing and clamping to provider bounds.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Smallest pixel area the provider accepts.
pub const MIN_PIXELS: u64 = 3_686_400;

/// Largest width or height the provider accepts.
pub const MAX_SIDE: u32 = 8192;

/// Used when the configured size is malformed or too small.
pub const DEFAULT_SIZE: ImageSize = ImageSize { width: 1920, height: 1920 };

/// Used when a configured side exceeds [`MAX_SIDE`].
pub const OVERSIZE_FALLBACK: ImageSize = ImageSize { width: 4096, height: 4096 };

static SIZE_RE: OnceLock<Regex> = OnceLock::new();

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Total number of pixels.
    #[must_use]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A usable size plus the reason it differs from the input, if it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeResolution {
    /// The size to send to the provider.
    pub size: ImageSize,
    /// Set when the configured value was replaced.
    pub warning: Option<String>,
}

/// Resolve a `"WxH"` string into a size the provider will accept.
///
/// Never fails: malformed or out-of-bounds input is replaced by a known-good
/// default and a warning describing the substitution.
#[must_use]
pub fn resolve_size(raw: &str) -> SizeResolution {
    let raw = raw.trim();
    let re = SIZE_RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+)$").expect("size pattern is valid"));

    let parsed = re.captures(raw).and_then(|caps| {
        let width = caps[1].parse::<u32>().ok()?;
        let height = caps[2].parse::<u32>().ok()?;
        Some(ImageSize { width, height })
    });

    let Some(size) = parsed else {
        return fallback(
            DEFAULT_SIZE,
            format!("image size '{raw}' is not in WxH form, using {DEFAULT_SIZE}"),
        );
    };

    if size.width > MAX_SIDE || size.height > MAX_SIDE {
        return fallback(
            OVERSIZE_FALLBACK,
            format!("image size {size} exceeds {MAX_SIDE}px per side, using {OVERSIZE_FALLBACK}"),
        );
    }

    if size.area() < MIN_PIXELS {
        return fallback(
            DEFAULT_SIZE,
            format!("image size {size} is below {MIN_PIXELS} pixels, using {DEFAULT_SIZE}"),
        );
    }

    SizeResolution { size, warning: None }
}

fn fallback(size: ImageSize, warning: String) -> SizeResolution {
    SizeResolution { size, warning: Some(warning) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_size() {
        let r = resolve_size("2048x2048");
        assert_eq!(r.size, ImageSize { width: 2048, height: 2048 });
        assert!(r.warning.is_none());
    }

    #[test]
    fn accepts_exact_minimum_area() {
        let r = resolve_size("1920x1920");
        assert_eq!(r.size, DEFAULT_SIZE);
        assert!(r.warning.is_none());
    }

    #[test]
    fn malformed_strings_fall_back_with_warning() {
        for raw in ["", "big", "1920*1920", "1920x", "x1920", "-5x10", "1920 x 1920", "99999999999x2"] {
            let r = resolve_size(raw);
            assert_eq!(r.size, DEFAULT_SIZE, "input {raw:?}");
            assert!(r.warning.is_some(), "input {raw:?}");
        }
    }

    #[test]
    fn small_area_falls_back_to_default() {
        for raw in ["1024x1024", "1920x1919", "0x0", "4000x1"] {
            let r = resolve_size(raw);
            assert_eq!(r.size, DEFAULT_SIZE, "input {raw:?}");
            assert!(r.warning.is_some());
        }
    }

    #[test]
    fn oversized_side_falls_back() {
        for raw in ["8193x4096", "4096x9000", "10000x10000"] {
            let r = resolve_size(raw);
            assert_eq!(r.size, OVERSIZE_FALLBACK, "input {raw:?}");
            assert!(r.warning.is_some());
        }
    }

    #[test]
    fn max_side_is_inclusive() {
        let r = resolve_size("8192x1024");
        assert_eq!(r.size, ImageSize { width: 8192, height: 1024 });
        assert!(r.warning.is_none());
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(ImageSize { width: 2560, height: 1440 }.to_string(), "2560x1440");
    }
}
