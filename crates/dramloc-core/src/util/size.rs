use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Memory size representation supporting common units.
///
/// All units use binary (base-2) multipliers (1 KB = 1024 bytes).
/// Sizes parse from a number followed by an optional unit: `4096`, `4KB`, `64 GB`, `2m`.
///
/// # Examples
///
/// ```
/// use dramloc_core::util::Size;
///
/// let size: Size = "4KB".parse().unwrap();
/// assert_eq!(size.bytes(), 4096);
///
/// let step: Size = "64 GB".parse().unwrap();
/// assert_eq!(step.bytes(), 64 << 30);
///
/// assert_eq!("0x1000".parse::<Size>().unwrap().bytes(), 0x1000);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Size {
    /// Size in bytes
    B(u64),
    /// Size in kilobytes (1 KB = 1024 bytes)
    KB(u64),
    /// Size in megabytes (1 MB = 1024 KB)
    MB(u64),
    /// Size in gigabytes (1 GB = 1024 MB)
    GB(u64),
}

impl Size {
    /// Converts this size to bytes, saturating at `u64::MAX`.
    pub const fn bytes(&self) -> u64 {
        match self {
            Size::B(bytes) => *bytes,
            Size::KB(kb) => (*kb).saturating_mul(1 << 10),
            Size::MB(mb) => (*mb).saturating_mul(1 << 20),
            Size::GB(gb) => (*gb).saturating_mul(1 << 30),
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Size::B(bytes) => write!(f, "{} B", bytes),
            Size::KB(kb) => write!(f, "{} KB", kb),
            Size::MB(mb) => write!(f, "{} MB", mb),
            Size::GB(gb) => write!(f, "{} GB", gb),
        }
    }
}

/// Error returned when a [`Size`] cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseSizeError {
    /// The numeric part is missing or malformed
    #[error("invalid size number in {0:?}")]
    Number(String),
    /// The unit is not one of B, K(B), M(B), G(B)
    #[error("unknown size unit {0:?}")]
    Unit(String),
}

impl FromStr for Size {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (number, unit) = if let Some(hex) = s.strip_prefix("0x").or(s.strip_prefix("0X")) {
            (
                u64::from_str_radix(hex, 16).map_err(|_| ParseSizeError::Number(s.to_string()))?,
                "",
            )
        } else {
            let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
            let (digits, unit) = s.split_at(split);
            (
                digits
                    .parse()
                    .map_err(|_| ParseSizeError::Number(s.to_string()))?,
                unit.trim(),
            )
        };
        match unit.to_ascii_uppercase().as_str() {
            "" | "B" => Ok(Size::B(number)),
            "K" | "KB" => Ok(Size::KB(number)),
            "M" | "MB" => Ok(Size::MB(number)),
            "G" | "GB" => Ok(Size::GB(number)),
            _ => Err(ParseSizeError::Unit(unit.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseSizeError, Size};

    #[test]
    fn size_conversions() {
        assert_eq!(Size::B(12).bytes(), 12);
        assert_eq!(Size::MB(12).bytes(), 12 * (1 << 20));
        assert_eq!(Size::GB(64).bytes(), 64 * (1 << 30));
        assert_eq!(Size::GB(u64::MAX).bytes(), u64::MAX);
    }

    #[test]
    fn size_parsing() {
        assert_eq!("1".parse(), Ok(Size::B(1)));
        assert_eq!("4096B".parse(), Ok(Size::B(4096)));
        assert_eq!("4kb".parse(), Ok(Size::KB(4)));
        assert_eq!(" 2 MB ".parse(), Ok(Size::MB(2)));
        assert_eq!("64G".parse(), Ok(Size::GB(64)));
        assert_eq!("0x200000".parse(), Ok(Size::B(0x20_0000)));
        assert_eq!(
            "MB".parse::<Size>(),
            Err(ParseSizeError::Number("MB".to_string()))
        );
        assert_eq!(
            "4TB".parse::<Size>(),
            Err(ParseSizeError::Unit("TB".to_string()))
        );
    }
}
