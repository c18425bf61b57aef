use std::str::FromStr;

use crate::error::{Error, Result};

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Capacity policy composed into a storage provider.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Quota {
    #[default]
    Unlimited,
    /// Total stored bytes must stay below `max_bytes`.
    Fixed { max_bytes: u64 },
    /// Stored bytes divided by device capacity must stay below `max_fraction`.
    Percentage { max_fraction: f64 },
}

impl Quota {
    /// Parses `"NN%"` or `"<number>[B|KB|MB|GB]"`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Config("quota cannot be empty".to_string()));
        }

        if let Some(percent) = value.strip_suffix('%') {
            let percent: f64 = percent
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid quota percentage: {value}")))?;
            let max_fraction = percent / 100.0;
            if !(max_fraction > 0.0 && max_fraction <= 1.0) {
                return Err(Error::Config(format!(
                    "quota percentage must be within (0%, 100%]: {value}"
                )));
            }
            return Ok(Self::Percentage { max_fraction });
        }

        let upper = value.to_ascii_uppercase();
        let (digits, multiplier) = [("GB", GB), ("MB", MB), ("KB", KB), ("B", 1)]
            .iter()
            .find_map(|(unit, multiplier)| {
                upper.strip_suffix(unit).map(|digits| (digits, *multiplier))
            })
            .unwrap_or((upper.as_str(), 1));

        let amount: u64 = digits
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid quota size: {value}")))?;

        let max_bytes = amount
            .checked_mul(multiplier)
            .ok_or_else(|| Error::Config(format!("quota size overflows: {value}")))?;

        Ok(Self::Fixed { max_bytes })
    }

    #[must_use]
    pub fn needs_device_capacity(&self) -> bool {
        matches!(self, Self::Percentage { .. })
    }

    /// Returns true if `incoming` more bytes fit on top of `usage`.
    /// `device_capacity` is only consulted by percentage quotas.
    #[must_use]
    pub fn permits(&self, usage: u64, incoming: u64, device_capacity: u64) -> bool {
        let total = usage.saturating_add(incoming);
        match *self {
            Self::Unlimited => true,
            Self::Fixed { max_bytes } => total < max_bytes,
            Self::Percentage { max_fraction } => {
                if device_capacity == 0 {
                    return false;
                }
                (total as f64) / (device_capacity as f64) < max_fraction
            }
        }
    }
}

impl FromStr for Quota {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
