use thiserror::Error;
use tracing::warn;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const BYTES_PER_MIB: i128 = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("no digits in quantity {0:?}")]
    MissingDigits(String),
    #[error("unknown suffix {suffix:?} in quantity {raw:?}")]
    UnknownSuffix { raw: String, suffix: String },
}

/// A quantity decomposed as `mantissa * 10^exp10 * 1024^exp1024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedQuantity {
    mantissa: i128,
    exp10: i32,
    exp1024: u32,
}

impl ParsedQuantity {
    pub fn parse(raw: &str) -> Result<Self, QuantityError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, rest) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let mut mantissa: i128 = 0;
        let mut exp10: i32 = 0;
        let mut digits = 0usize;
        let mut seen_point = false;
        let mut end = rest.len();

        for (i, c) in rest.char_indices() {
            match c {
                '0'..='9' => {
                    digits += 1;
                    let d = (c as u8 - b'0') as i128;
                    match mantissa.checked_mul(10).and_then(|m| m.checked_add(d)) {
                        Some(m) => {
                            mantissa = m;
                            if seen_point {
                                exp10 -= 1;
                            }
                        }
                        // Precision beyond i128 is dropped; integer digits still scale.
                        None if !seen_point => exp10 += 1,
                        None => {}
                    }
                }
                '.' if !seen_point => seen_point = true,
                _ => {
                    end = i;
                    break;
                }
            }
        }

        if digits == 0 {
            return Err(QuantityError::MissingDigits(raw.to_string()));
        }

        let suffix = &rest[end..];
        let (suffix_exp10, exp1024) = parse_suffix(suffix).ok_or_else(|| {
            QuantityError::UnknownSuffix {
                raw: raw.to_string(),
                suffix: suffix.to_string(),
            }
        })?;

        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            exp10: exp10.saturating_add(suffix_exp10),
            exp1024,
        })
    }

    /// Returns `ceil(value * factor)`, clamped to `0..=i64::MAX`.
    pub fn scaled_ceil(&self, factor: i128) -> i64 {
        if self.mantissa <= 0 || factor <= 0 {
            return 0;
        }

        let mut n = self.mantissa.saturating_mul(factor);
        for _ in 0..self.exp1024 {
            n = n.saturating_mul(1024);
        }

        if self.exp10 >= 0 {
            for _ in 0..self.exp10 {
                n = n.saturating_mul(10);
                if n == i128::MAX {
                    break;
                }
            }
        } else {
            let shift = self.exp10.unsigned_abs();
            n = match 10i128.checked_pow(shift) {
                Some(div) => n / div + i128::from(n % div != 0),
                // Divisor exceeds any representable numerator.
                None => 1,
            };
        }

        i64::try_from(n).unwrap_or(i64::MAX)
    }
}

fn parse_suffix(suffix: &str) -> Option<(i32, u32)> {
    let parsed = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 1),
        "Mi" => (0, 2),
        "Gi" => (0, 3),
        "Ti" => (0, 4),
        "Pi" => (0, 5),
        "Ei" => (0, 6),
        s if s.starts_with(['e', 'E']) => (s[1..].parse::<i32>().ok()?, 0),
        _ => return None,
    };
    Some(parsed)
}

fn normalize(q: Option<&Quantity>, convert: impl FnOnce(&ParsedQuantity) -> i64) -> i64 {
    let Some(q) = q else {
        return 0;
    };
    match ParsedQuantity::parse(&q.0) {
        Ok(parsed) => convert(&parsed),
        Err(QuantityError::Empty) => 0,
        Err(e) => {
            warn!("treating unparseable quantity as zero: {}", e);
            0
        }
    }
}

/// CPU in milli-cores, rounded up. Absent or invalid quantities are zero.
pub fn cpu_millis(q: Option<&Quantity>) -> i64 {
    normalize(q, |p| p.scaled_ceil(1000))
}

/// Memory in MiB. Bytes are rounded up first, then any sub-MiB remainder is truncated.
pub fn memory_mib(q: Option<&Quantity>) -> i64 {
    normalize(q, |p| (i128::from(p.scaled_ceil(1)) / BYTES_PER_MIB) as i64)
}
