//! Human-facing order numbers.
//!
//! Originals are written `P<n>-0`; the k-th renewal in the same family is
//! `P<n>-0-R<k>`. The family sequence `n` and renewal index `k` are stored
//! separately so the ledger can take maxima without string parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderId {
    sequence: u64,
    renewal: u32,
}

impl OrderId {
    /// First order of a new family.
    pub fn original(sequence: u64) -> Self {
        Self {
            sequence,
            renewal: 0,
        }
    }

    pub fn renewal_of(sequence: u64, renewal: u32) -> Self {
        Self { sequence, renewal }
    }

    /// Fresh original numbered after the highest one in the ledger.
    pub fn next_original(highest: Option<u64>) -> Self {
        Self::original(highest.map_or(1, |n| n + 1))
    }

    /// Next renewal in this family given the highest renewal index seen.
    pub fn next_renewal(&self, highest_renewal: u32) -> Self {
        Self {
            sequence: self.sequence,
            renewal: highest_renewal.max(self.renewal) + 1,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn renewal(&self) -> u32 {
        self.renewal
    }

    pub fn is_renewal(&self) -> bool {
        self.renewal > 0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.renewal == 0 {
            write!(f, "P{}-0", self.sequence)
        } else {
            write!(f, "P{}-0-R{}", self.sequence, self.renewal)
        }
    }
}

impl FromStr for OrderId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::invalid_format("orderId", reason);

        let rest = s.strip_prefix('P').ok_or_else(|| invalid("missing 'P' prefix"))?;
        let (sequence, suffix) = rest
            .split_once("-0")
            .ok_or_else(|| invalid("missing '-0' segment"))?;
        if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("sequence must be decimal digits"));
        }
        let sequence: u64 = sequence.parse().map_err(|_| invalid("sequence overflow"))?;

        let renewal = match suffix {
            "" => 0,
            tail => {
                let k = tail
                    .strip_prefix("-R")
                    .ok_or_else(|| invalid("unexpected trailing characters"))?;
                if k.is_empty() || !k.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("renewal index must be decimal digits"));
                }
                let k: u32 = k.parse().map_err(|_| invalid("renewal index overflow"))?;
                if k == 0 {
                    return Err(invalid("renewal index starts at 1"));
                }
                k
            }
        };

        Ok(Self { sequence, renewal })
    }
}

impl Serialize for OrderId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
