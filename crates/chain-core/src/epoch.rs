// chain-core/src/epoch.rs

//! Protocol epochs and the height → epoch oracle.
//!
//! Epochs are totally ordered. The schedule maps a monotonically increasing
//! block height to the epoch active at that height; it is supplied by the
//! block-production side and never consults a wall clock.

use crate::{types::BlockNumber, ChainError, ChainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol epoch identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EpochId {
    Epoch20,
    Epoch2_05,
    Epoch21,
    Epoch22,
    Epoch23,
    Epoch24,
    Epoch25,
    Epoch30,
}

impl EpochId {
    /// All epochs in activation order
    pub const ALL: [EpochId; 8] = [
        EpochId::Epoch20,
        EpochId::Epoch2_05,
        EpochId::Epoch21,
        EpochId::Epoch22,
        EpochId::Epoch23,
        EpochId::Epoch24,
        EpochId::Epoch25,
        EpochId::Epoch30,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EpochId::Epoch20 => "2.0",
            EpochId::Epoch2_05 => "2.05",
            EpochId::Epoch21 => "2.1",
            EpochId::Epoch22 => "2.2",
            EpochId::Epoch23 => "2.3",
            EpochId::Epoch24 => "2.4",
            EpochId::Epoch25 => "2.5",
            EpochId::Epoch30 => "3.0",
        }
    }

    /// Latest known epoch
    pub fn latest() -> Self {
        EpochId::Epoch30
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpochId {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EpochId::ALL
            .iter()
            .copied()
            .find(|epoch| epoch.as_str() == s.trim())
            .ok_or_else(|| ChainError::UnknownEpoch(s.to_string()))
    }
}

impl From<EpochId> for String {
    fn from(epoch: EpochId) -> Self {
        epoch.as_str().to_string()
    }
}

impl TryFrom<String> for EpochId {
    type Error = ChainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// First block height at which an epoch is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochBoundary {
    pub start_height: BlockNumber,
    pub epoch: EpochId,
}

/// Height → epoch schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<EpochBoundary>", into = "Vec<EpochBoundary>")]
pub struct EpochSchedule {
    boundaries: Vec<EpochBoundary>,
}

impl EpochSchedule {
    /// Build a schedule; heights and epochs must both be strictly increasing
    /// and the first boundary must start at height 0.
    pub fn new(boundaries: Vec<EpochBoundary>) -> ChainResult<Self> {
        let first = boundaries
            .first()
            .ok_or_else(|| ChainError::InvalidSchedule("schedule is empty".into()))?;
        if first.start_height != 0 {
            return Err(ChainError::InvalidSchedule(format!(
                "first epoch {} must start at height 0, not {}",
                first.epoch, first.start_height
            )));
        }

        for pair in boundaries.windows(2) {
            if pair[1].start_height <= pair[0].start_height {
                return Err(ChainError::InvalidSchedule(format!(
                    "epoch {} starts at {} which is not after {}",
                    pair[1].epoch, pair[1].start_height, pair[0].start_height
                )));
            }
            if pair[1].epoch <= pair[0].epoch {
                return Err(ChainError::InvalidSchedule(format!(
                    "epoch {} listed after {}",
                    pair[1].epoch, pair[0].epoch
                )));
            }
        }

        Ok(Self { boundaries })
    }

    /// Schedule with every epoch active from a single height on
    pub fn fixed(epoch: EpochId) -> Self {
        Self {
            boundaries: vec![EpochBoundary { start_height: 0, epoch }],
        }
    }

    /// Epoch active at `height`
    pub fn epoch_at(&self, height: BlockNumber) -> EpochId {
        self.boundaries
            .iter()
            .rev()
            .find(|b| b.start_height <= height)
            .map(|b| b.epoch)
            .unwrap_or(self.boundaries[0].epoch)
    }

    /// First height at which `epoch` is active, if scheduled
    pub fn start_of(&self, epoch: EpochId) -> Option<BlockNumber> {
        self.boundaries
            .iter()
            .find(|b| b.epoch == epoch)
            .map(|b| b.start_height)
    }

    pub fn boundaries(&self) -> &[EpochBoundary] {
        &self.boundaries
    }
}

impl Default for EpochSchedule {
    /// One epoch every 100 blocks, 2.0 at genesis
    fn default() -> Self {
        let boundaries = EpochId::ALL
            .iter()
            .enumerate()
            .map(|(i, epoch)| EpochBoundary {
                start_height: i as BlockNumber * 100,
                epoch: *epoch,
            })
            .collect();
        Self { boundaries }
    }
}

impl TryFrom<Vec<EpochBoundary>> for EpochSchedule {
    type Error = ChainError;

    fn try_from(boundaries: Vec<EpochBoundary>) -> Result<Self, Self::Error> {
        Self::new(boundaries)
    }
}

impl From<EpochSchedule> for Vec<EpochBoundary> {
    fn from(schedule: EpochSchedule) -> Self {
        schedule.boundaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_ordering() {
        assert!(EpochId::Epoch2_05 < EpochId::Epoch21);
        assert!(EpochId::Epoch24 > EpochId::Epoch23);
        assert_eq!(EpochId::latest(), EpochId::Epoch30);
    }

    #[test]
    fn test_epoch_parse_roundtrip() {
        for epoch in EpochId::ALL {
            assert_eq!(epoch.to_string().parse::<EpochId>().unwrap(), epoch);
        }
        assert!("1.9".parse::<EpochId>().is_err());
    }

    #[test]
    fn test_epoch_serde_as_string() {
        let json = serde_json::to_string(&EpochId::Epoch2_05).unwrap();
        assert_eq!(json, "\"2.05\"");
        let back: EpochId = serde_json::from_str("\"2.4\"").unwrap();
        assert_eq!(back, EpochId::Epoch24);
    }

    #[test]
    fn test_default_schedule() {
        let schedule = EpochSchedule::default();
        assert_eq!(schedule.epoch_at(0), EpochId::Epoch20);
        assert_eq!(schedule.epoch_at(99), EpochId::Epoch20);
        assert_eq!(schedule.epoch_at(100), EpochId::Epoch2_05);
        assert_eq!(schedule.epoch_at(250), EpochId::Epoch21);
        assert_eq!(schedule.epoch_at(10_000), EpochId::Epoch30);
        assert_eq!(schedule.start_of(EpochId::Epoch24), Some(500));
    }

    #[test]
    fn test_schedule_validation() {
        let bad_start = vec![EpochBoundary { start_height: 5, epoch: EpochId::Epoch20 }];
        assert!(EpochSchedule::new(bad_start).is_err());

        let out_of_order = vec![
            EpochBoundary { start_height: 0, epoch: EpochId::Epoch21 },
            EpochBoundary { start_height: 10, epoch: EpochId::Epoch2_05 },
        ];
        assert!(EpochSchedule::new(out_of_order).is_err());

        assert!(EpochSchedule::new(vec![]).is_err());
    }
}
