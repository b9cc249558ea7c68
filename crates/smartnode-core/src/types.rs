use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::NodeError;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| NodeError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// MinipoolStatus
// ---------------------------------------------------------------------------

/// Lifecycle stage of a minipool.
///
/// Transitions only move forward: `Initialized → Prelaunch → Staking →
/// Withdrawable → Dissolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinipoolStatus {
    Initialized,
    Prelaunch,
    Staking,
    Withdrawable,
    Dissolved,
}

impl MinipoolStatus {
    pub fn all() -> &'static [MinipoolStatus] {
        &[
            MinipoolStatus::Initialized,
            MinipoolStatus::Prelaunch,
            MinipoolStatus::Staking,
            MinipoolStatus::Withdrawable,
            MinipoolStatus::Dissolved,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<MinipoolStatus> {
        Self::all().get(self.index() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MinipoolStatus::Initialized => "initialized",
            MinipoolStatus::Prelaunch => "prelaunch",
            MinipoolStatus::Staking => "staking",
            MinipoolStatus::Withdrawable => "withdrawable",
            MinipoolStatus::Dissolved => "dissolved",
        }
    }
}

impl fmt::Display for MinipoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MinipoolStatus {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| NodeError::UnknownStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Minipool
// ---------------------------------------------------------------------------

/// A minipool as observed during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minipool {
    pub address: Address,
    pub status: MinipoolStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1f9840a85d5af5bf1d1762f925bdaddc4201f984";

    #[test]
    fn address_parses_with_and_without_prefix() {
        let a: Address = ADDR.parse().unwrap();
        let b: Address = ADDR.trim_start_matches("0x").parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), ADDR);
    }

    #[test]
    fn address_display_is_lowercase() {
        let a: Address = "0x1F9840A85D5AF5BF1D1762F925BDADDC4201F984".parse().unwrap();
        assert_eq!(a.to_string(), ADDR);
    }

    #[test]
    fn address_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert!(matches!(err, NodeError::InvalidAddress(_)));
        assert!("0xzz9840a85d5af5bf1d1762f925bdaddc4201f984"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn address_serde_uses_hex_string() {
        let a: Address = ADDR.parse().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{ADDR}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn status_advances_forward_only() {
        assert_eq!(
            MinipoolStatus::Prelaunch.next(),
            Some(MinipoolStatus::Staking)
        );
        assert_eq!(MinipoolStatus::Dissolved.next(), None);
        assert!(MinipoolStatus::Dissolved.is_terminal());
        assert!(!MinipoolStatus::Initialized.is_terminal());
        for pair in MinipoolStatus::all().windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn status_from_str_is_case_insensitive() {
        assert_eq!(
            "Prelaunch".parse::<MinipoolStatus>().unwrap(),
            MinipoolStatus::Prelaunch
        );
        assert_eq!(
            "staking".parse::<MinipoolStatus>().unwrap(),
            MinipoolStatus::Staking
        );
        assert!(matches!(
            "staked".parse::<MinipoolStatus>(),
            Err(NodeError::UnknownStatus(_))
        ));
    }

    #[test]
    fn status_serde_snake_case() {
        let yaml = serde_yaml::to_string(&MinipoolStatus::Withdrawable).unwrap();
        assert_eq!(yaml.trim(), "withdrawable");
    }
}
