//! Body Sensor Location characteristic parsing.

use crate::error::{Error, Result};

/// Where on the body the sensor is worn (characteristic `2A38`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BodySensorLocation {
    /// Other location.
    Other,
    /// Chest strap.
    Chest,
    /// Wrist.
    Wrist,
    /// Finger.
    Finger,
    /// Hand.
    Hand,
    /// Ear lobe.
    EarLobe,
    /// Foot.
    Foot,
    /// Reserved value.
    #[default]
    Unknown,
}

impl BodySensorLocation {
    /// Create from the raw characteristic value.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Other,
            1 => Self::Chest,
            2 => Self::Wrist,
            3 => Self::Finger,
            4 => Self::Hand,
            5 => Self::EarLobe,
            6 => Self::Foot,
            _ => Self::Unknown,
        }
    }

    /// Parse a characteristic read.
    pub fn parse(data: &[u8]) -> Result<Self> {
        data.first()
            .copied()
            .map(Self::from_raw)
            .ok_or_else(|| Error::MalformedPayload {
                context: "Empty body sensor location value".to_string(),
            })
    }
}

impl std::fmt::Display for BodySensorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other => write!(f, "Other"),
            Self::Chest => write!(f, "Chest"),
            Self::Wrist => write!(f, "Wrist"),
            Self::Finger => write!(f, "Finger"),
            Self::Hand => write!(f, "Hand"),
            Self::EarLobe => write!(f, "Ear Lobe"),
            Self::Foot => write!(f, "Foot"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        assert_eq!(BodySensorLocation::from_raw(1), BodySensorLocation::Chest);
        assert_eq!(BodySensorLocation::from_raw(6), BodySensorLocation::Foot);
        assert_eq!(BodySensorLocation::from_raw(7), BodySensorLocation::Unknown);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            BodySensorLocation::parse(&[0x02]).unwrap(),
            BodySensorLocation::Wrist
        );
        assert!(BodySensorLocation::parse(&[]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(BodySensorLocation::EarLobe.to_string(), "Ear Lobe");
    }
}
