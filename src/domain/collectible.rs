use serde::{Deserialize, Serialize};
use std::fmt;

/// Rarity class of a collectible, ordered from most common to rarest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "S")]
    S,
}

impl Tier {
    pub const ALL: [Tier; 7] = [
        Tier::One,
        Tier::Two,
        Tier::Three,
        Tier::Four,
        Tier::Five,
        Tier::Six,
        Tier::S,
    ];

    /// Tiers that take part in the weighted draw (S is rolled separately)
    pub const WEIGHTED: [Tier; 6] = [
        Tier::One,
        Tier::Two,
        Tier::Three,
        Tier::Four,
        Tier::Five,
        Tier::Six,
    ];

    pub fn lowest() -> Tier {
        Tier::One
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::One => "1",
            Tier::Two => "2",
            Tier::Three => "3",
            Tier::Four => "4",
            Tier::Five => "5",
            Tier::Six => "6",
            Tier::S => "S",
        }
    }

    /// Copy cap assigned to a scarcity record when it is first created
    pub fn max_copies(&self) -> u32 {
        match self {
            Tier::One => 200,
            Tier::Two => 150,
            Tier::Three => 100,
            Tier::Four => 60,
            Tier::Five => 30,
            Tier::Six => 15,
            Tier::S => 5,
        }
    }

    /// Price floor for a copy of this tier
    pub fn base_price(&self) -> u64 {
        match self {
            Tier::One => 100,
            Tier::Two => 250,
            Tier::Three => 500,
            Tier::Four => 1_000,
            Tier::Five => 2_500,
            Tier::Six => 5_000,
            Tier::S => 15_000,
        }
    }

    /// Star string used in captions and card views
    pub fn stars(&self) -> String {
        match self {
            Tier::S => "🌟".repeat(7),
            other => "⭐".repeat(other.rank()),
        }
    }

    fn rank(&self) -> usize {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
            Tier::Four => 4,
            Tier::Five => 5,
            Tier::Six => 6,
            Tier::S => 7,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Tier {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_uppercase().as_str() {
            "1" => Ok(Tier::One),
            "2" => Ok(Tier::Two),
            "3" => Ok(Tier::Three),
            "4" => Ok(Tier::Four),
            "5" => Ok(Tier::Five),
            "6" => Ok(Tier::Six),
            "S" => Ok(Tier::S),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collectible {
    /// Stable key, e.g. "3-04521"
    pub id: String,
    pub tier: Tier,
    pub name: String,
    pub series: String,
    pub creator: String,
    /// Artwork reference (URL or path) handed to the transport
    pub image: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::One < Tier::Six);
        assert!(Tier::Six < Tier::S);
        assert_eq!(Tier::lowest(), Tier::One);
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!(Tier::try_from("s"), Ok(Tier::S));
        assert_eq!(Tier::try_from(" 4 "), Ok(Tier::Four));
        assert!(Tier::try_from("7").is_err());
    }

    #[test]
    fn test_tier_serde_uses_short_names() {
        let json = serde_json::to_string(&Tier::S).unwrap();
        assert_eq!(json, "\"S\"");
        let tier: Tier = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(tier, Tier::Three);
    }

    #[test]
    fn test_caps_shrink_with_tier() {
        let caps: Vec<u32> = Tier::ALL.iter().map(|t| t.max_copies()).collect();
        assert!(caps.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(Tier::One.max_copies(), 200);
    }
}
