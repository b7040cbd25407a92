use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// How a stat is stored in game memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Float,
    Int,
    /// Computed from several fields rather than read directly
    Derived,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Display,
)]
pub enum PlayerStat {
    #[strum(serialize = "Speed")]
    Speed,
    #[strum(serialize = "Range")]
    Range,
    #[strum(serialize = "Tears")]
    TearsDelay,
    #[strum(serialize = "Shot Speed")]
    ShotSpeed,
    #[strum(serialize = "Damage")]
    Damage,
    #[strum(serialize = "Luck")]
    Luck,
    #[strum(serialize = "Deal Chance")]
    DealWithDevil,
}

impl PlayerStat {
    pub fn kind(&self) -> StatKind {
        match self {
            Self::TearsDelay => StatKind::Int,
            Self::DealWithDevil => StatKind::Derived,
            _ => StatKind::Float,
        }
    }

    pub fn label(&self) -> &'static str {
        self.into()
    }

    /// Whether a lower value is an improvement
    pub fn lower_is_better(&self) -> bool {
        matches!(self, Self::TearsDelay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kinds() {
        assert_eq!(PlayerStat::TearsDelay.kind(), StatKind::Int);
        assert_eq!(PlayerStat::DealWithDevil.kind(), StatKind::Derived);
        assert_eq!(PlayerStat::Damage.kind(), StatKind::Float);
    }

    #[test]
    fn test_iteration_order_matches_hud_order() {
        let stats: Vec<_> = PlayerStat::iter().collect();
        assert_eq!(stats.len(), 7);
        assert_eq!(stats[0], PlayerStat::Speed);
        assert_eq!(stats[6], PlayerStat::DealWithDevil);
    }

    #[test]
    fn test_label_round_trip() {
        assert_eq!(PlayerStat::ShotSpeed.label(), "Shot Speed");
        assert_eq!("Deal Chance".parse::<PlayerStat>().unwrap(), PlayerStat::DealWithDevil);
    }
}
