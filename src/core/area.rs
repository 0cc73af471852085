use serde::{Deserialize, Serialize};

/// Life area a goal belongs to.
///
/// Rows written by earlier clients carry the Portuguese names, so those stay the
/// wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifeArea {
    #[serde(rename = "Casamento")]
    Marriage,
    #[serde(rename = "Trabalho")]
    Work,
    #[serde(rename = "Espiritual")]
    Spiritual,
    #[serde(rename = "Saúde")]
    Health,
    #[serde(rename = "Financeiro")]
    Finance,
    #[serde(rename = "Casa")]
    Home,
}

/// Display metadata for one area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaInfo {
    pub area: LifeArea,
    pub label: &'static str,
    pub wire: &'static str,
    pub icon: &'static str,
    pub weight: u8,
}

const AREA_TABLE: [AreaInfo; 6] = [
    AreaInfo { area: LifeArea::Marriage, label: "Marriage", wire: "Casamento", icon: "♥", weight: 0 },
    AreaInfo { area: LifeArea::Work, label: "Work", wire: "Trabalho", icon: "💼", weight: 1 },
    AreaInfo { area: LifeArea::Spiritual, label: "Spiritual", wire: "Espiritual", icon: "✝", weight: 2 },
    AreaInfo { area: LifeArea::Health, label: "Health", wire: "Saúde", icon: "💪", weight: 3 },
    AreaInfo { area: LifeArea::Finance, label: "Finance", wire: "Financeiro", icon: "$", weight: 4 },
    AreaInfo { area: LifeArea::Home, label: "Home", wire: "Casa", icon: "⌂", weight: 5 },
];

impl LifeArea {
    pub const ALL: [LifeArea; 6] = [
        Self::Marriage,
        Self::Work,
        Self::Spiritual,
        Self::Health,
        Self::Finance,
        Self::Home,
    ];

    pub fn info(&self) -> &'static AreaInfo {
        // The table is ordered like the enum.
        &AREA_TABLE[*self as usize]
    }

    pub fn label(&self) -> &'static str {
        self.info().label
    }

    pub fn icon(&self) -> &'static str {
        self.info().icon
    }

    pub fn as_wire(&self) -> &'static str {
        self.info().wire
    }

    /// Accepts either the English label or the wire name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        AREA_TABLE
            .iter()
            .find(|info| info.label.eq_ignore_ascii_case(s) || info.wire.to_lowercase() == s.to_lowercase())
            .map(|info| info.area)
    }
}

impl std::fmt::Display for LifeArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Area filter used by the goals view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaFilter {
    #[default]
    All,
    Only(LifeArea),
}

impl AreaFilter {
    pub fn matches(&self, area: LifeArea) -> bool {
        match self {
            Self::All => true,
            Self::Only(a) => *a == area,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        LifeArea::parse(s).map(Self::Only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_enum_order() {
        for area in LifeArea::ALL {
            assert_eq!(area.info().area, area);
        }
    }

    #[test]
    fn parse_accepts_label_and_wire_name() {
        assert_eq!(LifeArea::parse("work"), Some(LifeArea::Work));
        assert_eq!(LifeArea::parse("Trabalho"), Some(LifeArea::Work));
        assert_eq!(LifeArea::parse("SAÚDE"), Some(LifeArea::Health));
        assert_eq!(LifeArea::parse("garden"), None);
    }

    #[test]
    fn serializes_to_wire_name() {
        let json = serde_json::to_string(&LifeArea::Health).unwrap();
        assert_eq!(json, "\"Saúde\"");
        let back: LifeArea = serde_json::from_str("\"Casa\"").unwrap();
        assert_eq!(back, LifeArea::Home);
    }

    #[test]
    fn filter_all_matches_everything() {
        assert!(LifeArea::ALL.iter().all(|a| AreaFilter::All.matches(*a)));
        assert!(!AreaFilter::Only(LifeArea::Work).matches(LifeArea::Home));
        assert_eq!(AreaFilter::parse("ALL"), Some(AreaFilter::All));
    }
}
