use serde::{Deserialize, Serialize};

/// Number of risk categories the classifier predicts.
pub const CATEGORY_COUNT: usize = 4;

/// Discrete risk bucket of a credit score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; CATEGORY_COUNT] = [
        RiskCategory::Poor,
        RiskCategory::Fair,
        RiskCategory::Good,
        RiskCategory::Excellent,
    ];

    /// Upper (inclusive) bounds of Poor, Fair and Good.
    pub const THRESHOLDS: [f64; 3] = [550.0, 650.0, 750.0];

    /// Bin a score; each bucket includes its upper threshold.
    pub fn from_score(score: f64) -> Self {
        let idx = Self::THRESHOLDS
            .iter()
            .take_while(|&&t| score > t)
            .count();
        Self::ALL[idx]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Poor => "Poor",
            RiskCategory::Fair => "Fair",
            RiskCategory::Good => "Good",
            RiskCategory::Excellent => "Excellent",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_upper_inclusive() {
        assert_eq!(RiskCategory::from_score(300.0), RiskCategory::Poor);
        assert_eq!(RiskCategory::from_score(550.0), RiskCategory::Poor);
        assert_eq!(RiskCategory::from_score(550.5), RiskCategory::Fair);
        assert_eq!(RiskCategory::from_score(650.0), RiskCategory::Fair);
        assert_eq!(RiskCategory::from_score(750.0), RiskCategory::Good);
        assert_eq!(RiskCategory::from_score(751.0), RiskCategory::Excellent);
        assert_eq!(RiskCategory::from_score(850.0), RiskCategory::Excellent);
    }
}
