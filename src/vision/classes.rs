use std::collections::BTreeMap;

use super::inference::Prediction;

/// Every class the ripeness and leaf-disease models are known to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionClass {
    // Ripeness
    Ripe,
    Unripe,
    Overripe,
    Damaged,
    Tomato,
    Pineapple,
    Banana,
    Kurma,
    Ajwa,
    Amber,
    Mazafati,
    Medjol,
    Rutab,
    Sukari,
    Mango,
    Matang,
    Mentah,
    Busuk,
    // Leaf disease
    Healthy,
    EarlyBlight,
    LateBlight,
    LeafMold,
    CommonRust,
    GrayLeafSpot,
    Blight,
    BacterialBlight,
    Blast,
    BrownSpot,
    Cbb,
    Cbsd,
    Cgm,
    Cmd,
    Unknown,
}

impl DetectionClass {
    /// Case-insensitive; underscores count as spaces.
    pub fn parse(class: &str) -> Self {
        let key = class.trim().to_lowercase().replace('_', " ");
        match key.as_str() {
            "ripe" => Self::Ripe,
            "unripe" => Self::Unripe,
            "overripe" => Self::Overripe,
            "damaged" => Self::Damaged,
            "tomato" => Self::Tomato,
            "pineapple" => Self::Pineapple,
            "banana" => Self::Banana,
            "kurma" => Self::Kurma,
            "ajwa" => Self::Ajwa,
            "amber" => Self::Amber,
            "mazafati" => Self::Mazafati,
            "medjol" => Self::Medjol,
            "rutab" => Self::Rutab,
            "sukari" => Self::Sukari,
            "mango" => Self::Mango,
            "matang" => Self::Matang,
            "mentah" => Self::Mentah,
            "busuk" => Self::Busuk,
            "healthy" => Self::Healthy,
            "early blight" => Self::EarlyBlight,
            "late blight" => Self::LateBlight,
            "leaf mold" => Self::LeafMold,
            "common rust" => Self::CommonRust,
            "gray leaf spot" => Self::GrayLeafSpot,
            "blight" => Self::Blight,
            "bacterial blight" => Self::BacterialBlight,
            "blast" => Self::Blast,
            "brown spot" => Self::BrownSpot,
            "cbb" => Self::Cbb,
            "cbsd" => Self::Cbsd,
            "cgm" => Self::Cgm,
            "cmd" => Self::Cmd,
            _ => Self::Unknown,
        }
    }

    /// Box and label colour.
    pub fn color(self) -> &'static str {
        match self {
            Self::Ripe | Self::Matang | Self::Healthy => "#22c55e",
            Self::Unripe | Self::Banana | Self::Amber | Self::CommonRust => "#f59e0b",
            Self::Overripe | Self::Busuk | Self::LateBlight | Self::Cbsd => "#ef4444",
            Self::Damaged => "#8b5cf6",
            Self::Pineapple => "#10b981",
            Self::Kurma | Self::Medjol | Self::Mango | Self::EarlyBlight | Self::Cbb => "#fb923c",
            Self::Ajwa | Self::LeafMold | Self::Cmd => "#9333ea",
            Self::Mazafati | Self::GrayLeafSpot => "#6b7280",
            Self::Rutab | Self::Mentah | Self::BacterialBlight | Self::Cgm => "#eab308",
            Self::Sukari | Self::Blight => "#f43f5e",
            Self::Blast => "#dc2626",
            Self::BrownSpot => "#ea580c",
            Self::Tomato | Self::Unknown => "#3b82f6",
        }
    }
}

/// Number of predictions per lower-cased class.
pub fn class_counts(predictions: &[Prediction]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for p in predictions {
        *counts.entry(p.class.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_underscores() {
        assert_eq!(DetectionClass::parse("Ripe"), DetectionClass::Ripe);
        assert_eq!(DetectionClass::parse("Gray_Leaf_Spot"), DetectionClass::GrayLeafSpot);
        assert_eq!(DetectionClass::parse("early blight").color(), "#fb923c");
    }

    #[test]
    fn unknown_class_falls_back_to_blue() {
        let class = DetectionClass::parse("dragonfruit");
        assert_eq!(class, DetectionClass::Unknown);
        assert_eq!(class.color(), "#3b82f6");
    }

    #[test]
    fn counts_are_case_insensitive() {
        let p = |class: &str| Prediction { class: class.to_owned(), confidence: 0.9, x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
        let counts = class_counts(&[p("Ripe"), p("ripe"), p("Unripe")]);
        assert_eq!(counts.get("ripe"), Some(&2));
        assert_eq!(counts.get("unripe"), Some(&1));
    }
}
