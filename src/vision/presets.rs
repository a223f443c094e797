use serde::Serialize;
use utoipa::ToSchema;

use super::Panel;

/// A hosted model the operator can pick instead of typing project/version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ModelPreset {
    #[schema(value_type = String)]
    pub key: &'static str,
    #[schema(value_type = String)]
    pub name: &'static str,
    #[schema(value_type = String)]
    pub project_id: &'static str,
    #[schema(value_type = String)]
    pub version: &'static str,
    #[schema(value_type = Vec<String>)]
    pub classes: &'static [&'static str],
    #[schema(value_type = String)]
    pub description: &'static str,
}

const FRUIT_PRESETS: &[ModelPreset] = &[
    ModelPreset {
        key: "tomato",
        name: "Tomato Ripeness",
        project_id: "tomato-oigp9",
        version: "1",
        classes: &["ripe", "unripe", "overripe", "damaged", "tomato"],
        description: "Tomato ripeness detection",
    },
    ModelPreset {
        key: "pineapple",
        name: "Pineapple Maturity",
        project_id: "pineapple-maturity-project",
        version: "4",
        classes: &["ripe", "unripe", "overripe"],
        description: "Pineapple maturity detection",
    },
    ModelPreset {
        key: "banana",
        name: "Banana Ripening",
        project_id: "banana-ripening-process",
        version: "2",
        classes: &["ripe", "unripe", "overripe"],
        description: "Banana ripeness detection",
    },
    ModelPreset {
        key: "kurma",
        name: "Date Palm Detection",
        project_id: "deteksi-jenis-kurma",
        version: "8",
        classes: &["Ajwa", "Amber", "Mazafati", "Medjol", "Rutab", "Sukari"],
        description: "Date variety detection",
    },
    ModelPreset {
        key: "mango",
        name: "Mango Indramayu",
        project_id: "mangga-indramayu",
        version: "1",
        classes: &["Matang", "Mentah", "Busuk"],
        description: "Indramayu mango ripeness detection",
    },
];

const LEAF_PRESETS: &[ModelPreset] = &[
    ModelPreset {
        key: "tomato",
        name: "Tomato Diseases",
        project_id: "leaf-tomato-0lvzm",
        version: "1",
        classes: &["Early Blight", "Late Blight", "Leaf Mold", "Healthy"],
        description: "Tomato leaf disease detection",
    },
    ModelPreset {
        key: "potato",
        name: "Potato Diseases",
        project_id: "potato-leaf-disease-3tpo3",
        version: "3",
        classes: &["Bacteria", "Fungi", "Healthy", "Nematode", "Pest", "Phytopthora", "Virus"],
        description: "Potato leaf disease detection (7 classes)",
    },
    ModelPreset {
        key: "cassava",
        name: "Cassava Diseases",
        project_id: "cassava-classification",
        version: "4",
        classes: &["CBB", "CBSD", "CGM", "CMD", "Healthy"],
        description: "Cassava leaf disease classification",
    },
    ModelPreset {
        key: "corn",
        name: "Corn Diseases",
        project_id: "dr.mangosteen",
        version: "1",
        classes: &["Blight", "Common_Rust", "Gray_Leaf_Spot", "Healthy"],
        description: "Corn leaf disease detection",
    },
];

pub fn presets(panel: Panel) -> &'static [ModelPreset] {
    match panel {
        Panel::Ripeness => FRUIT_PRESETS,
        Panel::LeafDisease => LEAF_PRESETS,
    }
}

pub fn find(panel: Panel, key: &str) -> Option<&'static ModelPreset> {
    presets(panel).iter().find(|p| p.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_panel() {
        assert_eq!(find(Panel::Ripeness, "banana").map(|p| p.project_id), Some("banana-ripening-process"));
        assert_eq!(find(Panel::LeafDisease, "corn").map(|p| p.version), Some("1"));
        assert!(find(Panel::Ripeness, "potato").is_none());
    }

    #[test]
    fn keys_are_unique_per_panel() {
        for panel in [Panel::Ripeness, Panel::LeafDisease] {
            let mut keys: Vec<_> = presets(panel).iter().map(|p| p.key).collect();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), presets(panel).len());
        }
    }
}
