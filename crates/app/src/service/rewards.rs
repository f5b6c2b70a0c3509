//! Static material → GSEED reward table.
//!
//! The order of [`MATERIALS`] matches the detector's class ids, so the same
//! list doubles as the inference label set.

pub(crate) const MATERIALS: [&str; 8] = [
    "Plástico PET",
    "Plástico HDPE",
    "Vidrio",
    "Aluminio",
    "Cartón",
    "Papel",
    "Acero",
    "Tetra Pak",
];

/// GSEED amount paid for one deposit of `material`, or `None` if the
/// material is not accepted.
pub(crate) fn reward_for(material: &str) -> Option<f64> {
    match material {
        "Plástico PET" => Some(2.00),
        "Plástico HDPE" => Some(1.80),
        "Vidrio" => Some(1.50),
        "Aluminio" => Some(3.00),
        "Cartón" => Some(1.00),
        "Papel" => Some(0.80),
        "Acero" => Some(2.50),
        "Tetra Pak" => Some(1.20),
        _ => None,
    }
}

pub(crate) fn material_labels() -> Vec<String> {
    MATERIALS.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_values_are_exact() {
        assert_eq!(reward_for("Aluminio"), Some(3.00));
        assert_eq!(reward_for("Papel"), Some(0.80));
        assert_eq!(reward_for("Tetra Pak"), Some(1.20));
    }

    #[test]
    fn unknown_materials_have_no_reward() {
        assert_eq!(reward_for("Unknown"), None);
        assert_eq!(reward_for(""), None);
        assert_eq!(reward_for("aluminio"), None);
    }

    #[test]
    fn every_label_has_a_reward() {
        for material in MATERIALS {
            assert!(reward_for(material).is_some(), "no reward for {material}");
        }
    }
}
