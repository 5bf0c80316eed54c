//! Plant registry for the KOEN generation-data portal.
//!
//! Canonical list of the plant org codes this service knows about, with
//! their names and unit counts. The registry only drives filter-validation
//! warnings and artifact-tag readability; the portal remains authoritative
//! for which codes exist, and unknown codes are passed through untouched.

// ---------------------------------------------------------------------------
// Plant metadata
// ---------------------------------------------------------------------------

/// Metadata for a single plant site on the portal.
pub struct Plant {
    /// 4-character portal org code, e.g. "84S1".
    pub org_code: &'static str,
    /// Korean site name as it appears in the station_name column.
    pub name: &'static str,
    /// Human-readable description of the site.
    pub description: &'static str,
    /// Number of units (호기) the site reports. Unit-range filters
    /// outside 1..=units return empty data from the portal.
    pub units: u8,
}

/// Plant sites known to report through the generation-data download page.
///
/// Sources: the portal's plant selector and previously collected files.
/// This list is deliberately not exhaustive; codes absent here are still
/// valid requests.
pub static PLANT_REGISTRY: &[Plant] = &[
    Plant {
        org_code: "84S1",
        name: "삼천포태양광",
        description: "Samcheonpo solar site, the portal's example code.",
        units: 2,
    },
    Plant {
        org_code: "84S2",
        name: "삼천포태양광2",
        description: "Second Samcheonpo solar array.",
        units: 1,
    },
    Plant {
        org_code: "85S1",
        name: "영흥태양광",
        description: "Yeongheung solar site on the west coast.",
        units: 3,
    },
    Plant {
        org_code: "86S1",
        name: "분당태양광",
        description: "Bundang rooftop solar arrays.",
        units: 1,
    },
    Plant {
        org_code: "87S1",
        name: "여수태양광",
        description: "Yeosu solar site.",
        units: 2,
    },
    Plant {
        org_code: "88S1",
        name: "영동태양광",
        description: "Yeongdong solar site on the converted coal plant grounds.",
        units: 2,
    },
];

/// Looks up a plant by org code. Returns `None` if not found.
pub fn find_plant(org_code: &str) -> Option<&'static Plant> {
    PLANT_REGISTRY.iter().find(|p| p.org_code == org_code)
}

/// Returns the org codes for all registered plants.
pub fn all_org_codes() -> Vec<&'static str> {
    PLANT_REGISTRY.iter().map(|p| p.org_code).collect()
}

/// Whether a code is in the registry. Used only to warn about likely
/// typos before spending a network round-trip.
pub fn is_known_code(org_code: &str) -> bool {
    find_plant(org_code).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_org_codes_are_valid_portal_format() {
        // Portal org codes are 4-character uppercase alphanumerics.
        // A malformed entry would silently return empty data.
        for plant in PLANT_REGISTRY {
            assert_eq!(
                plant.org_code.len(),
                4,
                "org code for '{}' should be 4 characters, got '{}'",
                plant.name,
                plant.org_code
            );
            assert!(
                plant
                    .org_code
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
                "org code for '{}' should be uppercase alphanumeric, got '{}'",
                plant.name,
                plant.org_code
            );
        }
    }

    #[test]
    fn test_no_duplicate_org_codes() {
        let mut seen = std::collections::HashSet::new();
        for plant in PLANT_REGISTRY {
            assert!(
                seen.insert(plant.org_code),
                "duplicate org code '{}' found in PLANT_REGISTRY",
                plant.org_code
            );
        }
    }

    #[test]
    fn test_find_plant_returns_correct_entry() {
        let plant = find_plant("84S1").expect("Samcheonpo should be in registry");
        assert_eq!(plant.org_code, "84S1");
        assert!(plant.name.contains("삼천포"));
    }

    #[test]
    fn test_find_plant_returns_none_for_unknown_code() {
        assert!(find_plant("ZZZZ").is_none());
        assert!(!is_known_code("ZZZZ"));
    }

    #[test]
    fn test_all_plants_report_at_least_one_unit() {
        for plant in PLANT_REGISTRY {
            assert!(
                plant.units >= 1,
                "plant '{}' must report at least one unit",
                plant.name
            );
        }
    }

    #[test]
    fn test_all_org_codes_helper_matches_registry_length() {
        assert_eq!(all_org_codes().len(), PLANT_REGISTRY.len());
    }
}
