//! Territory registry: named groups of municipalities analyzed as one unit.
//! Built once from configuration; read-only afterwards.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_geocode;

/// Territory as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryDefinition {
    pub id: u32,
    pub name: String,
    pub municipalities: Vec<String>,
}

impl TerritoryDefinition {
    pub fn new(id: u32, name: &str, municipalities: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            municipalities: municipalities.iter().map(|code| code.to_string()).collect(),
        }
    }
}

/// Owning territory of a municipality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerritoryRef {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct TerritoryRegistry {
    members: BTreeSet<String>,
    by_code: HashMap<String, TerritoryRef>,
}

impl TerritoryRegistry {
    /// Codes are normalized on the way in; codes that do not normalize are ignored.
    /// A code listed under two territories belongs to the first one.
    pub fn new(definitions: &[TerritoryDefinition]) -> Self {
        let mut registry = Self::default();
        for territory in definitions {
            for raw in &territory.municipalities {
                let code = normalize_geocode(raw.as_str());
                if code.is_empty() {
                    continue;
                }
                registry.members.insert(code.clone());
                registry.by_code.entry(code).or_insert_with(|| TerritoryRef {
                    id: territory.id,
                    name: territory.name.clone(),
                });
            }
        }
        registry
    }

    pub fn contains(&self, code: &str) -> bool {
        self.members.contains(code)
    }

    pub fn lookup(&self, code: &str) -> Option<&TerritoryRef> {
        self.by_code.get(code)
    }

    /// Every expected member code, sorted.
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The six TSBio territories.
pub fn default_territories() -> Vec<TerritoryDefinition> {
    vec![
        TerritoryDefinition::new(
            1,
            "Altamira",
            &["1500602", "1500859", "1501725", "1504455", "1505486", "1507805", "1508159", "1508357"],
        ),
        TerritoryDefinition::new(
            2,
            "Macapá",
            &["1600212", "1600303", "1600253", "1600238", "1600535", "1600600", "1600154", "1600055"],
        ),
        TerritoryDefinition::new(3, "Portel", &["1503101", "1504505", "1505809", "1501105"]),
        TerritoryDefinition::new(
            4,
            "Juruá-Tefé",
            &[
                "1301654", "1301803", "1301407", "1301506", "1301951", "1301001", "1304203",
                "1302207", "1304260", "1300029",
            ],
        ),
        TerritoryDefinition::new(
            5,
            "Rio Branco-Brasiléia",
            &[
                "1200401", "1200708", "1200252", "1200104", "1200054", "1200138", "1200807",
                "1200450", "1200013", "1200385", "1200179",
            ],
        ),
        TerritoryDefinition::new(
            6,
            "Salgado-Bragantino",
            &[
                "1508209", "1508035", "1507961", "1507474", "1507466", "1507409", "1507102",
                "1506906", "1506609", "1506203", "1506112", "1506104", "1505601", "1505007",
                "1504406", "1504307", "1504109", "1503200", "1502905", "1502608", "1502202",
                "1501709", "1501600", "1500909",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_and_lookup_use_normalized_codes() {
        let registry = TerritoryRegistry::new(&[
            TerritoryDefinition::new(1, "Norte", &["1500602", "150085"]),
            TerritoryDefinition::new(2, "Sul", &["1600212", "not-a-code"]),
        ]);
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("0150085"));
        assert!(!registry.contains("150085"));
        assert_eq!(registry.lookup("1600212").map(|t| t.id), Some(2));
        assert_eq!(registry.lookup("1500602").map(|t| t.name.as_str()), Some("Norte"));
        assert!(registry.lookup("9999999").is_none());
    }

    #[test]
    fn default_registry_covers_all_tsbio_municipalities() {
        let registry = TerritoryRegistry::new(&default_territories());
        assert_eq!(registry.len(), 65);
        assert_eq!(registry.lookup("1508159").map(|t| t.id), Some(1));
    }
}
