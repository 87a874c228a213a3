//! Pool catalogs: raw outcome id → display label, per pool.
//!
//! Catalogs are loaded once before a run and shared read-only afterwards.

use super::{ProbeError, RawOutcome};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const BUILTIN_CATALOG: &str = include_str!("../../catalogs/default.toml");

/// Label synthesized for an id the catalog does not know.
pub fn placeholder_label(raw: &str) -> String {
    format!("unknown({raw})")
}

/// Catalog entry for one raw outcome id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display label (need not be unique within a pool)
    pub label: String,

    /// Designed relative draw weight; `None` for pity/guarantee grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// One reward pool and its id → label mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolDefinition {
    id: String,
    items: BTreeMap<String, CatalogEntry>,
}

impl PoolDefinition {
    pub fn new(id: impl Into<String>, items: BTreeMap<String, CatalogEntry>) -> Self {
        Self {
            id: id.into(),
            items,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, raw: &RawOutcome) -> bool {
        self.items.contains_key(raw.as_str())
    }

    pub fn entry(&self, raw: &str) -> Option<&CatalogEntry> {
        self.items.get(raw)
    }

    /// Resolve an outcome to its label, or a placeholder embedding the raw id.
    pub fn label_for(&self, raw: &RawOutcome) -> Cow<'_, str> {
        match self.items.get(raw.as_str()) {
            Some(entry) => Cow::Borrowed(entry.label.as_str()),
            None => Cow::Owned(placeholder_label(raw.as_str())),
        }
    }

    /// Sum of all designed weights.
    pub fn total_weight(&self) -> f64 {
        self.items.values().filter_map(|e| e.weight).sum()
    }

    /// Designed share per label (weights of ids sharing a label are summed).
    ///
    /// Empty when the pool carries no weights.
    pub fn expected_shares(&self) -> BTreeMap<String, f64> {
        let total = self.total_weight();
        let mut shares = BTreeMap::new();
        if total <= 0.0 {
            return shares;
        }
        for entry in self.items.values() {
            if let Some(weight) = entry.weight {
                *shares.entry(entry.label.clone()).or_insert(0.0) += weight / total;
            }
        }
        shares
    }
}

/// On-disk catalog layout.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    pools: BTreeMap<String, PoolFile>,
}

#[derive(Debug, Deserialize)]
struct PoolFile {
    #[serde(default)]
    items: BTreeMap<String, CatalogEntry>,
}

/// All known pools, keyed by pool id.
#[derive(Debug, Clone, Default)]
pub struct PoolCatalog {
    pools: BTreeMap<String, PoolDefinition>,
}

impl PoolCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml(BUILTIN_CATALOG)
    }

    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Load from the given file, or fall back to the built-in catalog.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// Parse and validate a catalog from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut pools = BTreeMap::new();

        for (pool_id, pool) in file.pools {
            if pool.items.is_empty() {
                return Err(CatalogError::EmptyPool(pool_id));
            }
            for (item, entry) in &pool.items {
                if entry.label.trim().is_empty() {
                    return Err(CatalogError::InvalidEntry {
                        pool: pool_id.clone(),
                        item: item.clone(),
                        reason: "empty label".to_string(),
                    });
                }
                if let Some(w) = entry.weight
                    && (!w.is_finite() || w < 0.0)
                {
                    return Err(CatalogError::InvalidEntry {
                        pool: pool_id.clone(),
                        item: item.clone(),
                        reason: format!("weight {w} must be finite and non-negative"),
                    });
                }
            }
            pools.insert(pool_id.clone(), PoolDefinition::new(pool_id, pool.items));
        }

        Ok(Self { pools })
    }

    pub fn insert(&mut self, pool: PoolDefinition) {
        self.pools.insert(pool.id.clone(), pool);
    }

    pub fn get(&self, pool_id: &str) -> Option<&PoolDefinition> {
        self.pools.get(pool_id)
    }

    /// Look up a pool, failing if the catalog has no such pool.
    pub fn pool(&self, pool_id: &str) -> Result<&PoolDefinition, ProbeError> {
        self.get(pool_id)
            .ok_or_else(|| ProbeError::UnknownPool(pool_id.to_string()))
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolDefinition> {
        self.pools.values()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// Catalog loading errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Pool '{0}' has no items")]
    EmptyPool(String),

    #[error("Invalid entry '{item}' in pool '{pool}': {reason}")]
    InvalidEntry {
        pool: String,
        item: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SMALL: &str = r#"
[pools.test.items]
common = { label = "Common", weight = 3 }
common_alt = { label = "Common", weight = 1 }
rare = { label = "Rare", weight = 1 }
rare_guarantee = { label = "Pity: Rare" }
"#;

    #[test]
    fn test_builtin_catalog_loads_known_pools() {
        let catalog = PoolCatalog::builtin().unwrap();
        for id in ["Starpath", "valentine", "celestine_breeze", "daily"] {
            assert!(catalog.get(id).is_some(), "missing pool {id}");
        }

        let starpath = catalog.pool("Starpath").unwrap();
        assert_eq!(starpath.len(), 11);
        assert_eq!(
            starpath.label_for(&RawOutcome::from("diamond")),
            "Diamond x1"
        );
    }

    #[test]
    fn test_label_for_falls_back_to_placeholder() {
        let catalog = PoolCatalog::from_toml(SMALL).unwrap();
        let pool = catalog.pool("test").unwrap();

        assert_eq!(pool.label_for(&RawOutcome::from("rare")), "Rare");
        let label = pool.label_for(&RawOutcome::from("mystery_box"));
        assert_eq!(label, "unknown(mystery_box)");
        assert!(label.contains("mystery_box"));
    }

    #[test]
    fn test_expected_shares_merge_shared_labels() {
        let catalog = PoolCatalog::from_toml(SMALL).unwrap();
        let pool = catalog.pool("test").unwrap();
        assert_eq!(pool.total_weight(), 5.0);

        let shares = pool.expected_shares();
        assert_eq!(shares.len(), 2);
        assert!((shares["Common"] - 0.8).abs() < 1e-12);
        assert!((shares["Rare"] - 0.2).abs() < 1e-12);
        assert!(!shares.contains_key("Pity: Rare"));
    }

    #[test]
    fn test_unweighted_pool_has_no_expectation() {
        let catalog = PoolCatalog::builtin().unwrap();
        let pool = catalog.pool("celestine_breeze").unwrap();
        assert!(pool.expected_shares().is_empty());
    }

    #[test]
    fn test_unknown_pool_is_an_error() {
        let catalog = PoolCatalog::from_toml(SMALL).unwrap();
        assert!(matches!(
            catalog.pool("nope"),
            Err(ProbeError::UnknownPool(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_rejects_invalid_entries() {
        let negative = "[pools.p.items]\na = { label = \"A\", weight = -1 }\n";
        assert!(matches!(
            PoolCatalog::from_toml(negative),
            Err(CatalogError::InvalidEntry { .. })
        ));

        let blank = "[pools.p.items]\na = { label = \" \" }\n";
        assert!(PoolCatalog::from_toml(blank).is_err());

        let empty = "[pools.p]\n";
        assert!(matches!(
            PoolCatalog::from_toml(empty),
            Err(CatalogError::EmptyPool(_))
        ));
    }

    #[test]
    fn test_load_from_file_or_builtin() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{SMALL}").unwrap();

        let from_file = PoolCatalog::load(Some(file.path())).unwrap();
        assert_eq!(from_file.len(), 1);

        let builtin = PoolCatalog::load(None).unwrap();
        assert_eq!(builtin.len(), 4);

        let missing = PoolCatalog::load(Some(Path::new("/nonexistent/catalog.toml")));
        assert!(matches!(missing, Err(CatalogError::FileRead { .. })));
    }
}
