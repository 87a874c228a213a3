//! Frequency aggregation: raw outcomes → label counts.

use crate::models::{Distribution, PoolDefinition, RawOutcome};
use std::collections::BTreeSet;

/// Resolves outcomes through a pool catalog and counts them per label.
pub struct FrequencyAggregator;

impl FrequencyAggregator {
    /// Count outcomes per display label.
    ///
    /// Pure and order-insensitive. Unknown ids are counted under a
    /// placeholder label that embeds the raw id.
    pub fn aggregate(outcomes: &[RawOutcome], pool: &PoolDefinition) -> Distribution {
        let mut distribution = Distribution::new();
        for outcome in outcomes {
            distribution.add(&pool.label_for(outcome));
        }
        distribution
    }

    /// Raw ids seen in `outcomes` that the pool does not map.
    pub fn unmapped(outcomes: &[RawOutcome], pool: &PoolDefinition) -> BTreeSet<String> {
        outcomes
            .iter()
            .filter(|o| !pool.contains(o))
            .map(|o| o.as_str().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogEntry, placeholder_label};
    use std::collections::BTreeMap;

    fn pool() -> PoolDefinition {
        let mut items = BTreeMap::new();
        for (id, label) in [
            ("common", "Common"),
            ("uncommon", "Uncommon"),
            ("rare", "Rare"),
            ("rare_guarantee", "Rare"),
        ] {
            items.insert(
                id.to_string(),
                CatalogEntry {
                    label: label.to_string(),
                    weight: None,
                },
            );
        }
        PoolDefinition::new("test", items)
    }

    fn outcomes(raw: &[&str]) -> Vec<RawOutcome> {
        raw.iter().map(|r| RawOutcome::from(*r)).collect()
    }

    #[test]
    fn test_counts_per_label() {
        let mut raw = Vec::new();
        for _ in 0..10 {
            raw.extend(["common"; 5]);
            raw.extend(["uncommon"; 3]);
            raw.extend(["rare"; 2]);
        }
        let dist = FrequencyAggregator::aggregate(&outcomes(&raw), &pool());

        assert_eq!(dist.total(), 100);
        assert_eq!(dist.len(), 3);
        assert_eq!(dist.get("Common"), 50);
        assert_eq!(dist.get("Uncommon"), 30);
        assert_eq!(dist.get("Rare"), 20);
    }

    #[test]
    fn test_shared_labels_merge() {
        let dist =
            FrequencyAggregator::aggregate(&outcomes(&["rare", "rare_guarantee"]), &pool());
        assert_eq!(dist.get("Rare"), 2);
        assert_eq!(dist.len(), 1);
    }

    #[test]
    fn test_unknown_id_gets_visible_placeholder() {
        let raw = outcomes(&["common", "mystery", "common"]);
        let dist = FrequencyAggregator::aggregate(&raw, &pool());

        assert_eq!(dist.total(), 3);
        assert_eq!(dist.get(&placeholder_label("mystery")), 1);
        assert!(dist.iter().any(|(label, _)| label.contains("mystery")));

        let gaps = FrequencyAggregator::unmapped(&raw, &pool());
        assert_eq!(gaps.into_iter().collect::<Vec<_>>(), vec!["mystery"]);
    }

    #[test]
    fn test_order_insensitive_and_idempotent() {
        let raw = outcomes(&["rare", "common", "mystery", "uncommon", "common", "rare"]);
        let mut reversed = raw.clone();
        reversed.reverse();
        let mut rotated = raw.clone();
        rotated.rotate_left(2);

        let p = pool();
        let base = FrequencyAggregator::aggregate(&raw, &p);
        assert_eq!(base, FrequencyAggregator::aggregate(&reversed, &p));
        assert_eq!(base, FrequencyAggregator::aggregate(&rotated, &p));
        assert_eq!(base, FrequencyAggregator::aggregate(&raw, &p));
    }

    #[test]
    fn test_empty_input() {
        let dist = FrequencyAggregator::aggregate(&[], &pool());
        assert!(dist.is_empty());
        assert_eq!(dist.total(), 0);
    }
}
