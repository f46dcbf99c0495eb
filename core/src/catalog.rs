use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{CropId, PaymentMode, PricingTier, TierId};
use crate::targets;

/// Per-crop tier lists as last loaded from the API, in server order.
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    crops: HashMap<CropId, Vec<PricingTier>>,
}

impl PricingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty when the crop has no tiers or has not been loaded.
    pub fn tiers_for_crop(&self, crop_id: &CropId) -> &[PricingTier] {
        self.crops
            .get(crop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_loaded(&self, crop_id: &CropId) -> bool {
        self.crops.contains_key(crop_id)
    }

    pub fn replace_crop(&mut self, crop_id: CropId, tiers: Vec<PricingTier>) {
        let foreign = tiers.iter().filter(|tier| tier.crop_id != crop_id).count();
        if foreign > 0 {
            warn!(
                target: targets::CATALOG,
                crop = %crop_id,
                foreign,
                "Tier list contains tiers owned by another crop"
            );
        }

        debug!(
            target: targets::CATALOG,
            crop = %crop_id,
            count = tiers.len(),
            "Catalog updated"
        );

        for (left, right) in overlapping_pairs(&tiers) {
            warn!(
                target: targets::CATALOG,
                crop = %crop_id,
                first = %left,
                second = %right,
                "Tier ranges overlap; first match wins"
            );
        }

        self.crops.insert(crop_id, tiers);
    }

    /// Drops a crop so the next lookup reloads it from the API.
    pub fn invalidate(&mut self, crop_id: &CropId) {
        if self.crops.remove(crop_id).is_some() {
            debug!(target: targets::CATALOG, crop = %crop_id, "Catalog entry invalidated");
        }
    }

    pub fn tier(&self, crop_id: &CropId, tier_id: &TierId) -> Option<&PricingTier> {
        self.tiers_for_crop(crop_id)
            .iter()
            .find(|tier| &tier.id == tier_id)
    }

    pub fn overlapping_pairs(&self, crop_id: &CropId) -> Vec<(TierId, TierId)> {
        overlapping_pairs(self.tiers_for_crop(crop_id))
    }
}

/// First tier in catalog order whose inclusive extent range holds the area.
/// Overlapping ranges are not re-ranked.
pub fn find_applicable_tier(tiers: &[PricingTier], area_in_acres: f64) -> Option<&PricingTier> {
    tiers.iter().find(|tier| tier.contains_area(area_in_acres))
}

/// Same first-match rule, restricted to one payment mode.
pub fn find_applicable_tier_for_mode(
    tiers: &[PricingTier],
    area_in_acres: f64,
    mode: PaymentMode,
) -> Option<&PricingTier> {
    tiers
        .iter()
        .filter(|tier| tier.payment_mode == mode)
        .find(|tier| tier.contains_area(area_in_acres))
}

fn overlapping_pairs(tiers: &[PricingTier]) -> Vec<(TierId, TierId)> {
    let mut pairs = Vec::new();
    for (index, left) in tiers.iter().enumerate() {
        for right in &tiers[index + 1..] {
            if left.payment_mode == right.payment_mode && left.overlaps(right) {
                pairs.push((left.id.clone(), right.id.clone()));
            }
        }
    }
    pairs
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{ExtentUnit, TierStatus};

    pub(crate) fn tier(id: &str, min: f64, max: f64, cost_per_acre: f64) -> PricingTier {
        PricingTier {
            id: TierId::new(id),
            crop_id: CropId::new("mango"),
            name: format!("Tier {id}"),
            payment_mode: PaymentMode::Outright,
            status: TierStatus::Active,
            extent_unit: ExtentUnit::Acre,
            extent_min_value: min,
            extent_max_value: max,
            cost_per_acre,
            cost_per_cent: cost_per_acre / 100.0,
            cost_per_sqft: None,
            total_cost_per_acre: None,
            emi_per_month: None,
            valid_from: None,
            valid_to: None,
            description: None,
        }
    }

    #[test]
    fn unknown_crop_has_no_tiers() {
        let catalog = PricingCatalog::new();
        assert!(catalog.tiers_for_crop(&CropId::new("teak")).is_empty());
        assert!(!catalog.is_loaded(&CropId::new("teak")));
    }

    #[test]
    fn lookup_returns_a_tier_whose_range_holds_the_area() {
        let tiers = vec![
            tier("small", 0.0, 0.99, 6000.0),
            tier("mid", 1.0, 5.0, 5000.0),
            tier("large", 5.01, 50.0, 4200.0),
        ];

        for area in [0.0, 0.5, 1.0, 3.0, 5.0, 5.01, 20.0, 50.0] {
            let matched = find_applicable_tier(&tiers, area).expect("tier for area");
            assert!(
                matched.extent_min_value <= area && area <= matched.extent_max_value,
                "area {area} matched {}",
                matched.id
            );
        }

        assert!(find_applicable_tier(&tiers, 50.5).is_none());
        assert!(find_applicable_tier(&tiers, -1.0).is_none());
    }

    #[test]
    fn overlapping_ranges_resolve_to_first_in_catalog_order() {
        let tiers = vec![tier("older", 1.0, 10.0, 4000.0), tier("newer", 2.0, 4.0, 9000.0)];
        let matched = find_applicable_tier(&tiers, 3.0).expect("tier");
        assert_eq!(matched.id, TierId::new("older"));
    }

    #[test]
    fn mode_filter_skips_other_payment_modes() {
        let mut emi = tier("emi", 1.0, 5.0, 5500.0);
        emi.payment_mode = PaymentMode::Emi;
        let tiers = vec![tier("cash", 1.0, 5.0, 5000.0), emi];

        let matched =
            find_applicable_tier_for_mode(&tiers, 2.0, PaymentMode::Emi).expect("emi tier");
        assert_eq!(matched.id, TierId::new("emi"));
    }

    #[test]
    fn replace_and_invalidate_crop() {
        let mut catalog = PricingCatalog::new();
        let crop = CropId::new("mango");
        catalog.replace_crop(
            crop.clone(),
            vec![tier("a", 1.0, 10.0, 4000.0), tier("b", 2.0, 4.0, 9000.0)],
        );

        assert_eq!(catalog.tiers_for_crop(&crop).len(), 2);
        assert_eq!(
            catalog.overlapping_pairs(&crop),
            vec![(TierId::new("a"), TierId::new("b"))]
        );
        assert!(catalog.tier(&crop, &TierId::new("b")).is_some());

        catalog.invalidate(&crop);
        assert!(!catalog.is_loaded(&crop));
        assert!(catalog.tiers_for_crop(&crop).is_empty());
    }
}
