use std::fmt;

use tracing::{debug, info, warn};

use crate::catalog::{find_applicable_tier, find_applicable_tier_for_mode};
use crate::costs::{CostBreakdown, compute_costs, installment_count, sanitize_percent};
use crate::model::{CropId, PaymentMode, PricingTier};
use crate::{Error, targets};

/// Attached to a tier fetch. Only the ticket from the latest request is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    crop_id: CropId,
    sequence: u64,
}

impl FetchTicket {
    pub fn crop_id(&self) -> &CropId {
        &self.crop_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingState {
    Idle,
    CropSelected,
    TiersLoaded,
    TierMatched,
    NoTierFound,
    FetchFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub summary: String,
    pub detail: String,
    /// Offer a retry button.
    pub retryable: bool,
}

impl From<&Error> for ViewError {
    fn from(error: &Error) -> Self {
        Self {
            summary: error.user_summary(),
            detail: error.technical_detail(),
            retryable: error.is_retryable(),
        }
    }
}

impl From<Error> for ViewError {
    fn from(error: Error) -> Self {
        Self::from(&error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PricingDisplay {
    SelectCrop,
    Loading,
    EnterArea,
    Costs {
        tier: PricingTier,
        breakdown: CostBreakdown,
        installments: Option<u32>,
    },
    NoPricingAvailable,
    Error(ViewError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputRejected {
    NegativeArea(f64),
    PercentOutOfRange(f64),
}

impl fmt::Display for InputRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRejected::NegativeArea(value) => {
                write!(f, "Area must be zero or more (got {value})")
            }
            InputRejected::PercentOutOfRange(value) => {
                write!(f, "Down payment must be between 0 and 100 (got {value})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Pricing panel for one plot: selected crop, its tiers, and the figures for
/// the plot's area.
#[derive(Debug, Clone)]
pub struct PlotPricingView {
    crop: Option<CropId>,
    sequence: u64,
    phase: Phase,
    tiers: Option<Vec<PricingTier>>,
    error: Option<ViewError>,
    area_in_acres: Option<f64>,
    down_payment_percent: Option<f64>,
    payment_mode: Option<PaymentMode>,
}

impl Default for PlotPricingView {
    fn default() -> Self {
        Self {
            crop: None,
            sequence: 0,
            phase: Phase::Idle,
            tiers: None,
            error: None,
            area_in_acres: None,
            down_payment_percent: None,
            payment_mode: None,
        }
    }
}

impl PlotPricingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_crop(&self) -> Option<&CropId> {
        self.crop.as_ref()
    }

    pub fn area_in_acres(&self) -> Option<f64> {
        self.area_in_acres
    }

    pub fn down_payment_percent(&self) -> Option<f64> {
        self.down_payment_percent
    }

    pub fn payment_mode(&self) -> Option<PaymentMode> {
        self.payment_mode
    }

    pub fn tiers(&self) -> &[PricingTier] {
        self.tiers.as_deref().unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Starts loading a crop. `None` when that crop is already shown or in flight.
    pub fn select_crop(&mut self, crop_id: CropId) -> Option<FetchTicket> {
        if self.crop.as_ref() == Some(&crop_id) && self.phase != Phase::Failed {
            debug!(target: targets::PRICING, crop = %crop_id, "Crop already selected");
            return None;
        }

        self.crop = Some(crop_id.clone());
        self.tiers = None;
        self.error = None;
        Some(self.issue_ticket(crop_id))
    }

    pub fn clear_crop(&mut self) {
        self.bump_sequence();
        self.crop = None;
        self.tiers = None;
        self.error = None;
        self.phase = Phase::Idle;
    }

    /// Re-fetches the current crop, keeping the last good tiers on screen.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        let crop_id = self.crop.clone()?;
        info!(target: targets::PRICING, crop = %crop_id, "Retrying tier fetch");
        Some(self.issue_ticket(crop_id))
    }

    /// The view is going away; every outstanding ticket turns stale.
    pub fn cancel(&mut self) {
        debug!(target: targets::PRICING, sequence = self.sequence, "Pricing view cancelled");
        self.clear_crop();
    }

    /// Returns `false` when the ticket is stale and the result was dropped.
    pub fn apply_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<PricingTier>, ViewError>,
    ) -> bool {
        if ticket.sequence != self.sequence || self.crop.as_ref() != Some(&ticket.crop_id) {
            debug!(
                target: targets::PRICING,
                crop = %ticket.crop_id,
                sequence = ticket.sequence,
                current = self.sequence,
                "Dropping stale tier fetch"
            );
            return false;
        }

        match result {
            Ok(tiers) => {
                debug!(
                    target: targets::PRICING,
                    crop = %ticket.crop_id,
                    count = tiers.len(),
                    "Tiers loaded"
                );
                self.tiers = Some(tiers);
                self.error = None;
                self.phase = Phase::Loaded;
                self.log_match();
            }
            Err(error) => {
                warn!(
                    target: targets::PRICING,
                    crop = %ticket.crop_id,
                    error = %error.detail,
                    stale_tiers = self.tiers.is_some(),
                    "Tier fetch failed"
                );
                self.error = Some(error);
                if self.tiers.is_some() {
                    self.phase = Phase::Loaded;
                } else {
                    self.phase = Phase::Failed;
                }
            }
        }
        true
    }

    pub fn set_area(&mut self, area_in_acres: Option<f64>) -> Result<(), InputRejected> {
        if let Some(area) = area_in_acres {
            if !area.is_finite() || area < 0.0 {
                return Err(InputRejected::NegativeArea(area));
            }
        }
        self.area_in_acres = area_in_acres;
        self.log_match();
        Ok(())
    }

    /// Blank or non-numeric input means no down payment.
    pub fn set_down_payment(&mut self, percent: Option<f64>) -> Result<(), InputRejected> {
        let percent = percent.filter(|value| value.is_finite());
        if let Some(value) = percent {
            if !(0.0..=100.0).contains(&value) {
                return Err(InputRejected::PercentOutOfRange(value));
            }
        }
        self.down_payment_percent = percent;
        Ok(())
    }

    /// `None` matches across every payment mode.
    pub fn set_payment_mode(&mut self, mode: Option<PaymentMode>) {
        self.payment_mode = mode;
        self.log_match();
    }

    pub fn state(&self) -> PricingState {
        match self.phase {
            Phase::Idle => PricingState::Idle,
            Phase::Loading if self.tiers.is_none() => PricingState::CropSelected,
            Phase::Failed => PricingState::FetchFailed,
            Phase::Loading | Phase::Loaded => match self.area_in_acres {
                None => PricingState::TiersLoaded,
                Some(_) if self.matched_tier().is_some() => PricingState::TierMatched,
                Some(_) => PricingState::NoTierFound,
            },
        }
    }

    pub fn matched_tier(&self) -> Option<&PricingTier> {
        let tiers = self.tiers.as_deref()?;
        let area = self.area_in_acres?;
        match self.payment_mode {
            Some(mode) => find_applicable_tier_for_mode(tiers, area, mode),
            None => find_applicable_tier(tiers, area),
        }
    }

    pub fn display(&self) -> PricingDisplay {
        if self.crop.is_none() {
            return PricingDisplay::SelectCrop;
        }
        if self.tiers.is_none() {
            return match (&self.phase, &self.error) {
                (Phase::Failed, Some(error)) => PricingDisplay::Error(error.clone()),
                _ => PricingDisplay::Loading,
            };
        }
        let Some(area) = self.area_in_acres else {
            return PricingDisplay::EnterArea;
        };
        match self.matched_tier() {
            Some(tier) => {
                let breakdown = compute_costs(tier, area, self.down_payment_percent);
                PricingDisplay::Costs {
                    tier: tier.clone(),
                    breakdown,
                    installments: installment_count(
                        breakdown.outstanding_amount,
                        tier.emi_per_month,
                    ),
                }
            }
            None => PricingDisplay::NoPricingAvailable,
        }
    }

    /// Error shown above tiers that are still on screen from an earlier fetch.
    pub fn error_banner(&self) -> Option<&ViewError> {
        self.tiers.as_ref().and(self.error.as_ref())
    }

    fn issue_ticket(&mut self, crop_id: CropId) -> FetchTicket {
        self.bump_sequence();
        self.phase = Phase::Loading;
        debug!(
            target: targets::PRICING,
            crop = %crop_id,
            sequence = self.sequence,
            "Tier fetch requested"
        );
        FetchTicket {
            crop_id,
            sequence: self.sequence,
        }
    }

    fn bump_sequence(&mut self) {
        self.sequence = self.sequence.wrapping_add(1);
    }

    fn log_match(&self) {
        let (Some(crop), Some(area)) = (self.crop.as_ref(), self.area_in_acres) else {
            return;
        };
        if self.tiers.is_none() {
            return;
        }
        match self.matched_tier() {
            Some(tier) => debug!(
                target: targets::PRICING,
                crop = %crop,
                area,
                tier = %tier.id,
                percent = sanitize_percent(self.down_payment_percent),
                "Tier matched"
            ),
            None => debug!(target: targets::PRICING, crop = %crop, area, "No tier for area"),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::api::tests::run_future;
    use crate::api::{FarmApi, MockFarmApi};
    use crate::catalog::tests::tier;
    use crate::model::TierId;

    fn transport_error() -> Error {
        Error::Transport {
            endpoint: "GET /crops/mango/pricing".to_string(),
            details: "connection reset".to_string(),
        }
    }

    fn loaded_view(tiers: Vec<PricingTier>, area: f64) -> PlotPricingView {
        let mut view = PlotPricingView::new();
        let ticket = view.select_crop(CropId::new("mango")).expect("ticket");
        assert!(view.apply_fetch(&ticket, Ok(tiers)));
        view.set_area(Some(area)).expect("area");
        view
    }

    #[test]
    fn starts_idle_and_asks_for_a_crop() {
        let view = PlotPricingView::new();
        assert_eq!(view.state(), PricingState::Idle);
        assert_eq!(view.display(), PricingDisplay::SelectCrop);
    }

    #[test]
    fn matched_tier_shows_costs() {
        let mut view = loaded_view(vec![tier("mid", 1.0, 5.0, 5000.0)], 3.0);
        view.set_down_payment(Some(20.0)).expect("percent");

        assert_eq!(view.state(), PricingState::TierMatched);
        let PricingDisplay::Costs { tier, breakdown, .. } = view.display() else {
            panic!("expected costs, got {:?}", view.display());
        };
        assert_eq!(tier.id, TierId::new("mid"));
        assert_abs_diff_eq!(breakdown.total_price, 15000.0);
        assert_abs_diff_eq!(breakdown.outstanding_amount, 12000.0);
    }

    #[test]
    fn area_outside_every_tier_is_no_pricing() {
        let view = loaded_view(
            vec![tier("a", 1.0, 5.0, 5000.0), tier("b", 10.0, 20.0, 4000.0)],
            7.0,
        );
        assert_eq!(view.state(), PricingState::NoTierFound);
        assert_eq!(view.display(), PricingDisplay::NoPricingAvailable);
    }

    #[test]
    fn switching_crops_drops_the_older_result() {
        let mut view = PlotPricingView::new();
        view.set_area(Some(3.0)).expect("area");
        let first = view.select_crop(CropId::new("mango")).expect("first");
        let second = view.select_crop(CropId::new("teak")).expect("second");

        let mut teak = tier("teak-mid", 1.0, 5.0, 9000.0);
        teak.crop_id = CropId::new("teak");
        assert!(view.apply_fetch(&second, Ok(vec![teak])));
        assert!(!view.apply_fetch(&first, Ok(vec![tier("mango-mid", 1.0, 5.0, 5000.0)])));

        let PricingDisplay::Costs { tier, .. } = view.display() else {
            panic!("expected costs");
        };
        assert_eq!(tier.id, TierId::new("teak-mid"));
    }

    #[test]
    fn late_error_for_an_old_crop_is_ignored() {
        let mut view = PlotPricingView::new();
        let first = view.select_crop(CropId::new("mango")).expect("first");
        let second = view.select_crop(CropId::new("teak")).expect("second");

        assert!(!view.apply_fetch(&first, Err(transport_error().into())));
        assert_eq!(view.state(), PricingState::CropSelected);
        assert!(view.apply_fetch(&second, Ok(Vec::new())));
        assert_eq!(view.state(), PricingState::TiersLoaded);
    }

    #[test]
    fn selecting_the_same_crop_again_keeps_state() {
        let mut view = loaded_view(vec![tier("mid", 1.0, 5.0, 5000.0)], 3.0);
        assert!(view.select_crop(CropId::new("mango")).is_none());
        assert_eq!(view.state(), PricingState::TierMatched);
    }

    #[test]
    fn failure_on_a_fresh_crop_clears_costs() {
        let mut view = PlotPricingView::new();
        let ticket = view.select_crop(CropId::new("mango")).expect("ticket");
        assert!(view.apply_fetch(&ticket, Err(transport_error().into())));

        assert_eq!(view.state(), PricingState::FetchFailed);
        assert!(matches!(view.display(), PricingDisplay::Error(_)));
        assert!(view.error_banner().is_none());

        let retry = view.select_crop(CropId::new("mango")).expect("failed crop refetches");
        assert!(view.apply_fetch(&retry, Ok(vec![tier("mid", 1.0, 5.0, 5000.0)])));
        assert_eq!(view.state(), PricingState::TiersLoaded);
    }

    #[test]
    fn failed_retry_keeps_last_good_tiers_with_a_banner() {
        let mut view = loaded_view(vec![tier("mid", 1.0, 5.0, 5000.0)], 3.0);
        let ticket = view.retry().expect("retry");
        assert!(view.apply_fetch(&ticket, Err(transport_error().into())));

        assert_eq!(view.state(), PricingState::TierMatched);
        assert!(matches!(view.display(), PricingDisplay::Costs { .. }));
        let banner = view.error_banner().expect("banner");
        assert_eq!(banner.summary, "Could not reach the farm server.");
    }

    #[test]
    fn cancel_makes_pending_tickets_stale() {
        let mut view = PlotPricingView::new();
        let ticket = view.select_crop(CropId::new("mango")).expect("ticket");
        view.cancel();
        assert!(!view.apply_fetch(&ticket, Ok(vec![tier("mid", 1.0, 5.0, 5000.0)])));
        assert_eq!(view.display(), PricingDisplay::SelectCrop);
        assert!(view.retry().is_none());
    }

    #[test]
    fn payment_mode_changes_rematch_without_refetch() {
        let mut emi = tier("emi", 1.0, 5.0, 5500.0);
        emi.payment_mode = PaymentMode::Emi;
        emi.emi_per_month = Some(2500.0);
        let mut view = loaded_view(vec![tier("cash", 1.0, 5.0, 5000.0), emi], 2.0);

        view.set_payment_mode(Some(PaymentMode::Emi));
        let PricingDisplay::Costs { tier, breakdown, installments } = view.display() else {
            panic!("expected costs");
        };
        assert_eq!(tier.id, TierId::new("emi"));
        assert_abs_diff_eq!(breakdown.total_price, 11000.0);
        assert_eq!(installments, Some(5));

        view.set_payment_mode(Some(PaymentMode::Outright));
        assert_eq!(view.matched_tier().map(|tier| tier.id.clone()), Some(TierId::new("cash")));
    }

    #[test]
    fn invalid_inputs_are_rejected_and_previous_values_kept() {
        let mut view = loaded_view(vec![tier("mid", 1.0, 5.0, 5000.0)], 3.0);
        view.set_down_payment(Some(10.0)).expect("percent");

        assert_eq!(
            view.set_area(Some(-1.0)),
            Err(InputRejected::NegativeArea(-1.0))
        );
        assert_eq!(
            view.set_down_payment(Some(120.0)),
            Err(InputRejected::PercentOutOfRange(120.0))
        );
        assert_eq!(view.area_in_acres(), Some(3.0));
        assert_eq!(view.down_payment_percent(), Some(10.0));

        view.set_down_payment(Some(f64::NAN)).expect("nan is no down payment");
        assert_eq!(view.down_payment_percent(), None);
    }

    #[test]
    fn area_unset_asks_for_area() {
        let mut view = PlotPricingView::new();
        let ticket = view.select_crop(CropId::new("mango")).expect("ticket");
        view.apply_fetch(&ticket, Ok(vec![tier("mid", 1.0, 5.0, 5000.0)]));
        assert_eq!(view.display(), PricingDisplay::EnterArea);
    }

    #[test]
    fn fetch_through_mock_api() {
        let api = MockFarmApi::new().with_tier(tier("mid", 1.0, 5.0, 5000.0));
        let mut view = PlotPricingView::new();
        view.set_area(Some(4.0)).expect("area");
        let ticket = view.select_crop(CropId::new("mango")).expect("ticket");

        let result = run_future(api.list_pricing_tiers(ticket.crop_id().clone()))
            .map_err(ViewError::from);
        assert!(view.apply_fetch(&ticket, result));
        assert_eq!(view.state(), PricingState::TierMatched);
    }

    #[test]
    fn only_server_failures_offer_a_retry() {
        assert!(ViewError::from(transport_error()).retryable);

        let unauthorized = ViewError::from(Error::Unauthorized {
            endpoint: "GET /crops/mango/pricing".to_string(),
        });
        assert!(!unauthorized.retryable);
        assert_eq!(
            unauthorized.summary,
            "Your session has expired or lacks access. Sign in again."
        );
    }
}
