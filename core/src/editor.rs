use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use tracing::debug;

use crate::api::FarmApi;
use crate::costs::round2;
use crate::model::{
    CENTS_PER_ACRE, CropId, ExtentUnit, NewPricingTier, PaymentMode, PricingTier, TierId,
    TierPatch, TierStatus,
};
use crate::{Error, targets};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Create,
    Update,
}

/// In-memory copy of a tier while an agent edits it. Payment mode and unit
/// start unset for new tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TierDraft {
    pub id: Option<TierId>,
    pub crop_id: Option<CropId>,
    pub name: String,
    pub payment_mode: Option<PaymentMode>,
    pub status: TierStatus,
    pub extent_unit: Option<ExtentUnit>,
    pub extent_min_value: f64,
    pub extent_max_value: f64,
    pub cost_per_acre: f64,
    pub cost_per_cent: f64,
    pub cost_per_sqft: Option<f64>,
    pub total_cost_per_acre: Option<f64>,
    pub emi_per_month: Option<f64>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierField {
    Name(String),
    PaymentMode(Option<PaymentMode>),
    ExtentUnit(Option<ExtentUnit>),
    ExtentMinValue(f64),
    ExtentMaxValue(f64),
    CostPerAcre(f64),
    CostPerSqft(Option<f64>),
    TotalCostPerAcre(Option<f64>),
    EmiPerMonth(Option<f64>),
    ValidFrom(Option<NaiveDate>),
    ValidTo(Option<NaiveDate>),
    Description(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TierSubmission {
    Create(NewPricingTier),
    Update { id: TierId, patch: TierPatch },
}

impl TierDraft {
    pub fn new_for_crop(crop_id: CropId) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis())
            .unwrap_or(0);
        Self {
            id: Some(TierId::temporary(stamp)),
            crop_id: Some(crop_id),
            name: String::new(),
            payment_mode: None,
            status: TierStatus::Active,
            extent_unit: None,
            extent_min_value: 0.0,
            extent_max_value: 0.0,
            cost_per_acre: 0.0,
            cost_per_cent: 0.0,
            cost_per_sqft: None,
            total_cost_per_acre: None,
            emi_per_month: None,
            valid_from: None,
            valid_to: None,
            description: None,
        }
    }

    pub fn from_tier(tier: &PricingTier) -> Self {
        Self {
            id: Some(tier.id.clone()),
            crop_id: Some(tier.crop_id.clone()),
            name: tier.name.clone(),
            payment_mode: Some(tier.payment_mode),
            status: tier.status,
            extent_unit: Some(tier.extent_unit.clone()),
            extent_min_value: tier.extent_min_value,
            extent_max_value: tier.extent_max_value,
            cost_per_acre: tier.cost_per_acre,
            cost_per_cent: tier.cost_per_cent,
            cost_per_sqft: tier.cost_per_sqft,
            total_cost_per_acre: tier.total_cost_per_acre,
            emi_per_month: tier.emi_per_month,
            valid_from: tier.valid_from,
            valid_to: tier.valid_to,
            description: tier.description.clone(),
        }
    }

    /// Returns an edited copy. Setting the per-acre cost also rederives the
    /// per-cent cost.
    pub fn set_field(&self, field: TierField) -> TierDraft {
        let mut next = self.clone();
        match field {
            TierField::Name(value) => next.name = value,
            TierField::PaymentMode(value) => next.payment_mode = value,
            TierField::ExtentUnit(value) => next.extent_unit = value,
            TierField::ExtentMinValue(value) => next.extent_min_value = value,
            TierField::ExtentMaxValue(value) => next.extent_max_value = value,
            TierField::CostPerAcre(value) => {
                next.cost_per_acre = value;
                next.cost_per_cent = round2(value / CENTS_PER_ACRE);
            }
            TierField::CostPerSqft(value) => next.cost_per_sqft = value,
            TierField::TotalCostPerAcre(value) => next.total_cost_per_acre = value,
            TierField::EmiPerMonth(value) => next.emi_per_month = value,
            TierField::ValidFrom(value) => next.valid_from = value,
            TierField::ValidTo(value) => next.valid_to = value,
            TierField::Description(value) => {
                next.description = value.filter(|text| !text.trim().is_empty())
            }
        }
        next
    }

    pub fn validate_for_submit(&self, mode: EditMode) -> Result<TierSubmission, ValidationErrors> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::EmptyName);
        }
        if self.crop_id.is_none() {
            issues.push(ValidationIssue::MissingCrop);
        }
        if self.payment_mode.is_none() {
            issues.push(ValidationIssue::MissingPaymentMode);
        }
        if self.extent_unit.is_none() {
            issues.push(ValidationIssue::MissingExtentUnit);
        }
        if self.extent_min_value > self.extent_max_value {
            issues.push(ValidationIssue::ExtentRangeInverted {
                min: self.extent_min_value,
                max: self.extent_max_value,
            });
        }
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if from > to {
                issues.push(ValidationIssue::ValidityRangeInverted { from, to });
            }
        }
        for (field, value) in [
            ("cost_per_acre", Some(self.cost_per_acre)),
            ("cost_per_cent", Some(self.cost_per_cent)),
            ("cost_per_sqft", self.cost_per_sqft),
            ("total_cost_per_acre", self.total_cost_per_acre),
            ("emi_per_month", self.emi_per_month),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    issues.push(ValidationIssue::NegativeCost { field, value });
                }
            }
        }

        let update_id = match mode {
            EditMode::Create => None,
            EditMode::Update => match &self.id {
                Some(id) if !id.is_temporary() => Some(id.clone()),
                _ => {
                    issues.push(ValidationIssue::MissingId);
                    None
                }
            },
        };

        let (Some(crop_id), Some(payment_mode), Some(extent_unit)) = (
            self.crop_id.clone(),
            self.payment_mode,
            self.extent_unit.clone(),
        ) else {
            return Err(self.reject(issues));
        };
        if !issues.is_empty() {
            return Err(self.reject(issues));
        }

        let body = NewPricingTier {
            crop_id,
            name: self.name.trim().to_string(),
            payment_mode,
            status: self.status,
            extent_unit,
            extent_min_value: self.extent_min_value,
            extent_max_value: self.extent_max_value,
            cost_per_acre: self.cost_per_acre,
            cost_per_cent: self.cost_per_cent,
            cost_per_sqft: self.cost_per_sqft,
            total_cost_per_acre: self.total_cost_per_acre,
            emi_per_month: self.emi_per_month,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            description: self.description.clone(),
        };

        Ok(match update_id {
            Some(id) => TierSubmission::Update {
                id,
                patch: TierPatch::replace_all(body),
            },
            None => TierSubmission::Create(body),
        })
    }

    fn reject(&self, issues: Vec<ValidationIssue>) -> ValidationErrors {
        let errors = ValidationErrors(issues);
        debug!(
            target: targets::PRICING,
            tier = ?self.id,
            errors = %errors,
            "Tier draft rejected"
        );
        errors
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    EmptyName,
    MissingCrop,
    MissingPaymentMode,
    MissingExtentUnit,
    ExtentRangeInverted { min: f64, max: f64 },
    ValidityRangeInverted { from: NaiveDate, to: NaiveDate },
    NegativeCost { field: &'static str, value: f64 },
    MissingId,
}

impl ValidationIssue {
    /// Form field the issue is shown next to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationIssue::EmptyName => "name",
            ValidationIssue::MissingCrop => "crop_id",
            ValidationIssue::MissingPaymentMode => "payment_mode",
            ValidationIssue::MissingExtentUnit => "extent_unit",
            ValidationIssue::ExtentRangeInverted { .. } => "extent_min_value",
            ValidationIssue::ValidityRangeInverted { .. } => "valid_from",
            ValidationIssue::NegativeCost { field, .. } => *field,
            ValidationIssue::MissingId => "id",
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyName => f.write_str("Name is required"),
            ValidationIssue::MissingCrop => f.write_str("Select a crop first"),
            ValidationIssue::MissingPaymentMode => f.write_str("Payment mode is required"),
            ValidationIssue::MissingExtentUnit => f.write_str("Extent unit is required"),
            ValidationIssue::ExtentRangeInverted { min, max } => {
                write!(f, "Minimum extent {min} is greater than maximum {max}")
            }
            ValidationIssue::ValidityRangeInverted { from, to } => {
                write!(f, "Valid from {from} is after valid to {to}")
            }
            ValidationIssue::NegativeCost { field, value } => {
                write!(f, "{field} must be zero or more (got {value})")
            }
            ValidationIssue::MissingId => f.write_str("Saved tier id is missing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    pub fn for_field(&self, field: &str) -> Option<&ValidationIssue> {
        self.0.iter().find(|issue| issue.field() == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Sends a draft that passes validation. A rejected draft never reaches the API.
pub async fn submit_draft(
    api: &dyn FarmApi,
    draft: &TierDraft,
    mode: EditMode,
) -> Result<PricingTier, Error> {
    match draft.validate_for_submit(mode)? {
        TierSubmission::Create(body) => api.create_pricing_tier(body).await,
        TierSubmission::Update { id, patch } => api.update_pricing_tier(id, patch).await,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::api::MockFarmApi;
    use crate::api::tests::run_future;
    use crate::catalog::tests::tier;

    fn complete_draft() -> TierDraft {
        TierDraft::new_for_crop(CropId::new("mango"))
            .set_field(TierField::Name("Small holdings".to_string()))
            .set_field(TierField::PaymentMode(Some(PaymentMode::Outright)))
            .set_field(TierField::ExtentUnit(Some(ExtentUnit::Acre)))
            .set_field(TierField::ExtentMinValue(1.0))
            .set_field(TierField::ExtentMaxValue(5.0))
            .set_field(TierField::CostPerAcre(5000.0))
    }

    #[test]
    fn cost_per_acre_rederives_cost_per_cent() {
        let draft = TierDraft::new_for_crop(CropId::new("mango"));
        for value in [0.0, 5000.0, 1234.567, 99.5, 12_345_678.9] {
            let edited = draft.set_field(TierField::CostPerAcre(value));
            assert_abs_diff_eq!(edited.cost_per_cent, round2(value / 100.0));
        }
        assert_eq!(draft.cost_per_acre, 0.0, "original draft is untouched");
    }

    #[test]
    fn other_costs_are_independent() {
        let draft = complete_draft().set_field(TierField::EmiPerMonth(Some(2500.0)));
        assert_eq!(draft.cost_per_cent, 50.0);
        assert_eq!(draft.emi_per_month, Some(2500.0));
        assert_eq!(draft.total_cost_per_acre, None);
    }

    #[test]
    fn inverted_extent_range_is_rejected() {
        let draft = complete_draft()
            .set_field(TierField::ExtentMinValue(5.0))
            .set_field(TierField::ExtentMaxValue(1.0));

        let errors = draft
            .validate_for_submit(EditMode::Create)
            .expect_err("inverted range");
        assert_eq!(
            errors.issues(),
            &[ValidationIssue::ExtentRangeInverted { min: 5.0, max: 1.0 }]
        );
        assert!(errors.for_field("extent_min_value").is_some());
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let draft = TierDraft::new_for_crop(CropId::new("mango"))
            .set_field(TierField::Name("   ".to_string()));
        let errors = draft
            .validate_for_submit(EditMode::Create)
            .expect_err("incomplete draft");
        assert!(errors.issues().contains(&ValidationIssue::EmptyName));
        assert!(errors.issues().contains(&ValidationIssue::MissingPaymentMode));
        assert!(errors.issues().contains(&ValidationIssue::MissingExtentUnit));
    }

    #[test]
    fn validity_dates_must_be_ordered() {
        let draft = complete_draft()
            .set_field(TierField::ValidFrom(NaiveDate::from_ymd_opt(2025, 4, 1)))
            .set_field(TierField::ValidTo(NaiveDate::from_ymd_opt(2025, 3, 31)));
        let errors = draft
            .validate_for_submit(EditMode::Create)
            .expect_err("dates inverted");
        assert_eq!(errors.issues().len(), 1);
        assert_eq!(errors.issues()[0].field(), "valid_from");
    }

    #[test]
    fn create_drops_the_temporary_id() {
        let draft = complete_draft();
        assert!(draft.id.as_ref().is_some_and(TierId::is_temporary));

        match draft.validate_for_submit(EditMode::Create) {
            Ok(TierSubmission::Create(body)) => {
                assert_eq!(body.crop_id, CropId::new("mango"));
                assert_eq!(body.cost_per_cent, 50.0);
                assert_eq!(body.status, TierStatus::Active);
            }
            other => panic!("unexpected submission: {other:?}"),
        }
    }

    #[test]
    fn update_requires_a_server_id() {
        let errors = complete_draft()
            .validate_for_submit(EditMode::Update)
            .expect_err("temporary id cannot be updated");
        assert_eq!(errors.issues(), &[ValidationIssue::MissingId]);

        let saved = TierDraft::from_tier(&tier("p-17", 1.0, 5.0, 5000.0))
            .set_field(TierField::CostPerAcre(5200.0));
        match saved.validate_for_submit(EditMode::Update) {
            Ok(TierSubmission::Update { id, patch }) => {
                assert_eq!(id, TierId::new("p-17"));
                assert_eq!(patch.cost_per_acre, Some(5200.0));
                assert_eq!(patch.cost_per_cent, Some(52.0));
            }
            other => panic!("unexpected submission: {other:?}"),
        }
    }

    #[test]
    fn invalid_draft_is_not_sent() {
        let api = MockFarmApi::new();
        let draft = complete_draft()
            .set_field(TierField::ExtentMinValue(10.0))
            .set_field(TierField::ExtentMaxValue(5.0));

        let error = run_future(submit_draft(&api, &draft, EditMode::Create))
            .expect_err("inverted range");
        assert!(matches!(error, Error::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[test]
    fn valid_draft_is_created_then_updated() {
        let api = MockFarmApi::new();
        let created = run_future(submit_draft(&api, &complete_draft(), EditMode::Create))
            .expect("created");
        assert!(!created.id.is_temporary());

        let edited = TierDraft::from_tier(&created).set_field(TierField::CostPerAcre(6000.0));
        let updated =
            run_future(submit_draft(&api, &edited, EditMode::Update)).expect("updated");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.cost_per_cent, 60.0);
        assert_eq!(api.calls().len(), 2);
    }
}
