use std::collections::HashMap;

use chrono::NaiveDate;
use farmplot_core::{
    CropId, EditMode, ExtentUnit, PaymentMode, PricingTier, TierDraft, TierField,
    ValidationErrors, format_amount, parse_decimal_input,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormInput {
    Name,
    ExtentMin,
    ExtentMax,
    CostPerAcre,
    CostPerSqft,
    TotalCostPerAcre,
    EmiPerMonth,
    ValidFrom,
    ValidTo,
    Description,
}

impl FormInput {
    pub const ALL: [FormInput; 10] = [
        FormInput::Name,
        FormInput::ExtentMin,
        FormInput::ExtentMax,
        FormInput::CostPerAcre,
        FormInput::CostPerSqft,
        FormInput::TotalCostPerAcre,
        FormInput::EmiPerMonth,
        FormInput::ValidFrom,
        FormInput::ValidTo,
        FormInput::Description,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormInput::Name => "Name",
            FormInput::ExtentMin => "Min extent",
            FormInput::ExtentMax => "Max extent",
            FormInput::CostPerAcre => "Cost per acre",
            FormInput::CostPerSqft => "Cost per sq ft",
            FormInput::TotalCostPerAcre => "Total cost per acre",
            FormInput::EmiPerMonth => "EMI per month",
            FormInput::ValidFrom => "Valid from (YYYY-MM-DD)",
            FormInput::ValidTo => "Valid to (YYYY-MM-DD)",
            FormInput::Description => "Description",
        }
    }

    /// Name the draft validator reports issues under.
    pub fn draft_field(self) -> &'static str {
        match self {
            FormInput::Name => "name",
            FormInput::ExtentMin => "extent_min_value",
            FormInput::ExtentMax => "extent_max_value",
            FormInput::CostPerAcre => "cost_per_acre",
            FormInput::CostPerSqft => "cost_per_sqft",
            FormInput::TotalCostPerAcre => "total_cost_per_acre",
            FormInput::EmiPerMonth => "emi_per_month",
            FormInput::ValidFrom => "valid_from",
            FormInput::ValidTo => "valid_to",
            FormInput::Description => "description",
        }
    }
}

/// Text state of the tier dialog. Every accepted keystroke is folded into
/// the draft; text that does not parse stays on screen with an inline error.
#[derive(Debug, Clone)]
pub struct TierForm {
    pub mode: EditMode,
    pub draft: TierDraft,
    inputs: HashMap<FormInput, String>,
    input_errors: HashMap<FormInput, String>,
    pub validation: Option<ValidationErrors>,
    pub saving: bool,
}

impl TierForm {
    pub fn create(crop_id: CropId) -> Self {
        Self::from_draft(EditMode::Create, TierDraft::new_for_crop(crop_id))
    }

    pub fn edit(tier: &PricingTier) -> Self {
        Self::from_draft(EditMode::Update, TierDraft::from_tier(tier))
    }

    fn from_draft(mode: EditMode, draft: TierDraft) -> Self {
        let optional = |value: Option<f64>| value.map(format_amount).unwrap_or_default();
        let date = |value: Option<NaiveDate>| {
            value
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_default()
        };
        let mut inputs = HashMap::new();
        inputs.insert(FormInput::Name, draft.name.clone());
        inputs.insert(FormInput::ExtentMin, draft.extent_min_value.to_string());
        inputs.insert(FormInput::ExtentMax, draft.extent_max_value.to_string());
        inputs.insert(FormInput::CostPerAcre, format_amount(draft.cost_per_acre));
        inputs.insert(FormInput::CostPerSqft, optional(draft.cost_per_sqft));
        inputs.insert(FormInput::TotalCostPerAcre, optional(draft.total_cost_per_acre));
        inputs.insert(FormInput::EmiPerMonth, optional(draft.emi_per_month));
        inputs.insert(FormInput::ValidFrom, date(draft.valid_from));
        inputs.insert(FormInput::ValidTo, date(draft.valid_to));
        inputs.insert(
            FormInput::Description,
            draft.description.clone().unwrap_or_default(),
        );

        Self {
            mode,
            draft,
            inputs,
            input_errors: HashMap::new(),
            validation: None,
            saving: false,
        }
    }

    pub fn input(&self, input: FormInput) -> &str {
        self.inputs.get(&input).map(String::as_str).unwrap_or_default()
    }

    pub fn set_input(&mut self, input: FormInput, value: String) {
        match parse_input(input, &value) {
            Ok(field) => {
                self.draft = self.draft.set_field(field);
                self.input_errors.remove(&input);
            }
            Err(message) => {
                self.input_errors.insert(input, message);
            }
        }
        self.inputs.insert(input, value);
        self.validation = None;
    }

    pub fn set_payment_mode(&mut self, mode: PaymentMode) {
        self.draft = self.draft.set_field(TierField::PaymentMode(Some(mode)));
        self.validation = None;
    }

    pub fn set_extent_unit(&mut self, unit: ExtentUnit) {
        self.draft = self.draft.set_field(TierField::ExtentUnit(Some(unit)));
        self.validation = None;
    }

    pub fn has_input_errors(&self) -> bool {
        !self.input_errors.is_empty()
    }

    /// Parse error first, then whatever the last submit attempt reported.
    pub fn error_for(&self, input: FormInput) -> Option<String> {
        if let Some(message) = self.input_errors.get(&input) {
            return Some(message.clone());
        }
        self.validation_error(input.draft_field())
    }

    pub fn validation_error(&self, field: &str) -> Option<String> {
        self.validation
            .as_ref()
            .and_then(|errors| errors.for_field(field))
            .map(ToString::to_string)
    }
}

fn parse_input(input: FormInput, value: &str) -> Result<TierField, String> {
    let required = |value: &str| match parse_decimal_input(value) {
        Ok(Some(number)) => Ok(number),
        Ok(None) => Err("Enter a number".to_string()),
        Err(error) => Err(error.to_string()),
    };
    let optional = |value: &str| parse_decimal_input(value).map_err(|error| error.to_string());
    let date = |value: &str| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(Some)
            .map_err(|_| format!("'{trimmed}' is not a YYYY-MM-DD date"))
    };

    Ok(match input {
        FormInput::Name => TierField::Name(value.to_string()),
        FormInput::ExtentMin => TierField::ExtentMinValue(required(value)?),
        FormInput::ExtentMax => TierField::ExtentMaxValue(required(value)?),
        FormInput::CostPerAcre => TierField::CostPerAcre(required(value)?),
        FormInput::CostPerSqft => TierField::CostPerSqft(optional(value)?),
        FormInput::TotalCostPerAcre => TierField::TotalCostPerAcre(optional(value)?),
        FormInput::EmiPerMonth => TierField::EmiPerMonth(optional(value)?),
        FormInput::ValidFrom => TierField::ValidFrom(date(value)?),
        FormInput::ValidTo => TierField::ValidTo(date(value)?),
        FormInput::Description => TierField::Description(Some(value.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use farmplot_core::{TierSubmission, ValidationIssue};

    use super::*;

    #[test]
    fn cost_per_acre_text_updates_cost_per_cent() {
        let mut form = TierForm::create(CropId::new("mango"));
        form.set_input(FormInput::CostPerAcre, "4875,6".to_string());
        assert_eq!(form.draft.cost_per_acre, 4875.6);
        assert_eq!(form.draft.cost_per_cent, 48.76);
        assert!(!form.has_input_errors());
    }

    #[test]
    fn unparsable_text_keeps_the_last_good_value() {
        let mut form = TierForm::create(CropId::new("mango"));
        form.set_input(FormInput::ExtentMax, "5".to_string());
        form.set_input(FormInput::ExtentMax, "5a".to_string());

        assert_eq!(form.draft.extent_max_value, 5.0);
        assert_eq!(form.input(FormInput::ExtentMax), "5a");
        assert!(form.error_for(FormInput::ExtentMax).is_some());

        form.set_input(FormInput::ExtentMax, "6".to_string());
        assert!(form.error_for(FormInput::ExtentMax).is_none());
    }

    #[test]
    fn dates_parse_or_clear() {
        let mut form = TierForm::create(CropId::new("mango"));
        form.set_input(FormInput::ValidFrom, "2025-04-01".to_string());
        assert_eq!(form.draft.valid_from, NaiveDate::from_ymd_opt(2025, 4, 1));
        form.set_input(FormInput::ValidFrom, " ".to_string());
        assert_eq!(form.draft.valid_from, None);
        form.set_input(FormInput::ValidTo, "01/04/2025".to_string());
        assert!(form.error_for(FormInput::ValidTo).is_some());
    }

    #[test]
    fn validation_issues_map_to_inputs() {
        let mut form = TierForm::create(CropId::new("mango"));
        form.set_input(FormInput::ExtentMin, "9".to_string());
        form.set_input(FormInput::ExtentMax, "2".to_string());
        let errors = form
            .draft
            .validate_for_submit(form.mode)
            .expect_err("incomplete draft");
        form.validation = Some(errors);

        assert!(form.error_for(FormInput::Name).is_some());
        assert!(form.error_for(FormInput::ExtentMin).is_some());
        assert!(form.validation_error("payment_mode").is_some());
    }

    #[test]
    fn edit_form_submits_an_update() {
        let tier = PricingTier {
            id: farmplot_core::TierId::new("p-3"),
            crop_id: CropId::new("mango"),
            name: "Standard".to_string(),
            payment_mode: PaymentMode::Emi,
            status: farmplot_core::TierStatus::Active,
            extent_unit: ExtentUnit::Acre,
            extent_min_value: 1.0,
            extent_max_value: 5.0,
            cost_per_acre: 5000.0,
            cost_per_cent: 50.0,
            cost_per_sqft: None,
            total_cost_per_acre: None,
            emi_per_month: Some(2500.0),
            valid_from: None,
            valid_to: None,
            description: None,
        };
        let mut form = TierForm::edit(&tier);
        assert_eq!(form.input(FormInput::EmiPerMonth), "2500.00");

        form.set_input(FormInput::Name, String::new());
        let errors = form
            .draft
            .validate_for_submit(form.mode)
            .expect_err("blank name");
        assert_eq!(errors.issues(), &[ValidationIssue::EmptyName]);

        form.set_input(FormInput::Name, "Standard EMI".to_string());
        assert!(matches!(
            form.draft.validate_for_submit(form.mode),
            Ok(TierSubmission::Update { .. })
        ));
    }
}
