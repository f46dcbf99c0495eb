use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type EpochSeconds = u64;

/// Fixed area conversion used by every cost figure.
pub const CENTS_PER_ACRE: f64 = 100.0;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(CropId);
string_id!(TierId);
string_id!(LayoutId);
string_id!(PlotId);
string_id!(CustomerId);

const TEMPORARY_TIER_PREFIX: &str = "draft-";

impl TierId {
    /// Client-side placeholder for a tier the server has not assigned an id to yet.
    pub fn temporary(stamp_millis: u128) -> Self {
        Self(format!("{TEMPORARY_TIER_PREFIX}{stamp_millis}"))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_TIER_PREFIX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
    #[serde(rename = "OUT-RIGHT", alias = "OUTRIGHT", alias = "CASH")]
    Outright,
    #[serde(rename = "EMI")]
    Emi,
}

impl PaymentMode {
    pub const ALL: [PaymentMode; 2] = [PaymentMode::Outright, PaymentMode::Emi];

    pub fn label(self) -> &'static str {
        match self {
            PaymentMode::Outright => "CASH",
            PaymentMode::Emi => "EMI",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Area unit a tier range is expressed in. Only acres take part in cost math.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExtentUnit {
    Acre,
    Cent,
    Sqft,
    Other(String),
}

impl ExtentUnit {
    pub const KNOWN: [ExtentUnit; 3] = [ExtentUnit::Acre, ExtentUnit::Cent, ExtentUnit::Sqft];

    pub fn as_str(&self) -> &str {
        match self {
            ExtentUnit::Acre => "acre",
            ExtentUnit::Cent => "cent",
            ExtentUnit::Sqft => "sqft",
            ExtentUnit::Other(value) => value,
        }
    }
}

impl From<String> for ExtentUnit {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "acre" | "acres" => ExtentUnit::Acre,
            "cent" | "cents" => ExtentUnit::Cent,
            "sqft" | "sq ft" | "square feet" => ExtentUnit::Sqft,
            _ => ExtentUnit::Other(value),
        }
    }
}

impl From<ExtentUnit> for String {
    fn from(value: ExtentUnit) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ExtentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TierStatus {
    #[default]
    #[serde(rename = "Active", alias = "ACTIVE", alias = "active")]
    Active,
    #[serde(rename = "Inactive", alias = "INACTIVE", alias = "inactive")]
    Inactive,
}

impl fmt::Display for TierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierStatus::Active => f.write_str("Active"),
            TierStatus::Inactive => f.write_str("Inactive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingTier {
    pub id: TierId,
    pub crop_id: CropId,
    pub name: String,
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub status: TierStatus,
    pub extent_unit: ExtentUnit,
    pub extent_min_value: f64,
    pub extent_max_value: f64,
    pub cost_per_acre: f64,
    #[serde(default)]
    pub cost_per_cent: f64,
    #[serde(default)]
    pub cost_per_sqft: Option<f64>,
    #[serde(default)]
    pub total_cost_per_acre: Option<f64>,
    #[serde(default)]
    pub emi_per_month: Option<f64>,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

impl PricingTier {
    /// Inclusive on both bounds.
    pub fn contains_area(&self, area_in_acres: f64) -> bool {
        self.extent_min_value <= area_in_acres && area_in_acres <= self.extent_max_value
    }

    pub fn overlaps(&self, other: &PricingTier) -> bool {
        self.extent_min_value <= other.extent_max_value
            && other.extent_min_value <= self.extent_max_value
    }

    pub fn range_label(&self) -> String {
        format!(
            "{}-{} {}",
            self.extent_min_value, self.extent_max_value, self.extent_unit
        )
    }
}

/// Create request body; the server assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPricingTier {
    pub crop_id: CropId,
    pub name: String,
    pub payment_mode: PaymentMode,
    pub status: TierStatus,
    pub extent_unit: ExtentUnit,
    pub extent_min_value: f64,
    pub extent_max_value: f64,
    pub cost_per_acre: f64,
    pub cost_per_cent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost_per_acre: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emi_per_month: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewPricingTier {
    pub fn into_tier(self, id: TierId) -> PricingTier {
        PricingTier {
            id,
            crop_id: self.crop_id,
            name: self.name,
            payment_mode: self.payment_mode,
            status: self.status,
            extent_unit: self.extent_unit,
            extent_min_value: self.extent_min_value,
            extent_max_value: self.extent_max_value,
            cost_per_acre: self.cost_per_acre,
            cost_per_cent: self.cost_per_cent,
            cost_per_sqft: self.cost_per_sqft,
            total_cost_per_acre: self.total_cost_per_acre,
            emi_per_month: self.emi_per_month,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            description: self.description,
        }
    }
}

/// Update request body. Outer `None` leaves the field untouched on the server,
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_id: Option<CropId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_mode: Option<PaymentMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent_unit: Option<ExtentUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent_min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent_max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_acre: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_cent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_sqft: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost_per_acre: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emi_per_month: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl TierPatch {
    /// Patch that replaces every editable field of a tier.
    pub fn replace_all(tier: NewPricingTier) -> Self {
        Self {
            crop_id: Some(tier.crop_id),
            name: Some(tier.name),
            payment_mode: Some(tier.payment_mode),
            extent_unit: Some(tier.extent_unit),
            extent_min_value: Some(tier.extent_min_value),
            extent_max_value: Some(tier.extent_max_value),
            cost_per_acre: Some(tier.cost_per_acre),
            cost_per_cent: Some(tier.cost_per_cent),
            cost_per_sqft: Some(tier.cost_per_sqft),
            total_cost_per_acre: Some(tier.total_cost_per_acre),
            emi_per_month: Some(tier.emi_per_month),
            valid_from: Some(tier.valid_from),
            valid_to: Some(tier.valid_to),
            description: Some(tier.description),
        }
    }

    pub fn apply_to(self, tier: &mut PricingTier) {
        if let Some(value) = self.crop_id {
            tier.crop_id = value;
        }
        if let Some(value) = self.name {
            tier.name = value;
        }
        if let Some(value) = self.payment_mode {
            tier.payment_mode = value;
        }
        if let Some(value) = self.extent_unit {
            tier.extent_unit = value;
        }
        if let Some(value) = self.extent_min_value {
            tier.extent_min_value = value;
        }
        if let Some(value) = self.extent_max_value {
            tier.extent_max_value = value;
        }
        if let Some(value) = self.cost_per_acre {
            tier.cost_per_acre = value;
        }
        if let Some(value) = self.cost_per_cent {
            tier.cost_per_cent = value;
        }
        if let Some(value) = self.cost_per_sqft {
            tier.cost_per_sqft = value;
        }
        if let Some(value) = self.total_cost_per_acre {
            tier.total_cost_per_acre = value;
        }
        if let Some(value) = self.emi_per_month {
            tier.emi_per_month = value;
        }
        if let Some(value) = self.valid_from {
            tier.valid_from = value;
        }
        if let Some(value) = self.valid_to {
            tier.valid_to = value;
        }
        if let Some(value) = self.description {
            tier.description = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub id: CropId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCrop {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub id: LayoutId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    pub area_in_acres: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub center_coordinates: Option<Coordinates>,
    #[serde(default)]
    pub number_of_plots: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub id: PlotId,
    pub layout_id: LayoutId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub crop_id: Option<CropId>,
    pub number: String,
    pub name: String,
    pub area_in_acres: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_sold: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub center_coordinates: Option<Coordinates>,
}

impl Plot {
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            format!("LP {}", self.number)
        } else {
            format!("LP {} - {}", self.number, self.name)
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

impl Customer {
    pub fn display_name(&self) -> String {
        let middle = self
            .middle_name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        match middle {
            Some(middle) => format!("{} {} {}", self.first_name, middle, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_tier_decodes_api_payload() {
        let payload = r#"{
            "id": "p-17",
            "crop_id": "mango",
            "name": "Small holdings",
            "payment_mode": "OUT-RIGHT",
            "status": "Active",
            "extent_unit": "acre",
            "extent_min_value": 1,
            "extent_max_value": 5,
            "cost_per_acre": 5000,
            "cost_per_cent": 50,
            "cost_per_sqft": null,
            "valid_from": "2024-04-01",
            "valid_to": "2025-03-31"
        }"#;

        let tier: PricingTier = serde_json::from_str(payload).expect("decode tier");
        assert_eq!(tier.payment_mode, PaymentMode::Outright);
        assert_eq!(tier.extent_unit, ExtentUnit::Acre);
        assert_eq!(tier.status, TierStatus::Active);
        assert_eq!(tier.cost_per_sqft, None);
        assert_eq!(
            tier.valid_from,
            NaiveDate::from_ymd_opt(2024, 4, 1)
        );
        assert!(tier.contains_area(1.0));
        assert!(tier.contains_area(5.0));
        assert!(!tier.contains_area(5.01));
    }

    #[test]
    fn unknown_extent_unit_is_kept_verbatim() {
        let unit: ExtentUnit = serde_json::from_str("\"hectare\"").expect("decode unit");
        assert_eq!(unit, ExtentUnit::Other("hectare".to_string()));
        assert_eq!(serde_json::to_string(&unit).expect("encode"), "\"hectare\"");
    }

    #[test]
    fn patch_distinguishes_untouched_from_cleared() {
        let patch = TierPatch {
            name: Some("Renamed".to_string()),
            emi_per_month: Some(None),
            ..TierPatch::default()
        };
        let json = serde_json::to_value(&patch).expect("encode patch");
        assert_eq!(json["name"], "Renamed");
        assert!(json["emi_per_month"].is_null());
        assert!(json.get("cost_per_acre").is_none());
    }

    #[test]
    fn temporary_ids_are_recognised() {
        assert!(TierId::temporary(1_725_000_000_000).is_temporary());
        assert!(!TierId::new("p-17").is_temporary());
    }

    #[test]
    fn customer_display_name_skips_blank_middle_name() {
        let customer = Customer {
            id: CustomerId::new("c-1"),
            first_name: "Asha".to_string(),
            middle_name: Some("  ".to_string()),
            last_name: "Rao".to_string(),
            phone: None,
            email: None,
            city: None,
        };
        assert_eq!(customer.display_name(), "Asha Rao");
    }
}
