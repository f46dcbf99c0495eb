pub mod api;
pub mod catalog;
pub mod config;
pub mod costs;
pub mod editor;
pub mod error;
pub mod model;
pub mod session;
pub mod targets;
pub mod view;

pub use api::{ApiConfig, ApiFuture, FarmApi, HttpFarmApi, MockFarmApi};
pub use catalog::{PricingCatalog, find_applicable_tier, find_applicable_tier_for_mode};
pub use config::{AppConfig, config_path};
pub use costs::{
    CostBreakdown, InvalidNumber, compute_costs, format_amount, installment_count,
    parse_decimal_input, round2,
};
pub use editor::{
    EditMode, TierDraft, TierField, TierSubmission, ValidationErrors, ValidationIssue,
    submit_draft,
};
pub use error::{Error, StorageAction};
pub use model::{
    CENTS_PER_ACRE, Coordinates, Crop, CropId, Customer, CustomerId, EpochSeconds, ExtentUnit,
    Layout, LayoutId, NewCrop, NewPricingTier, PaymentMode, Plot, PlotId, PricingTier, TierId,
    TierPatch, TierStatus,
};
pub use session::{ID_TOKEN_ENV, SessionContext, TokenSource};
pub use view::{
    FetchTicket, InputRejected, PlotPricingView, PricingDisplay, PricingState, ViewError,
};
