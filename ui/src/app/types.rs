use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use farmplot_core::{
    AppConfig, Crop, CropId, Customer, CustomerId, FarmApi, FetchTicket, Layout, LayoutId, PaymentMode, Plot, PlotId,
    PricingTier, SessionContext, TierId, TokenSource, ViewError,
};

use crate::app::form::FormInput;
use crate::logging::{LogLevel, LogStore, ReloadHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Pricing,
    PlotPricing,
    Debug,
}

/// Pick-list entry; crops are listed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropChoice {
    pub id: CropId,
    pub name: String,
}

impl From<&Crop> for CropChoice {
    fn from(crop: &Crop) -> Self {
        Self {
            id: crop.id.clone(),
            name: crop.name.clone(),
        }
    }
}

impl fmt::Display for CropChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChoice {
    pub id: LayoutId,
    pub name: String,
}

impl From<&Layout> for LayoutChoice {
    fn from(layout: &Layout) -> Self {
        Self {
            id: layout.id.clone(),
            name: format!("{} ({})", layout.name, layout.city),
        }
    }
}

impl fmt::Display for LayoutChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotChoice {
    pub id: PlotId,
    pub label: String,
    pub area_in_acres: f64,
    pub crop_id: Option<CropId>,
    pub customer_id: Option<CustomerId>,
    pub sold: bool,
}

impl From<&Plot> for PlotChoice {
    fn from(plot: &Plot) -> Self {
        Self {
            id: plot.id.clone(),
            label: format!("{} ({} ac)", plot.label(), plot.area_in_acres),
            area_in_acres: plot.area_in_acres,
            crop_id: plot.crop_id.clone(),
            customer_id: plot.customer_id.clone(),
            sold: plot.is_sold,
        }
    }
}

impl fmt::Display for PlotChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Name editor for a new crop, or for renaming the selected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropDialog {
    pub renaming: Option<CropId>,
    pub name: String,
    pub saving: bool,
}

impl CropDialog {
    pub fn create() -> Self {
        Self {
            renaming: None,
            name: String::new(),
            saving: false,
        }
    }

    pub fn rename(crop: &CropChoice) -> Self {
        Self {
            renaming: Some(crop.id.clone()),
            name: crop.name.clone(),
            saving: false,
        }
    }

    /// Trimmed name, when it is worth sending.
    pub fn submittable_name(&self) -> Option<String> {
        let name = self.name.trim();
        (!self.saving && !name.is_empty()).then(|| name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// Dismissible banner at the top of the window.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub summary: String,
    pub detail: Option<String>,
}

impl Notification {
    pub fn info(summary: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            summary: summary.into(),
            detail: None,
        }
    }

    pub fn error(error: &ViewError) -> Self {
        Self {
            kind: NotificationKind::Error,
            summary: error.summary.clone(),
            detail: Some(error.detail.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    LogTick,
    LogLevelChanged(LogLevel),
    ToggleTarget(String, bool),
    CopyDiagnostics,
    ClearLogs,
    LogQueryChanged(String),
    SaveSettings,
    SelectTab(Tab),
    DismissNotification,
    Escape,
    SessionTick,
    CropsLoaded(Result<Vec<Crop>, ViewError>),
    ReloadCrops,
    CatalogCropSelected(CropChoice),
    ReloadCatalog,
    CatalogTiersLoaded {
        crop_id: CropId,
        run_id: u64,
        result: Result<Vec<PricingTier>, ViewError>,
    },
    OpenCreateCrop,
    OpenRenameCrop,
    CropNameChanged(String),
    SubmitCropDialog,
    CropCreated(Result<Crop, ViewError>),
    CropRenamed(Result<Crop, ViewError>),
    RequestDeleteCrop,
    ConfirmDeleteCrop,
    CancelDeleteCrop,
    CropDeleted {
        id: CropId,
        result: Result<(), ViewError>,
    },
    AddTier,
    EditTier(TierId),
    CancelTierEdit,
    TierInputChanged(FormInput, String),
    TierPaymentModeSelected(PaymentMode),
    TierExtentUnitSelected(UnitChoice),
    SubmitTier,
    TierSaved(Result<PricingTier, ViewError>),
    RequestDeleteTier(TierId),
    ConfirmDeleteTier,
    CancelDeleteTier,
    TierDeleted {
        id: TierId,
        result: Result<(), ViewError>,
    },
    LayoutsLoaded(Result<Vec<Layout>, ViewError>),
    LayoutSelected(LayoutChoice),
    PlotsLoaded {
        layout_id: LayoutId,
        result: Result<Vec<Plot>, ViewError>,
    },
    PlotSelected(PlotChoice),
    CustomersLoaded(Result<Vec<Customer>, ViewError>),
    PricingCropSelected(CropChoice),
    PricingTiersFetched {
        ticket: FetchTicket,
        result: Result<Vec<PricingTier>, ViewError>,
    },
    AreaInputChanged(String),
    DownPaymentInputChanged(String),
    PricingModeSelected(PaymentMode),
    RetryPricing,
    ClearPricingCrop,
}

/// Extent unit entry for the tier editor's pick list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitChoice(pub farmplot_core::ExtentUnit);

impl fmt::Display for UnitChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

pub struct Flags {
    pub log_store: LogStore,
    pub reload_handle: ReloadHandle,
    pub log_level: LogLevel,
    pub config: AppConfig,
    pub api: Arc<dyn FarmApi>,
    pub session: SessionContext,
    pub token_source: TokenSource,
    /// Where "Save settings" writes the config.
    pub config_path: PathBuf,
}
