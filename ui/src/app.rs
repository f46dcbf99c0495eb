mod actions;
mod constants;
mod form;
mod helpers;
mod styles;
mod types;
mod views;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use iced::keyboard;
use iced::widget::{column, container};
use iced::{Application, Command, Element, Length, Subscription, Theme};

use farmplot_core::{
    AppConfig, CropId, Customer, FarmApi, PlotPricingView, PricingCatalog, SessionContext, TierId,
    TokenSource, ViewError, targets,
};

use crate::app::constants::{LOG_TICK_MS, SESSION_CHECK_SECS, WINDOW_TITLE};
use crate::app::form::TierForm;
use crate::app::helpers::escape_key_event;
use crate::logging::{LogEntry, LogLevel, LogStore, ReloadHandle};

pub use crate::app::form::FormInput;
pub use crate::app::types::{
    CropChoice, CropDialog, Flags, LayoutChoice, Message, Notification, NotificationKind,
    PlotChoice, Tab, UnitChoice,
};

pub struct FarmPlotApp {
    log_store: LogStore,
    reload_handle: ReloadHandle,
    log_entries: Vec<LogEntry>,
    log_level: LogLevel,
    known_targets: HashSet<String>,
    enabled_targets: HashSet<String>,
    log_query: String,
    copy_status: Option<String>,
    config: AppConfig,
    config_path: PathBuf,
    api: Arc<dyn FarmApi>,
    session: SessionContext,
    token_source: TokenSource,
    session_expired: bool,
    active_tab: Tab,
    notification: Option<Notification>,
    crops: Vec<CropChoice>,
    crops_loading: bool,
    catalog: PricingCatalog,
    catalog_crop: Option<CropChoice>,
    catalog_run_id: u64,
    catalog_loading: bool,
    catalog_error: Option<ViewError>,
    crop_dialog: Option<CropDialog>,
    pending_crop_delete: Option<CropId>,
    deleting_crop: bool,
    tier_form: Option<TierForm>,
    pending_delete: Option<TierId>,
    deleting: HashSet<TierId>,
    layouts: Vec<LayoutChoice>,
    selected_layout: Option<LayoutChoice>,
    plots: Vec<PlotChoice>,
    plots_loading: bool,
    selected_plot: Option<PlotChoice>,
    customers: Vec<Customer>,
    pricing: PlotPricingView,
    pricing_crop: Option<CropChoice>,
    area_input: String,
    down_payment_input: String,
    area_error: Option<String>,
    down_payment_error: Option<String>,
}

impl Application for FarmPlotApp {
    type Executor = crate::executor::FarmApiExecutor;
    type Message = Message;
    type Theme = Theme;
    type Flags = Flags;

    fn new(flags: Flags) -> (Self, Command<Message>) {
        let known_targets: HashSet<String> =
            targets::ALL.iter().map(|value| value.to_string()).collect();
        let enabled_targets = known_targets.clone();

        let mut pricing = PlotPricingView::new();
        let down_payment = flags.config.default_down_payment();
        let down_payment_input = down_payment.map(|value| value.to_string()).unwrap_or_default();
        if let Err(rejected) = pricing.set_down_payment(down_payment) {
            tracing::warn!(
                target: targets::PRICING,
                "Configured down payment ignored: {}",
                rejected
            );
        }

        tracing::info!(
            target: targets::UI,
            authenticated = flags.session.is_authenticated(),
            offline = flags.config.offline_demo,
            "Pricing window opened"
        );

        let mut app = Self {
            log_store: flags.log_store,
            reload_handle: flags.reload_handle,
            log_entries: Vec::new(),
            log_level: flags.log_level,
            known_targets,
            enabled_targets,
            log_query: String::new(),
            copy_status: None,
            config: flags.config,
            config_path: flags.config_path,
            api: flags.api,
            session: flags.session,
            token_source: flags.token_source,
            session_expired: false,
            active_tab: Tab::Pricing,
            notification: None,
            crops: Vec::new(),
            crops_loading: false,
            catalog: PricingCatalog::new(),
            catalog_crop: None,
            catalog_run_id: 0,
            catalog_loading: false,
            catalog_error: None,
            crop_dialog: None,
            pending_crop_delete: None,
            deleting_crop: false,
            tier_form: None,
            pending_delete: None,
            deleting: HashSet::new(),
            layouts: Vec::new(),
            selected_layout: None,
            plots: Vec::new(),
            plots_loading: false,
            selected_plot: None,
            customers: Vec::new(),
            pricing,
            pricing_crop: None,
            area_input: String::new(),
            down_payment_input,
            area_error: None,
            down_payment_error: None,
        };
        app.check_session();

        let startup = Command::batch(vec![
            app.load_crops(),
            app.load_layouts(),
            app.load_customers(),
        ]);
        (app, startup)
    }

    fn title(&self) -> String {
        WINDOW_TITLE.to_string()
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::LogTick => {
                self.refresh_logs();
                Command::none()
            }
            Message::LogLevelChanged(level) => {
                self.set_log_level(level);
                Command::none()
            }
            Message::ToggleTarget(target, enabled) => {
                if enabled {
                    self.enabled_targets.insert(target);
                } else {
                    self.enabled_targets.remove(&target);
                }
                Command::none()
            }
            Message::CopyDiagnostics => {
                self.copy_status = Some(self.copy_diagnostics());
                Command::none()
            }
            Message::ClearLogs => {
                self.log_store.clear();
                self.log_entries.clear();
                Command::none()
            }
            Message::LogQueryChanged(query) => {
                self.log_query = query;
                Command::none()
            }
            Message::SaveSettings => {
                self.save_settings();
                Command::none()
            }
            Message::SelectTab(tab) => self.select_tab(tab),
            Message::DismissNotification => {
                self.notification = None;
                Command::none()
            }
            Message::Escape => {
                self.close_dialogs();
                Command::none()
            }
            Message::CropsLoaded(result) => {
                self.handle_crops_loaded(result);
                Command::none()
            }
            Message::ReloadCrops => self.load_crops(),
            Message::CatalogCropSelected(choice) => self.select_catalog_crop(choice),
            Message::ReloadCatalog => self.reload_catalog(),
            Message::CatalogTiersLoaded {
                crop_id,
                run_id,
                result,
            } => {
                self.handle_catalog_tiers(crop_id, run_id, result);
                Command::none()
            }
            Message::OpenCreateCrop => {
                self.open_create_crop();
                Command::none()
            }
            Message::OpenRenameCrop => {
                self.open_rename_crop();
                Command::none()
            }
            Message::CropNameChanged(value) => {
                if let Some(dialog) = self.crop_dialog.as_mut() {
                    dialog.name = value;
                }
                Command::none()
            }
            Message::SubmitCropDialog => self.submit_crop_dialog(),
            Message::CropCreated(result) => self.handle_crop_created(result),
            Message::CropRenamed(result) => {
                self.handle_crop_renamed(result);
                Command::none()
            }
            Message::RequestDeleteCrop => {
                self.request_delete_crop();
                Command::none()
            }
            Message::ConfirmDeleteCrop => self.confirm_delete_crop(),
            Message::CancelDeleteCrop => {
                self.pending_crop_delete = None;
                Command::none()
            }
            Message::CropDeleted { id, result } => {
                self.handle_crop_deleted(id, result);
                Command::none()
            }
            Message::AddTier => {
                self.open_tier_create();
                Command::none()
            }
            Message::EditTier(id) => {
                self.open_tier_edit(&id);
                Command::none()
            }
            Message::CancelTierEdit => {
                self.tier_form = None;
                Command::none()
            }
            Message::TierInputChanged(input, value) => {
                if let Some(form) = self.tier_form.as_mut() {
                    form.set_input(input, value);
                }
                Command::none()
            }
            Message::TierPaymentModeSelected(mode) => {
                if let Some(form) = self.tier_form.as_mut() {
                    form.set_payment_mode(mode);
                }
                Command::none()
            }
            Message::TierExtentUnitSelected(unit) => {
                if let Some(form) = self.tier_form.as_mut() {
                    form.set_extent_unit(unit.0);
                }
                Command::none()
            }
            Message::SubmitTier => self.submit_tier(),
            Message::TierSaved(result) => self.handle_tier_saved(result),
            Message::RequestDeleteTier(id) => {
                if self.require_edit_rights("delete tiers") {
                    self.pending_delete = Some(id);
                }
                Command::none()
            }
            Message::ConfirmDeleteTier => self.confirm_delete_tier(),
            Message::CancelDeleteTier => {
                self.pending_delete = None;
                Command::none()
            }
            Message::TierDeleted { id, result } => self.handle_tier_deleted(id, result),
            Message::LayoutsLoaded(result) => {
                self.handle_layouts_loaded(result);
                Command::none()
            }
            Message::LayoutSelected(choice) => self.select_layout(choice),
            Message::PlotsLoaded { layout_id, result } => {
                self.handle_plots_loaded(layout_id, result);
                Command::none()
            }
            Message::PlotSelected(choice) => self.select_plot(choice),
            Message::CustomersLoaded(result) => {
                self.handle_customers_loaded(result);
                Command::none()
            }
            Message::PricingCropSelected(choice) => self.select_pricing_crop(choice),
            Message::PricingTiersFetched { ticket, result } => {
                self.handle_pricing_fetched(&ticket, result);
                Command::none()
            }
            Message::AreaInputChanged(value) => {
                self.set_area_input(value);
                Command::none()
            }
            Message::DownPaymentInputChanged(value) => {
                self.set_down_payment_input(value);
                Command::none()
            }
            Message::PricingModeSelected(mode) => {
                let next = if self.pricing.payment_mode() == Some(mode) {
                    None
                } else {
                    Some(mode)
                };
                self.pricing.set_payment_mode(next);
                Command::none()
            }
            Message::RetryPricing => match self.pricing.retry() {
                Some(ticket) => self.fetch_pricing(ticket),
                None => Command::none(),
            },
            Message::ClearPricingCrop => {
                self.pricing.clear_crop();
                self.pricing_crop = None;
                Command::none()
            }
            Message::SessionTick => {
                self.check_session();
                Command::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let log_tick = iced::time::every(Duration::from_millis(LOG_TICK_MS)).map(|_| Message::LogTick);
        let session_tick =
            iced::time::every(Duration::from_secs(SESSION_CHECK_SECS)).map(|_| Message::SessionTick);
        let escape_key = keyboard::on_key_press(escape_key_event);
        Subscription::batch(vec![log_tick, session_tick, escape_key])
    }

    fn view(&self) -> Element<'_, Message> {
        let body = match self.active_tab {
            Tab::Pricing => self.pricing_tab_view(),
            Tab::PlotPricing => self.plot_pricing_tab_view(),
            Tab::Debug => self.debug_tab_view(),
        };

        let mut content = column![self.header_view(), self.tab_bar()].spacing(16);
        if let Some(notification) = self.notification_view() {
            content = content.push(notification);
        }
        content = content.push(body);

        container(content.padding(16))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
