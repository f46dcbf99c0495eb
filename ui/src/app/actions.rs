use std::sync::Arc;

use iced::Command;

use farmplot_core::{
    Crop, CropId, Customer, FetchTicket, Layout, LayoutId, Plot, PricingTier, TierId, ViewError,
    parse_decimal_input, submit_draft, targets,
};

use crate::app::FarmPlotApp;
use crate::app::constants::{DIAGNOSTIC_LOG_LINES, SESSION_REFRESH_SKEW_SECS};
use crate::app::form::TierForm;
use crate::app::helpers::now_epoch_seconds;
use crate::app::types::{
    CropChoice, CropDialog, LayoutChoice, Message, Notification, PlotChoice, Tab,
};
use crate::logging::{LogEntry, LogLevel, apply_log_level};

impl FarmPlotApp {
    pub(super) fn refresh_logs(&mut self) {
        let last_seen = self.log_entries.last().map_or(0, |entry| entry.sequence);
        let fresh = self.log_store.since(last_seen);
        if fresh.is_empty() {
            return;
        }
        for entry in &fresh {
            if self.known_targets.insert(entry.target.clone()) {
                self.enabled_targets.insert(entry.target.clone());
            }
        }
        self.log_entries.extend(fresh);
        let excess = self
            .log_entries
            .len()
            .saturating_sub(self.log_store.capacity());
        self.log_entries.drain(..excess);
    }

    pub(super) fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
        match apply_log_level(&self.reload_handle, level) {
            Ok(()) => tracing::info!(target: targets::UI, "Log level set to {}", level),
            Err(error) => {
                tracing::warn!(target: targets::UI, error = %error, "Log level not applied");
            }
        }
    }

    /// Writes the chosen log level back to the config file.
    pub(super) fn save_settings(&mut self) {
        self.config.log_level = self.log_level.as_str().to_string();
        match self.config.save(&self.config_path) {
            Ok(()) => {
                tracing::info!(
                    target: targets::STORAGE,
                    path = %self.config_path.display(),
                    "Settings saved"
                );
                self.notification = Some(Notification::info(format!(
                    "Settings saved to {}.",
                    self.config_path.display()
                )));
            }
            Err(error) => self.show_error(&ViewError::from(error)),
        }
    }

    pub(super) fn sorted_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.known_targets.iter().cloned().collect();
        targets.sort();
        targets
    }

    pub(super) fn visible_entries(&self) -> Vec<&LogEntry> {
        self.log_entries
            .iter()
            .filter(|entry| self.enabled_targets.contains(&entry.target))
            .filter(|entry| entry.mentions(&self.log_query))
            .collect()
    }

    pub(super) fn copy_diagnostics(&self) -> String {
        let text = self.diagnostics_text();
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
            Ok(()) => {
                tracing::info!(target: targets::UI, "Diagnostics copied to clipboard");
                "Copied".to_string()
            }
            Err(error) => {
                tracing::warn!(target: targets::UI, "Clipboard copy failed: {}", error);
                format!("Failed: {error}")
            }
        }
    }

    pub(super) fn diagnostics_text(&self) -> String {
        let mut output = String::new();
        output.push_str("Farm plot pricing diagnostics\n");
        output.push_str(&format!("Log level: {}\n", self.log_level));
        output.push_str(&format!(
            "API: {}{}\n",
            self.config.api_base_url,
            if self.config.offline_demo { " (offline demo)" } else { "" }
        ));
        output.push_str(&format!(
            "Session: authenticated={} groups=[{}] expired={}\n",
            self.session.is_authenticated(),
            self.session.groups().join(", "),
            self.session_expired
        ));
        if let Some(crop) = &self.catalog_crop {
            output.push_str(&format!(
                "Catalog crop: {} ({}), {} tiers\n",
                crop.name,
                crop.id,
                self.catalog.tiers_for_crop(&crop.id).len()
            ));
            for (first, second) in self.catalog.overlapping_pairs(&crop.id) {
                output.push_str(&format!("Overlapping tiers: {first} / {second}\n"));
            }
        }
        if let Some(plot) = &self.selected_plot {
            output.push_str(&format!("Selected plot: {} ({})\n", plot.label, plot.id));
        }
        output.push_str(&format!("Pricing state: {:?}\n", self.pricing.state()));
        if let Some(banner) = self.pricing.error_banner() {
            output.push_str(&format!("Pricing error: {}\n", banner.detail));
        }
        output.push_str(&format!(
            "Targets enabled: {}\n",
            self.sorted_targets()
                .into_iter()
                .filter(|target| self.enabled_targets.contains(target))
                .collect::<Vec<String>>()
                .join(", ")
        ));
        output.push_str("Recent logs:\n");

        let entries = self.visible_entries();
        let start = entries.len().saturating_sub(DIAGNOSTIC_LOG_LINES);
        for entry in entries.into_iter().skip(start) {
            output.push_str(&entry.format_line());
            output.push('\n');
        }

        output
    }

    pub(super) fn select_tab(&mut self, tab: Tab) -> Command<Message> {
        if self.active_tab == tab {
            return Command::none();
        }
        let leaving_pricing = self.active_tab == Tab::PlotPricing;
        self.active_tab = tab;

        if leaving_pricing {
            self.pricing.cancel();
            self.pricing_crop = None;
            return Command::none();
        }
        if tab == Tab::PlotPricing {
            let crop = self
                .selected_plot
                .as_ref()
                .and_then(|plot| plot.crop_id.as_ref())
                .and_then(|crop_id| self.crop_choice(crop_id));
            if let Some(choice) = crop {
                return self.select_pricing_crop(choice);
            }
        }
        Command::none()
    }

    pub(super) fn close_dialogs(&mut self) {
        if self.tier_form.as_ref().is_some_and(|form| form.saving) {
            return;
        }
        self.tier_form = None;
        self.pending_delete = None;
        self.pending_crop_delete = None;
        if self.crop_dialog.as_ref().is_some_and(|dialog| !dialog.saving) {
            self.crop_dialog = None;
        }
    }

    pub(super) fn check_session(&mut self) {
        self.check_session_at(now_epoch_seconds());
    }

    /// Near expiry the token source is read again; a newer token replaces the
    /// session and the API client. Editing stays off while the session is expired.
    pub(super) fn check_session_at(&mut self, now: u64) {
        if !self.session.is_authenticated() {
            return;
        }
        if self.session.needs_refresh(now, SESSION_REFRESH_SKEW_SECS) {
            self.refresh_session(now);
        }

        let expired = self.session.is_expired(now);
        if expired && !self.session_expired {
            tracing::warn!(target: targets::SESSION, "Session expired; editing disabled");
            self.notification = Some(Notification::info(
                "Your session has expired. Sign in again to keep editing tiers.",
            ));
        } else if !expired && self.session_expired {
            tracing::info!(target: targets::SESSION, "Session renewed; editing enabled");
            self.notification = Some(Notification::info("Session renewed."));
        }
        self.session_expired = expired;
    }

    fn refresh_session(&mut self, now: u64) {
        match self.session.refresh_from(&self.token_source, now) {
            Ok(Some(next)) => {
                tracing::info!(
                    target: targets::SESSION,
                    expires_at = next.expires_at(),
                    "Session refreshed from token source"
                );
                self.api = self.api.authenticated(next.clone());
                self.session = next;
            }
            Ok(None) => {
                tracing::debug!(
                    target: targets::SESSION,
                    expires_at = self.session.expires_at(),
                    "Session close to expiry; no newer token yet"
                );
            }
            Err(error) => {
                tracing::warn!(
                    target: targets::SESSION,
                    error = %error.technical_detail(),
                    "Token source unreadable"
                );
            }
        }
    }

    /// Offline demo mode edits freely; otherwise an unexpired agent session is needed.
    pub(super) fn can_edit(&self) -> bool {
        if self.config.offline_demo {
            return true;
        }
        !self.session_expired && self.session.has_any_group(&self.config.agent_groups)
    }

    pub(super) fn require_edit_rights(&mut self, action: &str) -> bool {
        if self.can_edit() {
            return true;
        }
        tracing::info!(target: targets::SESSION, action, "Edit refused without agent rights");
        self.notification = Some(Notification::info(format!(
            "Only agents can {action}."
        )));
        false
    }

    fn crop_choice(&self, crop_id: &CropId) -> Option<CropChoice> {
        self.crops.iter().find(|choice| &choice.id == crop_id).cloned()
    }

    fn show_error(&mut self, error: &ViewError) {
        self.notification = Some(Notification::error(error));
    }

    pub(super) fn load_crops(&mut self) -> Command<Message> {
        self.crops_loading = true;
        let api = Arc::clone(&self.api);
        Command::perform(
            async move { api.list_crops().await.map_err(ViewError::from) },
            Message::CropsLoaded,
        )
    }

    pub(super) fn handle_crops_loaded(&mut self, result: Result<Vec<Crop>, ViewError>) {
        self.crops_loading = false;
        match result {
            Ok(crops) => {
                tracing::debug!(target: targets::CATALOG, count = crops.len(), "Crops loaded");
                self.crops = crops.iter().map(CropChoice::from).collect();
                self.sort_crops();
            }
            Err(error) => self.show_error(&error),
        }
    }

    pub(super) fn select_catalog_crop(&mut self, choice: CropChoice) -> Command<Message> {
        let crop_id = choice.id.clone();
        self.catalog_crop = Some(choice);
        self.tier_form = None;
        self.pending_delete = None;
        self.catalog_error = None;
        if self.catalog.is_loaded(&crop_id) {
            self.catalog_run_id = self.catalog_run_id.wrapping_add(1);
            self.catalog_loading = false;
            return Command::none();
        }
        self.fetch_catalog_tiers(crop_id)
    }

    /// The current tiers stay in the catalog until the reload succeeds.
    pub(super) fn reload_catalog(&mut self) -> Command<Message> {
        let Some(crop_id) = self.catalog_crop.as_ref().map(|choice| choice.id.clone()) else {
            return Command::none();
        };
        self.fetch_catalog_tiers(crop_id)
    }

    fn fetch_catalog_tiers(&mut self, crop_id: CropId) -> Command<Message> {
        self.catalog_run_id = self.catalog_run_id.wrapping_add(1);
        self.catalog_loading = true;
        let run_id = self.catalog_run_id;
        let api = Arc::clone(&self.api);
        let request_crop = crop_id.clone();
        Command::perform(
            async move {
                api.list_pricing_tiers(request_crop)
                    .await
                    .map_err(ViewError::from)
            },
            move |result| Message::CatalogTiersLoaded {
                crop_id,
                run_id,
                result,
            },
        )
    }

    pub(super) fn handle_catalog_tiers(
        &mut self,
        crop_id: CropId,
        run_id: u64,
        result: Result<Vec<PricingTier>, ViewError>,
    ) {
        if run_id != self.catalog_run_id {
            tracing::debug!(
                target: targets::CATALOG,
                crop = %crop_id,
                run_id,
                "Dropping stale catalog load"
            );
            return;
        }
        self.catalog_loading = false;
        match result {
            Ok(tiers) => {
                self.catalog_error = None;
                self.catalog.replace_crop(crop_id, tiers);
            }
            Err(error) => {
                tracing::warn!(
                    target: targets::CATALOG,
                    crop = %crop_id,
                    kept = self.catalog.tiers_for_crop(&crop_id).len(),
                    "Catalog reload failed; keeping loaded tiers"
                );
                self.catalog_error = Some(error.clone());
                self.show_error(&error);
            }
        }
    }

    pub(super) fn open_create_crop(&mut self) {
        if self.require_edit_rights("create crops") {
            self.pending_crop_delete = None;
            self.crop_dialog = Some(CropDialog::create());
        }
    }

    pub(super) fn open_rename_crop(&mut self) {
        let Some(crop) = self.catalog_crop.clone() else {
            return;
        };
        if self.require_edit_rights("rename crops") {
            self.pending_crop_delete = None;
            self.crop_dialog = Some(CropDialog::rename(&crop));
        }
    }

    pub(super) fn submit_crop_dialog(&mut self) -> Command<Message> {
        let Some(dialog) = self.crop_dialog.as_mut() else {
            return Command::none();
        };
        let Some(name) = dialog.submittable_name() else {
            return Command::none();
        };
        dialog.saving = true;
        let api = Arc::clone(&self.api);
        match dialog.renaming.clone() {
            Some(id) => Command::perform(
                async move { api.update_crop(id, name).await.map_err(ViewError::from) },
                Message::CropRenamed,
            ),
            None => Command::perform(
                async move { api.create_crop(name).await.map_err(ViewError::from) },
                Message::CropCreated,
            ),
        }
    }

    fn crop_dialog_failed(&mut self, error: &ViewError) {
        if let Some(dialog) = self.crop_dialog.as_mut() {
            dialog.saving = false;
        }
        self.show_error(error);
    }

    pub(super) fn handle_crop_created(
        &mut self,
        result: Result<Crop, ViewError>,
    ) -> Command<Message> {
        match result {
            Ok(crop) => {
                tracing::info!(target: targets::CATALOG, crop = %crop.id, name = %crop.name, "Crop created");
                self.crop_dialog = None;
                self.notification = Some(Notification::info(format!("Crop '{}' created.", crop.name)));
                let choice = CropChoice::from(&crop);
                self.crops.push(choice.clone());
                self.sort_crops();
                self.select_catalog_crop(choice)
            }
            Err(error) => {
                self.crop_dialog_failed(&error);
                Command::none()
            }
        }
    }

    /// Every selector showing the crop picks up the new name.
    pub(super) fn handle_crop_renamed(&mut self, result: Result<Crop, ViewError>) {
        let crop = match result {
            Ok(crop) => crop,
            Err(error) => {
                self.crop_dialog_failed(&error);
                return;
            }
        };
        tracing::info!(target: targets::CATALOG, crop = %crop.id, name = %crop.name, "Crop renamed");
        self.crop_dialog = None;
        self.notification = Some(Notification::info(format!("Crop renamed to '{}'.", crop.name)));

        let renamed = CropChoice::from(&crop);
        for choice in self
            .crops
            .iter_mut()
            .chain(self.catalog_crop.as_mut())
            .chain(self.pricing_crop.as_mut())
        {
            if choice.id == renamed.id {
                *choice = renamed.clone();
            }
        }
        self.sort_crops();
    }

    pub(super) fn request_delete_crop(&mut self) {
        let Some(crop_id) = self.catalog_crop.as_ref().map(|choice| choice.id.clone()) else {
            return;
        };
        if self.require_edit_rights("delete crops") {
            self.crop_dialog = None;
            self.pending_crop_delete = Some(crop_id);
        }
    }

    pub(super) fn confirm_delete_crop(&mut self) -> Command<Message> {
        let Some(id) = self.pending_crop_delete.take() else {
            return Command::none();
        };
        if self.deleting_crop {
            return Command::none();
        }
        self.deleting_crop = true;
        let api = Arc::clone(&self.api);
        let request_id = id.clone();
        Command::perform(
            async move { api.delete_crop(request_id).await.map_err(ViewError::from) },
            move |result| Message::CropDeleted { id, result },
        )
    }

    /// The crop leaves the selectors, the catalog and an open pricing view.
    pub(super) fn handle_crop_deleted(&mut self, id: CropId, result: Result<(), ViewError>) {
        self.deleting_crop = false;
        if let Err(error) = result {
            self.show_error(&error);
            return;
        }
        tracing::info!(target: targets::CATALOG, crop = %id, "Crop deleted");

        let name = self
            .crop_choice(&id)
            .map(|choice| choice.name)
            .unwrap_or_else(|| id.to_string());
        self.notification = Some(Notification::info(format!("Crop '{name}' deleted.")));
        self.crops.retain(|choice| choice.id != id);
        self.catalog.invalidate(&id);

        if self.catalog_crop.as_ref().is_some_and(|choice| choice.id == id) {
            self.catalog_crop = None;
            self.catalog_run_id = self.catalog_run_id.wrapping_add(1);
            self.catalog_loading = false;
            self.catalog_error = None;
            self.tier_form = None;
            self.pending_delete = None;
        }
        if self.pricing.selected_crop() == Some(&id) {
            self.pricing.clear_crop();
            self.pricing_crop = None;
        }
    }

    fn sort_crops(&mut self) {
        self.crops.sort_by(|left, right| left.name.cmp(&right.name));
    }

    pub(super) fn open_tier_create(&mut self) {
        let Some(crop_id) = self.catalog_crop.as_ref().map(|choice| choice.id.clone()) else {
            return;
        };
        if self.require_edit_rights("add pricing tiers") {
            self.pending_delete = None;
            self.tier_form = Some(TierForm::create(crop_id));
        }
    }

    pub(super) fn open_tier_edit(&mut self, id: &TierId) {
        let Some(crop) = self.catalog_crop.as_ref() else {
            return;
        };
        let Some(tier) = self.catalog.tier(&crop.id, id).cloned() else {
            tracing::warn!(target: targets::CATALOG, tier = %id, "Tier to edit is not in the catalog");
            return;
        };
        if self.require_edit_rights("edit pricing tiers") {
            self.pending_delete = None;
            self.tier_form = Some(TierForm::edit(&tier));
        }
    }

    /// Drafts that fail validation stay in the dialog and never reach the API.
    pub(super) fn submit_tier(&mut self) -> Command<Message> {
        let Some(form) = self.tier_form.as_mut() else {
            return Command::none();
        };
        if form.saving || form.has_input_errors() {
            return Command::none();
        }
        if let Err(errors) = form.draft.validate_for_submit(form.mode) {
            form.validation = Some(errors);
            return Command::none();
        }

        form.saving = true;
        let api = Arc::clone(&self.api);
        let draft = form.draft.clone();
        let mode = form.mode;
        Command::perform(
            async move {
                submit_draft(api.as_ref(), &draft, mode)
                    .await
                    .map_err(ViewError::from)
            },
            Message::TierSaved,
        )
    }

    pub(super) fn handle_tier_saved(
        &mut self,
        result: Result<PricingTier, ViewError>,
    ) -> Command<Message> {
        match result {
            Ok(tier) => {
                tracing::info!(
                    target: targets::CATALOG,
                    crop = %tier.crop_id,
                    tier = %tier.id,
                    "Tier saved"
                );
                self.tier_form = None;
                self.notification = Some(Notification::info(format!("Tier '{}' saved.", tier.name)));
                self.after_catalog_change(&tier.crop_id)
            }
            Err(error) => {
                if let Some(form) = self.tier_form.as_mut() {
                    form.saving = false;
                }
                self.show_error(&error);
                Command::none()
            }
        }
    }

    pub(super) fn confirm_delete_tier(&mut self) -> Command<Message> {
        let Some(id) = self.pending_delete.take() else {
            return Command::none();
        };
        if !self.deleting.insert(id.clone()) {
            return Command::none();
        }
        let api = Arc::clone(&self.api);
        let request_id = id.clone();
        Command::perform(
            async move {
                api.delete_pricing_tier(request_id)
                    .await
                    .map_err(ViewError::from)
            },
            move |result| Message::TierDeleted { id, result },
        )
    }

    pub(super) fn handle_tier_deleted(
        &mut self,
        id: TierId,
        result: Result<(), ViewError>,
    ) -> Command<Message> {
        self.deleting.remove(&id);
        match result {
            Ok(()) => {
                tracing::info!(target: targets::CATALOG, tier = %id, "Tier deleted");
                self.notification = Some(Notification::info("Tier deleted."));
                match self.catalog_crop.as_ref().map(|choice| choice.id.clone()) {
                    Some(crop_id) => self.after_catalog_change(&crop_id),
                    None => Command::none(),
                }
            }
            Err(error) => {
                self.show_error(&error);
                Command::none()
            }
        }
    }

    /// Reload the edited crop in the table and in an open pricing view. A crop
    /// not on screen is dropped from the catalog and loads on next selection.
    fn after_catalog_change(&mut self, crop_id: &CropId) -> Command<Message> {
        let mut commands = Vec::new();
        if self.catalog_crop.as_ref().is_some_and(|choice| &choice.id == crop_id) {
            commands.push(self.fetch_catalog_tiers(crop_id.clone()));
        } else {
            self.catalog.invalidate(crop_id);
        }
        if self.pricing.selected_crop() == Some(crop_id) {
            if let Some(ticket) = self.pricing.retry() {
                commands.push(self.fetch_pricing(ticket));
            }
        }
        Command::batch(commands)
    }

    pub(super) fn load_layouts(&mut self) -> Command<Message> {
        let api = Arc::clone(&self.api);
        Command::perform(
            async move { api.list_layouts().await.map_err(ViewError::from) },
            Message::LayoutsLoaded,
        )
    }

    pub(super) fn handle_layouts_loaded(&mut self, result: Result<Vec<Layout>, ViewError>) {
        match result {
            Ok(layouts) => {
                tracing::debug!(target: targets::UI, count = layouts.len(), "Layouts loaded");
                self.layouts = layouts.iter().map(LayoutChoice::from).collect();
            }
            Err(error) => self.show_error(&error),
        }
    }

    pub(super) fn select_layout(&mut self, choice: LayoutChoice) -> Command<Message> {
        if self.selected_layout.as_ref() == Some(&choice) {
            return Command::none();
        }
        let layout_id = choice.id.clone();
        self.selected_layout = Some(choice);
        self.selected_plot = None;
        self.plots.clear();
        self.plots_loading = true;

        let api = Arc::clone(&self.api);
        let request_id = layout_id.clone();
        Command::perform(
            async move {
                api.list_layout_plots(request_id)
                    .await
                    .map_err(ViewError::from)
            },
            move |result| Message::PlotsLoaded { layout_id, result },
        )
    }

    pub(super) fn handle_plots_loaded(
        &mut self,
        layout_id: LayoutId,
        result: Result<Vec<Plot>, ViewError>,
    ) {
        if self.selected_layout.as_ref().map(|choice| &choice.id) != Some(&layout_id) {
            return;
        }
        self.plots_loading = false;
        match result {
            Ok(plots) => {
                self.plots = plots.iter().map(PlotChoice::from).collect();
            }
            Err(error) => self.show_error(&error),
        }
    }

    pub(super) fn select_plot(&mut self, choice: PlotChoice) -> Command<Message> {
        self.area_input = choice.area_in_acres.to_string();
        self.area_error = self
            .pricing
            .set_area(Some(choice.area_in_acres))
            .err()
            .map(|rejected| rejected.to_string());
        let crop = choice
            .crop_id
            .as_ref()
            .and_then(|crop_id| self.crop_choice(crop_id));
        self.selected_plot = Some(choice);
        match crop {
            Some(crop) => self.select_pricing_crop(crop),
            None => Command::none(),
        }
    }

    pub(super) fn load_customers(&mut self) -> Command<Message> {
        let api = Arc::clone(&self.api);
        Command::perform(
            async move { api.list_customers().await.map_err(ViewError::from) },
            Message::CustomersLoaded,
        )
    }

    pub(super) fn handle_customers_loaded(&mut self, result: Result<Vec<Customer>, ViewError>) {
        match result {
            Ok(customers) => self.customers = customers,
            Err(error) => {
                tracing::warn!(target: targets::API, error = %error.detail, "Customers unavailable");
            }
        }
    }

    pub(super) fn plot_owner(&self) -> Option<String> {
        let customer_id = self.selected_plot.as_ref()?.customer_id.as_ref()?;
        self.customers
            .iter()
            .find(|customer| &customer.id == customer_id)
            .map(Customer::display_name)
    }

    pub(super) fn select_pricing_crop(&mut self, choice: CropChoice) -> Command<Message> {
        let crop_id = choice.id.clone();
        self.pricing_crop = Some(choice);
        match self.pricing.select_crop(crop_id) {
            Some(ticket) => self.fetch_pricing(ticket),
            None => Command::none(),
        }
    }

    pub(super) fn fetch_pricing(&self, ticket: FetchTicket) -> Command<Message> {
        let api = Arc::clone(&self.api);
        let crop_id = ticket.crop_id().clone();
        Command::perform(
            async move {
                api.list_pricing_tiers(crop_id)
                    .await
                    .map_err(ViewError::from)
            },
            move |result| Message::PricingTiersFetched { ticket, result },
        )
    }

    pub(super) fn handle_pricing_fetched(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<PricingTier>, ViewError>,
    ) {
        let failure = result.as_ref().err().cloned();
        if !self.pricing.apply_fetch(ticket, result) {
            return;
        }
        if let Some(error) = failure {
            self.show_error(&error);
        }
    }

    pub(super) fn set_area_input(&mut self, value: String) {
        self.area_error = match parse_decimal_input(&value) {
            Ok(area) => self
                .pricing
                .set_area(area)
                .err()
                .map(|rejected| rejected.to_string()),
            Err(error) => Some(error.to_string()),
        };
        self.area_input = value;
    }

    pub(super) fn set_down_payment_input(&mut self, value: String) {
        self.down_payment_error = match parse_decimal_input(&value) {
            Ok(percent) => self
                .pricing
                .set_down_payment(percent)
                .err()
                .map(|rejected| rejected.to_string()),
            Err(error) => Some(error.to_string()),
        };
        self.down_payment_input = value;
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::path::PathBuf;
    use std::{fs, process};

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use farmplot_core::{AppConfig, Error, FarmApi, MockFarmApi, SessionContext, TokenSource};
    use iced::Application;
    use tracing_subscriber::{EnvFilter, Registry, reload};

    use super::*;
    use crate::app::types::{Flags, NotificationKind};
    use crate::logging::LogStore;

    fn run_future<T>(future: impl Future<Output = T>) -> T {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("tokio runtime")
            .block_on(future)
    }

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("farmplot-ui-{}-{name}", process::id()))
    }

    fn id_token(claims: &str) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(claims.as_bytes())
        )
    }

    fn test_app(api: &MockFarmApi, session: SessionContext, name: &str) -> FarmPlotApp {
        let (_layer, reload_handle) =
            reload::Layer::<EnvFilter, Registry>::new(EnvFilter::default());
        let flags = Flags {
            log_store: LogStore::new(100),
            reload_handle,
            log_level: LogLevel::Info,
            config: AppConfig {
                offline_demo: !session.is_authenticated(),
                agent_groups: vec!["agent".to_string()],
                ..AppConfig::default()
            },
            api: Arc::new(api.clone()),
            session,
            token_source: TokenSource::File(scratch_path(&format!("{name}-token"))),
            config_path: scratch_path(&format!("{name}.ron")),
        };
        FarmPlotApp::new(flags).0
    }

    fn mango() -> CropChoice {
        CropChoice {
            id: CropId::new("demo-mango"),
            name: "Mango".to_string(),
        }
    }

    fn show_mango_tiers(app: &mut FarmPlotApp, api: &MockFarmApi) {
        app.handle_crops_loaded(run_future(api.list_crops()).map_err(ViewError::from));
        let _ = app.select_catalog_crop(mango());
        let tiers = run_future(api.list_pricing_tiers(mango().id)).map_err(ViewError::from);
        app.handle_catalog_tiers(mango().id, app.catalog_run_id, tiers);
    }

    #[test]
    fn failed_reload_keeps_the_loaded_tiers() {
        let api = MockFarmApi::with_demo_data();
        let mut app = test_app(&api, SessionContext::anonymous(), "reload");
        show_mango_tiers(&mut app, &api);
        assert_eq!(app.catalog.tiers_for_crop(&mango().id).len(), 4);

        let _ = app.reload_catalog();
        assert!(app.catalog_loading);
        let outage = ViewError::from(Error::Transport {
            endpoint: "GET /pricing-tiers/".to_string(),
            details: "connection refused".to_string(),
        });
        app.handle_catalog_tiers(mango().id, app.catalog_run_id, Err(outage));

        assert!(!app.catalog_loading);
        assert_eq!(app.catalog.tiers_for_crop(&mango().id).len(), 4);
        assert!(app.catalog_error.as_ref().is_some_and(|error| error.retryable));

        let _ = app.reload_catalog();
        let tiers = run_future(api.list_pricing_tiers(mango().id)).map_err(ViewError::from);
        app.handle_catalog_tiers(mango().id, app.catalog_run_id, tiers);
        assert!(app.catalog_error.is_none());
    }

    #[test]
    fn session_near_expiry_picks_up_the_token_file() {
        let now = now_epoch_seconds();
        let current = id_token(&format!(
            r#"{{"exp":{},"cognito:groups":["agent"]}}"#,
            now + 100
        ));
        let session = SessionContext::from_id_token(&current, now).expect("session");
        let api = MockFarmApi::with_demo_data();
        let mut app = test_app(&api, session, "refresh");
        let TokenSource::File(token_path) = app.token_source.clone() else {
            panic!("file token source");
        };
        let _ = fs::remove_file(&token_path);

        app.check_session_at(now + 200);
        assert!(app.session_expired);
        assert!(!app.can_edit());

        let newer = id_token(&format!(
            r#"{{"exp":{},"cognito:groups":["agent"]}}"#,
            now + 3600
        ));
        fs::write(&token_path, &newer).expect("write token");
        app.check_session_at(now + 200);
        let _ = fs::remove_file(&token_path);

        assert!(!app.session_expired);
        assert!(app.can_edit());
        assert_eq!(app.session.expires_at(), Some(now + 3600));
        run_future(app.api.list_crops()).expect("crops");
        assert_eq!(api.bearer_token(), Some(newer));
    }

    #[test]
    fn save_settings_writes_the_chosen_level() {
        let api = MockFarmApi::new();
        let mut app = test_app(&api, SessionContext::anonymous(), "settings");
        app.set_log_level(LogLevel::Debug);
        app.save_settings();

        let loaded = AppConfig::load_or_default(&app.config_path).expect("load");
        let _ = fs::remove_file(&app.config_path);

        assert_eq!(loaded.log_level, "debug");
        assert!(
            app.notification
                .as_ref()
                .is_some_and(|notification| matches!(notification.kind, NotificationKind::Info))
        );
    }

    #[test]
    fn renamed_crop_updates_every_selector() {
        let api = MockFarmApi::with_demo_data();
        let mut app = test_app(&api, SessionContext::anonymous(), "rename");
        show_mango_tiers(&mut app, &api);
        let _ = app.select_pricing_crop(mango());

        app.open_rename_crop();
        if let Some(dialog) = app.crop_dialog.as_mut() {
            dialog.name = "  Alphonso ".to_string();
        }
        let _ = app.submit_crop_dialog();
        assert!(app.crop_dialog.as_ref().is_some_and(|dialog| dialog.saving));

        let renamed = run_future(api.update_crop(mango().id, "Alphonso".to_string()));
        app.handle_crop_renamed(renamed.map_err(ViewError::from));

        assert!(app.crop_dialog.is_none());
        let names: Vec<&str> = app.crops.iter().map(|crop| crop.name.as_str()).collect();
        assert_eq!(names, vec!["Alphonso", "Teak"]);
        assert_eq!(app.catalog_crop.as_ref().map(|crop| crop.name.as_str()), Some("Alphonso"));
        assert_eq!(app.pricing_crop.as_ref().map(|crop| crop.name.as_str()), Some("Alphonso"));
    }

    #[test]
    fn deleted_crop_leaves_catalog_and_pricing() {
        let api = MockFarmApi::with_demo_data();
        let mut app = test_app(&api, SessionContext::anonymous(), "delete");
        show_mango_tiers(&mut app, &api);
        let _ = app.select_pricing_crop(mango());

        app.request_delete_crop();
        assert_eq!(app.pending_crop_delete, Some(mango().id));
        let _ = app.confirm_delete_crop();
        assert!(app.deleting_crop);
        assert!(app.pending_crop_delete.is_none());

        let deleted = run_future(api.delete_crop(mango().id)).map_err(ViewError::from);
        app.handle_crop_deleted(mango().id, deleted);

        assert!(!app.deleting_crop);
        assert_eq!(app.crops.len(), 1);
        assert!(app.catalog_crop.is_none());
        assert!(!app.catalog.is_loaded(&mango().id));
        assert!(app.pricing.selected_crop().is_none());
        assert!(app.pricing_crop.is_none());
    }

    #[test]
    fn crop_changes_need_edit_rights() {
        let now = now_epoch_seconds();
        let visitor = id_token(&format!(r#"{{"exp":{}}}"#, now + 3600));
        let session = SessionContext::from_id_token(&visitor, now).expect("session");
        let api = MockFarmApi::with_demo_data();
        let mut app = test_app(&api, session, "rights");
        show_mango_tiers(&mut app, &api);

        app.open_create_crop();
        app.open_rename_crop();
        app.request_delete_crop();

        assert!(app.crop_dialog.is_none());
        assert!(app.pending_crop_delete.is_none());
    }

    #[test]
    fn each_pricing_input_keeps_its_own_error() {
        let api = MockFarmApi::new();
        let mut app = test_app(&api, SessionContext::anonymous(), "inputs");

        app.set_area_input("-2".to_string());
        app.set_down_payment_input("20".to_string());
        assert!(app.area_error.is_some());
        assert!(app.down_payment_error.is_none());

        app.set_down_payment_input("120".to_string());
        app.set_area_input("3".to_string());
        assert!(app.area_error.is_none());
        assert!(app.down_payment_error.is_some());
        assert_eq!(app.pricing.down_payment_percent(), Some(20.0));
    }
}
