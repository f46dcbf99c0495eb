use iced::alignment::Horizontal;
use iced::theme;
use iced::widget::{
    Rule, button, checkbox, column, container, pick_list, row, scrollable, text, text_input,
};
use iced::{Alignment, Color, Element, Length};

use farmplot_core::{ExtentUnit, PaymentMode, PricingDisplay, PricingTier, format_amount};

use crate::app::FarmPlotApp;
use crate::app::constants::MAX_LOG_LINES_SHOWN;
use crate::app::form::{FormInput, TierForm};
use crate::app::helpers::{breakdown_lines, level_color, money, optional_money};
use crate::app::styles::{BannerStyle, TabStyle, TierRowStyle};
use crate::app::types::{CropDialog, Message, Tab, UnitChoice};
use crate::logging::LogLevel;

const TITLE_COLOR: Color = Color::from_rgb(0.07, 0.07, 0.07);
const LABEL_COLOR: Color = Color::from_rgb(0.23, 0.29, 0.35);
const MUTED_COLOR: Color = Color::from_rgb(0.42, 0.42, 0.42);
const ERROR_COLOR: Color = Color::from_rgb(0.88, 0.31, 0.31);

impl FarmPlotApp {
    pub(super) fn header_view(&self) -> Element<'_, Message> {
        let mode = if self.config.offline_demo {
            "offline demo".to_string()
        } else if let Some(email) = self.session.email() {
            email.to_string()
        } else if self.session.is_authenticated() {
            "signed in".to_string()
        } else {
            "read only".to_string()
        };

        row![
            text("Farm Plot Pricing")
                .size(28)
                .style(theme::Text::Color(Color::from_rgb8(0x10, 0x1a, 0x24))),
            text(mode)
                .size(16)
                .style(theme::Text::Color(Color::from_rgb8(0x5f, 0x6b, 0x7a))),
        ]
        .spacing(12)
        .align_items(Alignment::Center)
        .into()
    }

    pub(super) fn tab_bar(&self) -> Element<'_, Message> {
        row![
            self.tab_button(Tab::Pricing, "Pricing tiers"),
            self.tab_button(Tab::PlotPricing, "Plot pricing"),
            self.tab_button(Tab::Debug, "Debug"),
        ]
        .spacing(4)
        .align_items(Alignment::End)
        .into()
    }

    fn tab_button(&self, tab: Tab, label: &str) -> Element<'_, Message> {
        button(text(label))
            .style(theme::Button::custom(TabStyle {
                active: self.active_tab == tab,
            }))
            .padding([6, 14])
            .on_press(Message::SelectTab(tab))
            .into()
    }

    pub(super) fn notification_view(&self) -> Option<Element<'_, Message>> {
        let notification = self.notification.as_ref()?;
        let mut body = column![text(&notification.summary).size(16)].spacing(4);
        if let Some(detail) = &notification.detail {
            body = body.push(
                text(detail)
                    .size(12)
                    .style(theme::Text::Color(MUTED_COLOR)),
            );
        }

        let content = row![
            body.width(Length::Fill),
            button("Dismiss")
                .style(theme::Button::Secondary)
                .on_press(Message::DismissNotification),
        ]
        .spacing(12)
        .align_items(Alignment::Center);

        Some(
            container(content)
                .padding(10)
                .width(Length::Fill)
                .style(theme::Container::Custom(Box::new(BannerStyle {
                    kind: notification.kind,
                })))
                .into(),
        )
    }

    pub(super) fn pricing_tab_view(&self) -> Element<'_, Message> {
        let crop_picker = pick_list(
            self.crops.as_slice(),
            self.catalog_crop.clone(),
            Message::CatalogCropSelected,
        )
        .placeholder(if self.crops_loading {
            "Loading crops..."
        } else {
            "Select a crop"
        });

        let can_edit = self.can_edit();
        let has_crop = self.catalog_crop.is_some();
        let toolbar = row![
            text("Crop").style(theme::Text::Color(LABEL_COLOR)),
            crop_picker,
            button("Reload")
                .style(theme::Button::Secondary)
                .on_press_maybe(has_crop.then_some(Message::ReloadCatalog)),
            button("Refresh crops")
                .style(theme::Button::Secondary)
                .on_press(Message::ReloadCrops),
            button("New crop").on_press_maybe(can_edit.then_some(Message::OpenCreateCrop)),
            button("Add tier")
                .on_press_maybe((can_edit && has_crop).then_some(Message::AddTier)),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let mut left = column![toolbar].spacing(12).width(Length::FillPortion(3));
        if has_crop {
            left = left.push(self.crop_actions_view(can_edit));
        }
        if let Some(dialog) = &self.crop_dialog {
            left = left.push(self.crop_dialog_view(dialog));
        }
        left = left.push(self.tier_table_view());

        let mut layout = row![left].spacing(16).align_items(Alignment::Start);
        if let Some(form) = &self.tier_form {
            layout = layout.push(self.tier_editor_view(form));
        }
        layout.into()
    }

    fn crop_actions_view(&self, can_edit: bool) -> Element<'_, Message> {
        if self.pending_crop_delete.is_some() {
            return row![
                error_text("Delete this crop and all of its pricing tiers?".to_string()),
                button("Confirm")
                    .style(theme::Button::Destructive)
                    .on_press(Message::ConfirmDeleteCrop),
                button("Keep")
                    .style(theme::Button::Secondary)
                    .on_press(Message::CancelDeleteCrop),
            ]
            .spacing(8)
            .align_items(Alignment::Center)
            .into();
        }
        let idle = can_edit && !self.deleting_crop;
        row![
            button("Rename crop")
                .style(theme::Button::Secondary)
                .on_press_maybe(idle.then_some(Message::OpenRenameCrop)),
            button(if self.deleting_crop { "Deleting..." } else { "Delete crop" })
                .style(theme::Button::Secondary)
                .on_press_maybe(idle.then_some(Message::RequestDeleteCrop)),
        ]
        .spacing(8)
        .into()
    }

    fn crop_dialog_view<'a>(&'a self, dialog: &'a CropDialog) -> Element<'a, Message> {
        let (idle_label, busy_label) = if dialog.renaming.is_some() {
            ("Rename", "Renaming...")
        } else {
            ("Create", "Creating...")
        };
        let submit = dialog
            .submittable_name()
            .map(|_| Message::SubmitCropDialog);
        let panel = row![
            text_input("Crop name", &dialog.name)
                .on_input(Message::CropNameChanged)
                .on_submit(Message::SubmitCropDialog)
                .width(Length::Fixed(240.0)),
            button(if dialog.saving { busy_label } else { idle_label }).on_press_maybe(submit),
            button("Cancel")
                .style(theme::Button::Secondary)
                .on_press_maybe((!dialog.saving).then_some(Message::Escape)),
        ]
        .spacing(8)
        .align_items(Alignment::Center);

        container(panel)
            .padding(8)
            .style(theme::Container::Box)
            .into()
    }

    fn tier_table_view(&self) -> Element<'_, Message> {
        let Some(crop) = &self.catalog_crop else {
            return self.empty_state("Select a crop to see its pricing tiers.");
        };
        let tiers = self.catalog.tiers_for_crop(&crop.id);

        if self.catalog_loading && tiers.is_empty() {
            return self.empty_state("Loading pricing tiers...");
        }
        if tiers.is_empty() {
            let message = if self.catalog_error.is_some() {
                "Pricing tiers could not be loaded. Use Reload to try again."
            } else {
                "No pricing tiers for this crop yet."
            };
            return self.empty_state(message);
        }

        let header = row![
            column_label("Name", 3),
            column_label("Mode", 1),
            column_label("Range", 2),
            column_label("Per acre", 2),
            column_label("Per cent", 2),
            column_label("EMI / month", 2),
            column_label("Status", 1),
            column_label("", 2),
        ]
        .spacing(8);

        let overlaps = self.catalog.overlapping_pairs(&crop.id);
        let mut rows = column![].spacing(6);
        if let Some(error) = &self.catalog_error {
            let retry = (error.retryable && !self.catalog_loading).then_some(Message::ReloadCatalog);
            rows = rows.push(
                row![
                    error_text(format!("{} Showing the last loaded tiers.", error.summary)),
                    button("Retry")
                        .style(theme::Button::Secondary)
                        .on_press_maybe(retry),
                ]
                .spacing(10)
                .align_items(Alignment::Center),
            );
        }
        rows = rows.push(header).push(Rule::horizontal(1));
        for tier in tiers {
            rows = rows.push(self.tier_row(tier));
        }
        if !overlaps.is_empty() {
            rows = rows.push(
                text(format!(
                    "{} overlapping range pair(s): the first tier in the list applies.",
                    overlaps.len()
                ))
                .size(12)
                .style(theme::Text::Color(Color::from_rgb8(0xb0, 0x7a, 0x1f))),
            );
        }

        scrollable(rows).height(Length::Fill).into()
    }

    fn tier_row(&self, tier: &PricingTier) -> Element<'_, Message> {
        let editing = self
            .tier_form
            .as_ref()
            .and_then(|form| form.draft.id.as_ref())
            .is_some_and(|id| id == &tier.id);
        let can_edit = self.can_edit() && !self.deleting.contains(&tier.id);

        let actions: Element<'_, Message> = if self.pending_delete.as_ref() == Some(&tier.id) {
            row![
                button("Confirm")
                    .style(theme::Button::Destructive)
                    .on_press(Message::ConfirmDeleteTier),
                button("Keep")
                    .style(theme::Button::Secondary)
                    .on_press(Message::CancelDeleteTier),
            ]
            .spacing(4)
            .into()
        } else {
            row![
                button("Edit").on_press_maybe(can_edit.then(|| Message::EditTier(tier.id.clone()))),
                button("Delete")
                    .style(theme::Button::Secondary)
                    .on_press_maybe(
                        can_edit.then(|| Message::RequestDeleteTier(tier.id.clone()))
                    ),
            ]
            .spacing(4)
            .into()
        };

        let cells = row![
            cell(tier.name.clone(), 3),
            cell(tier.payment_mode.label().to_string(), 1),
            cell(tier.range_label(), 2),
            cell(money(tier.cost_per_acre), 2),
            cell(money(tier.cost_per_cent), 2),
            cell(optional_money(tier.emi_per_month), 2),
            cell(tier.status.to_string(), 1),
            container(actions).width(Length::FillPortion(2)),
        ]
        .spacing(8)
        .align_items(Alignment::Center);

        container(cells)
            .padding(4)
            .style(theme::Container::Custom(Box::new(TierRowStyle {
                highlighted: editing,
            })))
            .into()
    }

    fn tier_editor_view<'a>(&'a self, form: &'a TierForm) -> Element<'a, Message> {
        let title = match form.mode {
            farmplot_core::EditMode::Create => "New pricing tier",
            farmplot_core::EditMode::Update => "Edit pricing tier",
        };

        let units: Vec<UnitChoice> = ExtentUnit::KNOWN.iter().cloned().map(UnitChoice).collect();
        let mut panel = column![
            text(title)
                .size(20)
                .style(theme::Text::Color(TITLE_COLOR)),
            labelled(
                "Payment mode",
                pick_list(
                    &PaymentMode::ALL[..],
                    form.draft.payment_mode,
                    Message::TierPaymentModeSelected,
                )
                .placeholder("CASH or EMI")
                .into(),
                form.validation_error("payment_mode"),
            ),
            labelled(
                "Extent unit",
                pick_list(
                    units,
                    form.draft.extent_unit.clone().map(UnitChoice),
                    Message::TierExtentUnitSelected,
                )
                .placeholder("Unit")
                .into(),
                form.validation_error("extent_unit"),
            ),
        ]
        .spacing(10);

        for input in FormInput::ALL {
            let field = text_input(input.label(), form.input(input))
                .on_input(move |value| Message::TierInputChanged(input, value))
                .on_submit(Message::SubmitTier);
            panel = panel.push(labelled(input.label(), field.into(), form.error_for(input)));
        }

        panel = panel.push(
            text(format!(
                "Cost per cent: {}",
                format_amount(form.draft.cost_per_cent)
            ))
            .size(14)
            .style(theme::Text::Color(MUTED_COLOR)),
        );
        if let Some(missing) = form.validation_error("id").or(form.validation_error("crop_id")) {
            panel = panel.push(error_text(missing));
        }

        let submit = (!form.saving && !form.has_input_errors()).then_some(Message::SubmitTier);
        panel = panel.push(
            row![
                button(if form.saving { "Saving..." } else { "Save" }).on_press_maybe(submit),
                button("Cancel")
                    .style(theme::Button::Secondary)
                    .on_press_maybe((!form.saving).then_some(Message::CancelTierEdit)),
            ]
            .spacing(8),
        );

        container(scrollable(panel))
            .padding(12)
            .width(Length::FillPortion(2))
            .style(theme::Container::Box)
            .into()
    }

    pub(super) fn plot_pricing_tab_view(&self) -> Element<'_, Message> {
        let layout_picker = pick_list(
            self.layouts.as_slice(),
            self.selected_layout.clone(),
            Message::LayoutSelected,
        )
        .placeholder("Layout");
        let plot_picker = pick_list(
            self.plots.as_slice(),
            self.selected_plot.clone(),
            Message::PlotSelected,
        )
        .placeholder(if self.plots_loading { "Loading plots..." } else { "Plot" });
        let crop_picker = pick_list(
            self.crops.as_slice(),
            self.pricing_crop.clone(),
            Message::PricingCropSelected,
        )
        .placeholder("Crop");

        let selectors = row![
            layout_picker,
            plot_picker,
            crop_picker,
            button("Clear crop")
                .style(theme::Button::Secondary)
                .on_press_maybe(self.pricing_crop.is_some().then_some(Message::ClearPricingCrop)),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let inputs = row![
            text("Area (acres)").style(theme::Text::Color(LABEL_COLOR)),
            text_input("0.00", &self.area_input)
                .on_input(Message::AreaInputChanged)
                .width(Length::Fixed(120.0)),
            text("Down payment %").style(theme::Text::Color(LABEL_COLOR)),
            text_input("0", &self.down_payment_input)
                .on_input(Message::DownPaymentInputChanged)
                .width(Length::Fixed(80.0)),
            self.mode_button(PaymentMode::Outright),
            self.mode_button(PaymentMode::Emi),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let mut content = column![selectors, inputs].spacing(14);
        if let Some(plot) = &self.selected_plot {
            let owner = self
                .plot_owner()
                .unwrap_or_else(|| "no customer".to_string());
            let sold = if plot.sold { "sold" } else { "available" };
            content = content.push(
                text(format!("{} - {owner}, {sold}", plot.label))
                    .size(14)
                    .style(theme::Text::Color(MUTED_COLOR)),
            );
        }
        for error in [&self.area_error, &self.down_payment_error].into_iter().flatten() {
            content = content.push(error_text(error.clone()));
        }
        if let Some(banner) = self.pricing.error_banner() {
            let retry = (banner.retryable && !self.pricing.is_loading())
                .then_some(Message::RetryPricing);
            content = content.push(
                row![
                    error_text(format!(
                        "{} Showing the last loaded tiers.",
                        banner.summary
                    )),
                    button("Retry")
                        .style(theme::Button::Secondary)
                        .on_press_maybe(retry),
                ]
                .spacing(10)
                .align_items(Alignment::Center),
            );
        }
        content = content.push(self.pricing_result_view());
        content.into()
    }

    fn mode_button(&self, mode: PaymentMode) -> Element<'_, Message> {
        let style = if self.pricing.payment_mode() == Some(mode) {
            theme::Button::Primary
        } else {
            theme::Button::Secondary
        };
        button(text(mode.label()))
            .style(style)
            .on_press(Message::PricingModeSelected(mode))
            .into()
    }

    fn pricing_result_view(&self) -> Element<'_, Message> {
        let body: Element<'_, Message> = match self.pricing.display() {
            PricingDisplay::SelectCrop => self.empty_state("Select a crop to price this plot."),
            PricingDisplay::Loading => self.empty_state("Loading pricing..."),
            PricingDisplay::EnterArea => self.empty_state("Enter the plot area in acres."),
            PricingDisplay::NoPricingAvailable => {
                self.empty_state("No pricing available for the selected area.")
            }
            PricingDisplay::Error(error) => column![
                error_text(error.summary),
                text(error.detail)
                    .size(12)
                    .style(theme::Text::Color(MUTED_COLOR)),
                button("Retry").on_press_maybe(
                    (error.retryable && !self.pricing.is_loading())
                        .then_some(Message::RetryPricing)
                ),
            ]
            .spacing(8)
            .into(),
            PricingDisplay::Costs {
                tier,
                breakdown,
                installments,
            } => {
                let mut lines = column![].spacing(6);
                for (label, value) in breakdown_lines(&tier, &breakdown) {
                    lines = lines.push(
                        row![
                            text(label)
                                .width(Length::Fixed(160.0))
                                .style(theme::Text::Color(LABEL_COLOR)),
                            text(value).size(16),
                        ]
                        .spacing(8),
                    );
                }
                if let (Some(emi), Some(months)) = (tier.emi_per_month, installments) {
                    lines = lines.push(
                        text(format!("{months} monthly installments of {}", money(emi)))
                            .size(14)
                            .style(theme::Text::Color(MUTED_COLOR)),
                    );
                }
                lines.into()
            }
        };

        container(body)
            .padding(12)
            .width(Length::Fill)
            .style(theme::Container::Box)
            .into()
    }

    pub(super) fn debug_tab_view(&self) -> Element<'_, Message> {
        let level_picker = pick_list(
            &LogLevel::ALL[..],
            Some(self.log_level),
            Message::LogLevelChanged,
        )
        .placeholder("Log level");

        let console_header = row![
            text("Console")
                .size(20)
                .style(theme::Text::Color(TITLE_COLOR)),
            level_picker,
            text_input("Search logs", &self.log_query)
                .on_input(Message::LogQueryChanged)
                .width(Length::Fixed(220.0)),
            button("Clear")
                .style(theme::Button::Secondary)
                .on_press(Message::ClearLogs),
        ]
        .spacing(12)
        .align_items(Alignment::Center);

        let console = column![console_header, self.target_filters_view(), self.log_lines_view()]
            .spacing(12)
            .width(Length::FillPortion(2));

        row![console, self.debug_panel_view()]
            .spacing(16)
            .align_items(Alignment::Start)
            .into()
    }

    fn target_filters_view(&self) -> Element<'_, Message> {
        let mut filters = row![text("Targets").size(14).style(theme::Text::Color(LABEL_COLOR))]
            .spacing(10)
            .align_items(Alignment::Center);

        for target in self.sorted_targets() {
            let enabled = self.enabled_targets.contains(&target);
            filters = filters.push(
                checkbox(target.clone(), enabled)
                    .on_toggle(move |value| Message::ToggleTarget(target.clone(), value)),
            );
        }

        container(filters)
            .padding(8)
            .style(theme::Container::Box)
            .into()
    }

    fn log_lines_view(&self) -> Element<'_, Message> {
        let mut lines = column![].spacing(4);
        let entries = self.visible_entries();
        let start = entries.len().saturating_sub(MAX_LOG_LINES_SHOWN);

        for entry in entries.into_iter().skip(start) {
            lines = lines.push(
                text(entry.format_line())
                    .size(14)
                    .horizontal_alignment(Horizontal::Left)
                    .style(theme::Text::Color(level_color(entry.level))),
            );
        }

        scrollable(lines)
            .height(Length::Fill)
            .width(Length::Fill)
            .into()
    }

    fn debug_panel_view(&self) -> Element<'_, Message> {
        let copy_status = self.copy_status.as_deref().unwrap_or("Ready");
        let session = if self.session.is_authenticated() {
            format!(
                "Session: groups [{}], edit rights: {}",
                self.session.groups().join(", "),
                self.can_edit()
            )
        } else {
            format!("Session: anonymous, edit rights: {}", self.can_edit())
        };

        let panel = column![
            text("Debug panel")
                .size(20)
                .style(theme::Text::Color(TITLE_COLOR)),
            muted(format!("API: {}", self.config.api_base_url)),
            muted(session),
            muted(format!("Pricing state: {:?}", self.pricing.state())),
            muted(format!("Crops known: {}", self.crops.len())),
            button("Copy diagnostics").on_press(Message::CopyDiagnostics),
            button("Save settings")
                .style(theme::Button::Secondary)
                .on_press(Message::SaveSettings),
            muted(format!("Config file: {}", self.config_path.display())),
            text(format!("Clipboard: {copy_status}"))
                .size(12)
                .style(theme::Text::Color(MUTED_COLOR)),
        ]
        .spacing(10);

        container(panel)
            .padding(12)
            .width(Length::FillPortion(1))
            .style(theme::Container::Box)
            .into()
    }

    fn empty_state(&self, message: &str) -> Element<'_, Message> {
        container(
            text(message.to_string())
                .size(16)
                .style(theme::Text::Color(MUTED_COLOR)),
        )
        .padding(12)
        .into()
    }
}

fn column_label<'a>(label: &str, portion: u16) -> Element<'a, Message> {
    text(label.to_string())
        .size(13)
        .width(Length::FillPortion(portion))
        .style(theme::Text::Color(LABEL_COLOR))
        .into()
}

fn cell<'a>(value: String, portion: u16) -> Element<'a, Message> {
    text(value).size(14).width(Length::FillPortion(portion)).into()
}

fn muted<'a>(value: String) -> Element<'a, Message> {
    text(value)
        .size(14)
        .style(theme::Text::Color(Color::from_rgb8(0x4a, 0x4a, 0x4a)))
        .into()
}

fn error_text<'a>(value: String) -> Element<'a, Message> {
    text(value)
        .size(14)
        .style(theme::Text::Color(ERROR_COLOR))
        .into()
}

fn labelled<'a>(
    label: &str,
    control: Element<'a, Message>,
    error: Option<String>,
) -> Element<'a, Message> {
    let mut field = column![
        text(label.to_string())
            .size(13)
            .style(theme::Text::Color(LABEL_COLOR)),
        control,
    ]
    .spacing(4);
    if let Some(error) = error {
        field = field.push(error_text(error));
    }
    field.into()
}
