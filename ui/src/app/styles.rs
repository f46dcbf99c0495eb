use iced::{Background, Border, Color, Theme, Vector};

use crate::app::types::NotificationKind;

#[derive(Debug, Clone, Copy)]
pub(crate) struct TabStyle {
    pub(crate) active: bool,
}

impl iced::widget::button::StyleSheet for TabStyle {
    type Style = Theme;

    fn active(&self, style: &Self::Style) -> iced::widget::button::Appearance {
        let palette = style.extended_palette();
        let (background, text_color) = if self.active {
            (palette.background.base.color, palette.background.base.text)
        } else {
            (palette.background.weak.color, palette.background.weak.text)
        };

        iced::widget::button::Appearance {
            background: Some(Background::Color(background)),
            text_color,
            border: Border {
                color: palette.background.strong.color,
                width: 1.0,
                radius: [8.0, 8.0, 0.0, 0.0].into(),
            },
            shadow_offset: if self.active {
                Vector::new(0.0, 0.0)
            } else {
                Vector::new(0.0, 1.0)
            },
            ..iced::widget::button::Appearance::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> iced::widget::button::Appearance {
        let mut appearance = self.active(style);
        if !self.active {
            if let Some(Background::Color(color)) = appearance.background {
                appearance.background = Some(Background::Color(lift(color, 0.05)));
            }
        }
        appearance
    }
}

/// Notification strip; red for failures, green otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BannerStyle {
    pub(crate) kind: NotificationKind,
}

impl iced::widget::container::StyleSheet for BannerStyle {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> iced::widget::container::Appearance {
        let (background, border) = match self.kind {
            NotificationKind::Error => (
                Color::from_rgb8(0xfd, 0xec, 0xec),
                Color::from_rgb8(0xe0, 0x4f, 0x4f),
            ),
            NotificationKind::Info => (
                Color::from_rgb8(0xe9, 0xf7, 0xef),
                Color::from_rgb8(0x22, 0x7d, 0x64),
            ),
        };

        iced::widget::container::Appearance {
            text_color: Some(Color::from_rgb8(0x12, 0x12, 0x12)),
            background: Some(Background::Color(background)),
            border: Border {
                color: border,
                width: 1.0,
                radius: 6.0.into(),
            },
            ..iced::widget::container::Appearance::default()
        }
    }
}

/// Highlights the tier that currently applies to the selected plot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TierRowStyle {
    pub(crate) highlighted: bool,
}

impl iced::widget::container::StyleSheet for TierRowStyle {
    type Style = Theme;

    fn appearance(&self, style: &Self::Style) -> iced::widget::container::Appearance {
        let palette = style.extended_palette();
        let background = if self.highlighted {
            Some(Background::Color(palette.primary.weak.color))
        } else {
            None
        };

        iced::widget::container::Appearance {
            background,
            border: Border {
                color: palette.background.strong.color,
                width: 0.5,
                radius: 4.0.into(),
            },
            ..iced::widget::container::Appearance::default()
        }
    }
}

fn lift(color: Color, amount: f32) -> Color {
    Color {
        r: (color.r + amount).min(1.0),
        g: (color.g + amount).min(1.0),
        b: (color.b + amount).min(1.0),
        a: color.a,
    }
}
