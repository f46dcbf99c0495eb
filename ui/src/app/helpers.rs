use std::time::{SystemTime, UNIX_EPOCH};

use iced::Color;
use iced::keyboard;

use farmplot_core::{CostBreakdown, PricingTier, format_amount};

use crate::app::types::Message;

pub(crate) fn level_color(level: tracing::Level) -> Color {
    match level {
        tracing::Level::ERROR => Color::from_rgb8(0xe0, 0x4f, 0x4f),
        tracing::Level::WARN => Color::from_rgb8(0xe0, 0xb0, 0x4f),
        tracing::Level::INFO => Color::from_rgb8(0x3b, 0x82, 0xf6),
        tracing::Level::DEBUG => Color::from_rgb8(0x22, 0x7d, 0x64),
        tracing::Level::TRACE => Color::from_rgb8(0x6b, 0x72, 0x80),
    }
}

pub(crate) fn escape_key_event(
    key: keyboard::Key,
    _modifiers: keyboard::Modifiers,
) -> Option<Message> {
    match key {
        keyboard::Key::Named(keyboard::key::Named::Escape) => Some(Message::Escape),
        _ => None,
    }
}

pub(crate) fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

pub(crate) fn money(value: f64) -> String {
    format!("Rs {}", group_thousands(&format_amount(value)))
}

pub(crate) fn optional_money(value: Option<f64>) -> String {
    value.map(money).unwrap_or_else(|| "-".to_string())
}

/// `1234567.50` becomes `1,234,567.50`.
fn group_thousands(amount: &str) -> String {
    let (sign, digits) = match amount.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", amount),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    }
}

pub(crate) fn breakdown_lines(tier: &PricingTier, breakdown: &CostBreakdown) -> Vec<(String, String)> {
    vec![
        ("Tier".to_string(), format!("{} ({})", tier.name, tier.range_label())),
        ("Price per acre".to_string(), money(breakdown.price_per_acre)),
        ("Price per cent".to_string(), money(breakdown.price_per_cent)),
        ("Total price".to_string(), money(breakdown.total_price)),
        ("Down payment".to_string(), money(breakdown.down_payment)),
        ("Outstanding".to_string(), money(breakdown.outstanding_amount)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(15000.0), "Rs 15,000.00");
        assert_eq!(money(999.5), "Rs 999.50");
        assert_eq!(money(1234567.0), "Rs 1,234,567.00");
        assert_eq!(money(-4200.0), "Rs -4,200.00");
        assert_eq!(optional_money(None), "-");
    }
}
