//! Message bodies for alerts, price summaries and self-tests

use chrono::{DateTime, Utc};

use crate::alerting::{Notification, Priority};
use crate::models::{AlertEvent, AlertKind, Watchlist};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Discrete alert for one crossing
pub fn alert_notification(event: &AlertEvent) -> Notification {
    let (icon, direction, bound, sign) = match event.kind {
        AlertKind::Upper => ("📈", "ABOVE", "Upper", '+'),
        AlertKind::Lower => ("📉", "BELOW", "Lower", '-'),
    };

    let text = format!(
        "{icon} *ALERT: {symbol} {direction} THRESHOLD* {icon}\n\n\
         💰 Current Price: `${price:.2}`\n\
         🎯 {bound} Threshold: `${threshold:.2}`\n\
         📊 Difference: `{sign}${diff:.2}`\n\
         🕐 Time: `{time}`",
        symbol = event.symbol,
        price = event.price,
        threshold = event.threshold,
        diff = event.overshoot().abs(),
        time = timestamp(event.fired_at),
    );

    Notification::new(text)
        .with_title(format!("🚨 {} Alert", event.symbol))
        .with_priority(Priority::High)
        .with_tags([
            "warning".to_string(),
            "stock".to_string(),
            event.symbol.to_lowercase(),
        ])
}

/// Consolidated price update covering every watched symbol
///
/// `price_of` returns `None` for symbols whose fetch failed; they are listed
/// as unavailable rather than left out.
pub fn summary_notification<F>(watchlist: &Watchlist, at: DateTime<Utc>, price_of: F) -> Notification
where
    F: Fn(&str) -> Option<f64>,
{
    let lines: Vec<String> = watchlist
        .symbols()
        .map(|symbol| match price_of(symbol) {
            Some(price) => format!("`{symbol:<8} ${price:>8.2}`"),
            None => format!("`{symbol:<8} unavailable`"),
        })
        .collect();

    let text = format!(
        "📊 *Stock Price Update*\n`{}`\n\n{}",
        timestamp(at),
        lines.join("\n")
    );

    Notification::new(text.trim_end().to_string())
        .with_title("📊 Stock Prices")
        .with_priority(Priority::Default)
        .with_tags(["stock", "update"])
}

/// Message sent by the notification self-test
pub fn test_notification(at: DateTime<Utc>) -> Notification {
    Notification::new(format!(
        "🧪 Test notification from pricewatch\nTime: {}",
        timestamp(at)
    ))
    .with_title("🧪 Test Alert")
    .with_priority(Priority::Low)
    .with_tags(["test"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    use crate::models::ThresholdConfig;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_upper_alert_body() {
        let event = AlertEvent {
            symbol: "AAPL".to_string(),
            kind: AlertKind::Upper,
            price: 201.5,
            threshold: 200.0,
            fired_at: at(),
        };

        let n = alert_notification(&event);
        assert_eq!(
            n.text,
            "📈 *ALERT: AAPL ABOVE THRESHOLD* 📈\n\n\
             💰 Current Price: `$201.50`\n\
             🎯 Upper Threshold: `$200.00`\n\
             📊 Difference: `+$1.50`\n\
             🕐 Time: `2026-03-02 15:30:00 UTC`"
        );
        assert_eq!(n.title.as_deref(), Some("🚨 AAPL Alert"));
        assert_eq!(n.priority, Priority::High);
        assert_eq!(n.tags, vec!["warning", "stock", "aapl"]);
    }

    #[test]
    fn test_lower_alert_difference_is_negative() {
        let event = AlertEvent {
            symbol: "TSLA".to_string(),
            kind: AlertKind::Lower,
            price: 239.0,
            threshold: 240.25,
            fired_at: at(),
        };

        let text = alert_notification(&event).text;
        assert!(text.starts_with("📉 *ALERT: TSLA BELOW THRESHOLD* 📉"));
        assert!(text.contains("🎯 Lower Threshold: `$240.25`"));
        assert!(text.contains("📊 Difference: `-$1.25`"));
    }

    #[test]
    fn test_summary_lists_unavailable_symbols() {
        let watchlist = Watchlist::new([
            ("AAPL", ThresholdConfig::default()),
            ("TSLA", ThresholdConfig::default()),
        ])
        .unwrap();
        let prices = HashMap::from([("AAPL", 190.5)]);

        let n = summary_notification(&watchlist, at(), |s| prices.get(s).copied());

        assert_eq!(
            n.text,
            "📊 *Stock Price Update*\n`2026-03-02 15:30:00 UTC`\n\n\
             `AAPL     $  190.50`\n\
             `TSLA     unavailable`"
        );
        assert_eq!(n.title.as_deref(), Some("📊 Stock Prices"));
        assert_eq!(n.tags, vec!["stock", "update"]);
    }

    #[test]
    fn test_summary_of_empty_watchlist_has_header_only() {
        let n = summary_notification(&Watchlist::default(), at(), |_| None);
        assert_eq!(n.text, "📊 *Stock Price Update*\n`2026-03-02 15:30:00 UTC`");
    }
}
