//! Notification dispatcher - renders a cycle's drops and hands them to the notifier

use crate::domain::types::DropRecord;
use crate::infra::config::Config;
use crate::io::notifier::{Notification, Notifier};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{error, info};

const SEPARATOR: &str = "------------------------------";

/// Format an integer price with `,` thousands separators
pub fn format_price(price: u64) -> String {
    let digits = price.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Render the report body, one block per record in the order given
pub fn render_body(drops: &[DropRecord], currency_symbol: &str) -> String {
    let mut body = String::from("Flight Price Drops Detected!\n\n");
    for drop in drops {
        let old = drop.old.unwrap_or(drop.new);
        let _ = writeln!(body, "Date: {}", drop.date);
        let _ = writeln!(body, "Previous Price: {}{}", currency_symbol, format_price(old));
        let _ = writeln!(body, "New Price: {}{}", currency_symbol, format_price(drop.new));
        let _ = writeln!(body, "Savings: {}{}", currency_symbol, format_price(drop.savings()));
        let _ = writeln!(body, "{}", SEPARATOR);
    }
    body.push_str("\nCheck your flight search for more details!");
    body
}

pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    recipient: String,
    subject: String,
    currency_symbol: String,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        recipient: &str,
        subject: &str,
        currency_symbol: &str,
    ) -> Self {
        Self {
            notifier,
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            currency_symbol: currency_symbol.to_string(),
        }
    }

    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            notifier,
            config.recipient(),
            &config.notification_subject(),
            config.currency_symbol(),
        )
    }

    pub fn render(&self, drops: &[DropRecord]) -> Notification {
        Notification {
            to: self.recipient.clone(),
            subject: self.subject.clone(),
            body: render_body(drops, &self.currency_symbol),
        }
    }

    /// Send one report for the batch
    ///
    /// Returns false without contacting the notifier when the batch is empty,
    /// and on delivery failure (logged, never propagated).
    pub async fn dispatch(&self, drops: &[DropRecord]) -> bool {
        if drops.is_empty() {
            return false;
        }

        let notification = self.render(drops);
        match self.notifier.send(&notification).await {
            Ok(()) => {
                info!(
                    notifier = %self.notifier.name(),
                    to = %self.recipient,
                    drops = %drops.len(),
                    "drop_notification_sent"
                );
                true
            }
            Err(e) => {
                error!(
                    notifier = %self.notifier.name(),
                    to = %self.recipient,
                    drops = %drops.len(),
                    error = %e,
                    "drop_notification_failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::DateKey;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp unreachable");
            }
            self.sent.lock().push(notification.clone());
            Ok(())
        }
    }

    fn record(date: &str, old: u64, new: u64) -> DropRecord {
        DropRecord { date: date.parse::<DateKey>().unwrap(), old: Some(old), new }
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0), "0");
        assert_eq!(format_price(480), "480");
        assert_eq!(format_price(5300), "5,300");
        assert_eq!(format_price(1234567), "1,234,567");
        assert_eq!(format_price(100000), "100,000");
    }

    #[test]
    fn test_render_body() {
        let body = render_body(&[record("2025-10-10", 5300, 4800)], "₹");
        let expected = "Flight Price Drops Detected!\n\n\
            Date: 2025-10-10\n\
            Previous Price: ₹5,300\n\
            New Price: ₹4,800\n\
            Savings: ₹500\n\
            ------------------------------\n\
            \nCheck your flight search for more details!";
        assert_eq!(body, expected);
    }

    #[test]
    fn test_render_keeps_record_order() {
        let body = render_body(&[record("2025-10-12", 900, 800), record("2025-10-10", 500, 480)], "$");
        let first = body.find("2025-10-12").unwrap();
        let second = body.find("2025-10-10").unwrap();
        assert!(first < second);
        assert_eq!(body.matches(SEPARATOR).count(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_not_sent() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(notifier.clone(), "me@example.com", "subj", "₹");

        assert!(!dispatcher.dispatch(&[]).await);
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_single_report_for_batch() {
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::from_config(&Config::default(), notifier.clone());

        let sent = dispatcher
            .dispatch(&[record("2025-10-10", 500, 480), record("2025-10-11", 700, 650)])
            .await;

        assert!(sent);
        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Flight Price Drop Alert - BLR to UDR");
        assert!(sent[0].body.contains("Savings: ₹20"));
        assert!(sent[0].body.contains("Savings: ₹50"));
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
        let dispatcher = Dispatcher::new(notifier, "me@example.com", "subj", "₹");

        assert!(!dispatcher.dispatch(&[record("2025-10-10", 500, 480)]).await);
    }
}
