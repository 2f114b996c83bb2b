//! Ledger Notifications
//!
//! Fire-and-forget signals for collaborators (e.g. a push channel to
//! connected clients). Events are dropped when nobody listens.

use pot_core::AccountId;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 256;

/// Ledger change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// An account received new entries or remainder
    Credited { account_id: AccountId },
    /// Aggregate figures (totals, pot size) changed
    InfoChanged,
    /// Entry price was refreshed
    PriceChanged { price: u64 },
}

/// Broadcast hub for [`LedgerEvent`]s
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<LedgerEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: LedgerEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(?event, "No subscribers for ledger event");
        }
    }

    /// One event per credited account followed by a global one
    pub fn credited<I>(&self, accounts: I)
    where
        I: IntoIterator<Item = AccountId>,
    {
        for account_id in accounts {
            self.publish(LedgerEvent::Credited { account_id });
        }
        self.publish(LedgerEvent::InfoChanged);
    }

    pub fn price_changed(&self, price: u64) {
        self.publish(LedgerEvent::PriceChanged { price });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_credited_fan_out() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.credited([3, 7]);

        assert_eq!(rx.recv().await.unwrap(), LedgerEvent::Credited { account_id: 3 });
        assert_eq!(rx.recv().await.unwrap(), LedgerEvent::Credited { account_id: 7 });
        assert_eq!(rx.recv().await.unwrap(), LedgerEvent::InfoChanged);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = Notifier::new();
        notifier.price_changed(10);
    }
}
