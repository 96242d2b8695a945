//! Boundary contracts for the two downstream reactors — invoicing and
//! customer notification — plus the reactors that drive them.
//!
//! Pricing, rendering and provider integrations live behind the
//! [`InvoiceLedger`] and [`NotificationSender`] traits.

use std::{future::Future, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  signal::{Reactor, ReactorError, ReactorFuture, StatusChanged},
  status::Status,
};

// ─── Invoicing ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
  pub invoice_id:     Uuid,
  pub shipment_id:    Uuid,
  pub invoice_number: String,
  pub issued_at:      DateTime<Utc>,
}

/// Where invoices are kept. At most one invoice exists per shipment.
pub trait InvoiceLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn invoice_for(
    &self,
    shipment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Invoice>, Self::Error>> + Send + '_;

  /// Create the shipment's invoice, or return the existing one.
  fn create_invoice(
    &self,
    shipment_id: Uuid,
    issued_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Invoice, Self::Error>> + Send + '_;
}

/// Issues an invoice the first time a shipment is delivered.
pub struct InvoiceReactor<L> {
  ledger: Arc<L>,
}

impl<L> InvoiceReactor<L> {
  pub fn new(ledger: Arc<L>) -> Self { Self { ledger } }
}

impl<L: InvoiceLedger + 'static> Reactor for InvoiceReactor<L> {
  fn name(&self) -> &'static str { "invoice" }

  fn react<'a>(&'a self, signal: &'a StatusChanged) -> ReactorFuture<'a> {
    Box::pin(async move {
      if signal.transition.to_status != Status::Delivered {
        return Ok(());
      }
      let shipment_id = signal.shipment.shipment_id;

      let existing = self
        .ledger
        .invoice_for(shipment_id)
        .await
        .map_err(ReactorError::new)?;
      if let Some(invoice) = existing {
        tracing::debug!(%shipment_id, invoice = %invoice.invoice_number, "invoice already issued");
        return Ok(());
      }

      let invoice = self
        .ledger
        .create_invoice(shipment_id, signal.transition.recorded_at)
        .await
        .map_err(ReactorError::new)?;
      tracing::info!(%shipment_id, invoice = %invoice.invoice_number, "invoice issued");
      Ok(())
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
  #[default]
  Email,
  Sms,
  Push,
  Whatsapp,
}

impl Channel {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Email => "email",
      Self::Sms => "sms",
      Self::Push => "push",
      Self::Whatsapp => "whatsapp",
    }
  }
}

impl FromStr for Channel {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "email" => Ok(Self::Email),
      "sms" => Ok(Self::Sms),
      "push" => Ok(Self::Push),
      "whatsapp" => Ok(Self::Whatsapp),
      other => Err(Error::InvalidArgument(format!("unknown channel: {other:?}"))),
    }
  }
}

/// A customer's notification settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationPreference {
  pub channel:   Channel,
  pub opted_out: bool,
}

/// A message ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  /// The signal this notification answers; doubles as a dedupe key.
  pub signal_id:       Uuid,
  pub customer_id:     Uuid,
  pub event:           &'static str,
  pub channel:         Channel,
  pub shipment_id:     Uuid,
  pub tracking_number: String,
  pub status:          Status,
}

/// Preferences and a delivery log keyed by signal id.
pub trait NotificationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn preference(
    &self,
    customer_id: Uuid,
  ) -> impl Future<Output = Result<Option<NotificationPreference>, Self::Error>>
  + Send
  + '_;

  fn was_notified(
    &self,
    signal_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn mark_notified(
    &self,
    notification: Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Hands a notification to a provider.
pub trait NotificationSender: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    notification: &'a Notification,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// The notification event raised when a shipment enters `status`, if any.
pub fn notification_event(status: Status) -> Option<&'static str> {
  Some(match status {
    Status::Booked => "shipment.booked",
    Status::PickedUp => "shipment.picked_up",
    Status::CustomsHold => "shipment.customs_hold",
    Status::OutForDelivery => "shipment.out_for_delivery",
    Status::Delivered => "shipment.delivered",
    Status::Exception => "shipment.exception",
    Status::ReturnInitiated => "shipment.return_initiated",
    Status::Returned => "shipment.returned",
    Status::Cancelled => "shipment.cancelled",
    _ => return None,
  })
}

/// Notifies the shipment's customer through their preferred channel unless
/// they have opted out.
pub struct NotificationReactor<N, T> {
  store:  Arc<N>,
  sender: Arc<T>,
}

impl<N, T> NotificationReactor<N, T> {
  pub fn new(store: Arc<N>, sender: Arc<T>) -> Self { Self { store, sender } }
}

impl<N, T> Reactor for NotificationReactor<N, T>
where
  N: NotificationStore + 'static,
  T: NotificationSender + 'static,
{
  fn name(&self) -> &'static str { "notification" }

  fn react<'a>(&'a self, signal: &'a StatusChanged) -> ReactorFuture<'a> {
    Box::pin(async move {
      let shipment = &signal.shipment;
      let status = signal.transition.to_status;
      let (Some(event), Some(customer_id)) =
        (notification_event(status), shipment.customer_id)
      else {
        return Ok(());
      };

      let preference = self
        .store
        .preference(customer_id)
        .await
        .map_err(ReactorError::new)?
        .unwrap_or_default();
      if preference.opted_out {
        tracing::debug!(%customer_id, event, "customer opted out; skipping");
        return Ok(());
      }

      if self
        .store
        .was_notified(signal.signal_id)
        .await
        .map_err(ReactorError::new)?
      {
        return Ok(());
      }

      let notification = Notification {
        signal_id: signal.signal_id,
        customer_id,
        event,
        channel: preference.channel,
        shipment_id: shipment.shipment_id,
        tracking_number: shipment.tracking_number.clone(),
        status,
      };
      self.sender.send(&notification).await.map_err(ReactorError::new)?;
      self
        .store
        .mark_notified(notification)
        .await
        .map_err(ReactorError::new)?;
      Ok(())
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    context::TransitionContext,
    lifecycle,
    shipment::NewShipment,
  };

  #[derive(Debug, thiserror::Error)]
  #[error("never")]
  struct Never;

  #[derive(Default)]
  struct MemLedger {
    invoices: Mutex<Vec<Invoice>>,
  }

  impl InvoiceLedger for MemLedger {
    type Error = Never;

    async fn invoice_for(&self, shipment_id: Uuid) -> Result<Option<Invoice>, Never> {
      Ok(
        self
          .invoices
          .lock()
          .unwrap()
          .iter()
          .find(|i| i.shipment_id == shipment_id)
          .cloned(),
      )
    }

    async fn create_invoice(
      &self,
      shipment_id: Uuid,
      issued_at: DateTime<Utc>,
    ) -> Result<Invoice, Never> {
      let invoice = Invoice {
        invoice_id: Uuid::new_v4(),
        shipment_id,
        invoice_number: format!("INV-{shipment_id}"),
        issued_at,
      };
      self.invoices.lock().unwrap().push(invoice.clone());
      Ok(invoice)
    }
  }

  #[derive(Default)]
  struct MemNotifications {
    opted_out: bool,
    sent:      Mutex<Vec<Notification>>,
  }

  impl NotificationStore for MemNotifications {
    type Error = Never;

    async fn preference(
      &self,
      _customer_id: Uuid,
    ) -> Result<Option<NotificationPreference>, Never> {
      Ok(Some(NotificationPreference {
        channel:   Channel::Sms,
        opted_out: self.opted_out,
      }))
    }

    async fn was_notified(&self, signal_id: Uuid) -> Result<bool, Never> {
      Ok(self.sent.lock().unwrap().iter().any(|n| n.signal_id == signal_id))
    }

    async fn mark_notified(&self, notification: Notification) -> Result<(), Never> {
      self.sent.lock().unwrap().push(notification);
      Ok(())
    }
  }

  #[derive(Default)]
  struct CountingSender {
    sends: Mutex<usize>,
  }

  impl NotificationSender for CountingSender {
    type Error = Never;

    async fn send<'a>(&'a self, _notification: &'a Notification) -> Result<(), Never> {
      *self.sends.lock().unwrap() += 1;
      Ok(())
    }
  }

  fn signal_into(target: Status) -> StatusChanged {
    let mut input = NewShipment::new("TRK-9", "AWB-9");
    input.customer_id = Some(Uuid::new_v4());
    let (mut shipment, _) =
      lifecycle::book(input, &TransitionContext::default(), Utc::now()).unwrap();
    let ctx = TransitionContext { force: true, ..Default::default() };
    let transition = lifecycle::apply(&mut shipment, target, &ctx, Utc::now()).unwrap();
    StatusChanged::new(shipment, transition, None, Utc::now())
  }

  #[tokio::test]
  async fn invoice_is_issued_once_on_delivery() {
    let ledger = Arc::new(MemLedger::default());
    let reactor = InvoiceReactor::new(ledger.clone());

    let signal = signal_into(Status::Delivered);
    reactor.react(&signal).await.unwrap();
    reactor.react(&signal).await.unwrap();
    assert_eq!(ledger.invoices.lock().unwrap().len(), 1);

    reactor.react(&signal_into(Status::OutForDelivery)).await.unwrap();
    assert_eq!(ledger.invoices.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn notification_is_deduplicated_by_signal() {
    let store = Arc::new(MemNotifications::default());
    let sender = Arc::new(CountingSender::default());
    let reactor = NotificationReactor::new(store.clone(), sender.clone());

    let signal = signal_into(Status::Delivered);
    reactor.react(&signal).await.unwrap();
    reactor.react(&signal).await.unwrap();

    assert_eq!(*sender.sends.lock().unwrap(), 1);
    let sent = store.sent.lock().unwrap();
    assert_eq!(sent[0].event, "shipment.delivered");
    assert_eq!(sent[0].channel, Channel::Sms);
  }

  #[tokio::test]
  async fn opted_out_customer_is_not_notified() {
    let store = Arc::new(MemNotifications { opted_out: true, ..Default::default() });
    let sender = Arc::new(CountingSender::default());
    let reactor = NotificationReactor::new(store, sender.clone());

    reactor.react(&signal_into(Status::Delivered)).await.unwrap();
    assert_eq!(*sender.sends.lock().unwrap(), 0);
  }

  #[tokio::test]
  async fn silent_statuses_send_nothing() {
    let store = Arc::new(MemNotifications::default());
    let sender = Arc::new(CountingSender::default());
    let reactor = NotificationReactor::new(store, sender.clone());

    reactor.react(&signal_into(Status::LinehaulDeparted)).await.unwrap();
    assert_eq!(*sender.sends.lock().unwrap(), 0);
  }
}
