//! Outbound event model. The TSS core only produces these
//! events; delivering them (Kafka, SNS, webhooks, ...) is an external
//! collaborator reached through the `EventProducer` capability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tss_types::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    PaymentCompleted,
    WalletCreationCompleted,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::PaymentCompleted => "PaymentCompletedTopic",
            Topic::WalletCreationCompleted => "WalletCreationCompletedTopic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    PaymentCompletedSuccess,
    PaymentCompletedError,
    WalletCreationCompletedSuccess,
    WalletCreationCompletedError,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::PaymentCompletedSuccess => "PaymentCompletedSuccessType",
            EventType::PaymentCompletedError => "PaymentCompletedErrorType",
            EventType::WalletCreationCompletedSuccess => "WalletCreationCompletedSuccessType",
            EventType::WalletCreationCompletedError => "WalletCreationCompletedErrorType",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompletedData {
    pub transaction_id: String,
    pub payment_id: String,
    pub payment_status: String,
    pub payment_status_message: String,
    pub payment_completed_at: DateTime<Utc>,
    pub stellar_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCreationCompletedData {
    pub transaction_id: String,
    pub wallet_public_key: String,
    pub status: String,
    pub status_message: String,
    pub completed_at: DateTime<Utc>,
    pub stellar_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventData {
    Payment(PaymentCompletedData),
    WalletCreation(WalletCreationCompletedData),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub key: String,
    pub tenant_id: TenantId,
    pub event_type: EventType,
    pub data: EventData,
}

impl Event {
    pub fn payment_success(
        tenant_id: TenantId,
        transaction_id: impl Into<String>,
        external_id: impl Into<String>,
        completed_at: DateTime<Utc>,
        stellar_transaction_id: Option<String>,
    ) -> Self {
        let transaction_id = transaction_id.into();
        Self {
            topic: Topic::PaymentCompleted,
            key: transaction_id.clone(),
            tenant_id,
            event_type: EventType::PaymentCompletedSuccess,
            data: EventData::Payment(PaymentCompletedData {
                transaction_id,
                payment_id: external_id.into(),
                payment_status: "SUCCESS".into(),
                payment_status_message: String::new(),
                payment_completed_at: completed_at,
                stellar_transaction_id,
            }),
        }
    }

    pub fn payment_error(
        tenant_id: TenantId,
        transaction_id: impl Into<String>,
        external_id: impl Into<String>,
        completed_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let transaction_id = transaction_id.into();
        Self {
            topic: Topic::PaymentCompleted,
            key: transaction_id.clone(),
            tenant_id,
            event_type: EventType::PaymentCompletedError,
            data: EventData::Payment(PaymentCompletedData {
                transaction_id,
                payment_id: external_id.into(),
                payment_status: "FAILED".into(),
                payment_status_message: message.into(),
                payment_completed_at: completed_at,
                stellar_transaction_id: None,
            }),
        }
    }

    pub fn wallet_creation_success(
        tenant_id: TenantId,
        transaction_id: impl Into<String>,
        wallet_public_key: impl Into<String>,
        completed_at: DateTime<Utc>,
        stellar_transaction_id: Option<String>,
    ) -> Self {
        let transaction_id = transaction_id.into();
        Self {
            topic: Topic::WalletCreationCompleted,
            key: transaction_id.clone(),
            tenant_id,
            event_type: EventType::WalletCreationCompletedSuccess,
            data: EventData::WalletCreation(WalletCreationCompletedData {
                transaction_id,
                wallet_public_key: wallet_public_key.into(),
                status: "SUCCESS".into(),
                status_message: String::new(),
                completed_at,
                stellar_transaction_id,
            }),
        }
    }

    pub fn wallet_creation_error(
        tenant_id: TenantId,
        transaction_id: impl Into<String>,
        wallet_public_key: impl Into<String>,
        completed_at: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let transaction_id = transaction_id.into();
        Self {
            topic: Topic::WalletCreationCompleted,
            key: transaction_id.clone(),
            tenant_id,
            event_type: EventType::WalletCreationCompletedError,
            data: EventData::WalletCreation(WalletCreationCompletedData {
                transaction_id,
                wallet_public_key: wallet_public_key.into(),
                status: "FAILED".into(),
                status_message: message.into(),
                completed_at,
                stellar_transaction_id: None,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventProducerError {
    #[error("failed to publish event: {0}")]
    Publish(String),
}

/// Outbound event producer capability. The core never talks to a message
/// bus directly — it hands events to this trait; messaging notifications
/// are an external collaborator.
#[async_trait]
pub trait EventProducer: Send + Sync {
    async fn publish(&self, event: Event) -> Result<(), EventProducerError>;
}

/// Logs events instead of publishing them — used in tests and as a safe
/// default before a real producer is wired up.
pub struct LoggingEventProducer;

#[async_trait]
impl EventProducer for LoggingEventProducer {
    async fn publish(&self, event: Event) -> Result<(), EventProducerError> {
        tracing::info!(
            topic = event.topic.as_str(),
            event_type = event.event_type.as_str(),
            tenant_id = %event.tenant_id,
            "publishing outbound event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_producer_accepts_events() {
        let producer = LoggingEventProducer;
        let event = Event::payment_success(
            TenantId::new("t1").unwrap(),
            "tx-1",
            "ext-1",
            Utc::now(),
            Some("hash".into()),
        );
        assert!(producer.publish(event).await.is_ok());
    }

    #[test]
    fn topic_and_type_strings_match_spec() {
        assert_eq!(Topic::PaymentCompleted.as_str(), "PaymentCompletedTopic");
        assert_eq!(
            EventType::PaymentCompletedSuccess.as_str(),
            "PaymentCompletedSuccessType"
        );
        assert_eq!(
            EventType::PaymentCompletedError.as_str(),
            "PaymentCompletedErrorType"
        );
    }
}
