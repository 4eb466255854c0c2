//! Kafka publisher implementation for the relay gateway.
//!
//! This crate implements the [`RequestPublisher`] port from `relay-core` on
//! top of rdkafka. It works against any Kafka-compatible broker (Apache
//! Kafka, Redpanda, AWS MSK, ...).
//!
//! # What a publish does
//!
//! - serializes the envelope's wire body to JSON (readable by a consumer in
//!   any language),
//! - attaches the envelope's trace headers as Kafka record headers, so
//!   consumer-side tracing middleware finds them where it expects them,
//! - keys the record by the correlation id, so the record routes like any
//!   other and every consumer instance can be addressed uniformly,
//! - sends, honoring the configured [`DeliveryMode`].
//!
//! # Delivery modes
//!
//! [`DeliveryMode::AwaitAck`] waits for the broker delivery report, bounded
//! by the publish timeout, and returns `PublishAck::Confirmed`.
//! [`DeliveryMode::FireAndForget`] enqueues and returns
//! `PublishAck::Pending` immediately; the delivery report is forwarded
//! through the ack's [`DeliveryHandle`](relay_core::DeliveryHandle) so the
//! caller still observes asynchronous failures. One code path, one flag.
//!
//! # Example
//!
//! ```no_run
//! use relay_kafka::KafkaRequestPublisher;
//! use relay_core::{CorrelationId, RequestEnvelope, RequestPublisher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let publisher = KafkaRequestPublisher::builder()
//!     .brokers("localhost:9092")
//!     .topic("relay-requests")
//!     .build()?;
//!
//! let envelope = RequestEnvelope::new(CorrelationId::new(), "hello");
//! publisher.publish(envelope).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use relay_core::publisher::DeliveryHandle;
use relay_core::{PublishAck, PublishError, RequestEnvelope, RequestPublisher};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

/// Whether `publish` waits for the broker delivery report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Block until the broker acknowledges, bounded by the publish timeout.
    #[default]
    AwaitAck,
    /// Enqueue and return; the delivery report arrives through the ack's
    /// handle.
    FireAndForget,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "await-ack" | "ack" => Ok(Self::AwaitAck),
            "fire-and-forget" | "async" => Ok(Self::FireAndForget),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

/// Kafka-backed [`RequestPublisher`].
///
/// The producer handle is internally reference-counted and safe for
/// concurrent use by every in-flight request task.
pub struct KafkaRequestPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
    delivery_mode: DeliveryMode,
}

impl KafkaRequestPublisher {
    /// Create a builder for configuring the publisher.
    #[must_use]
    pub fn builder() -> KafkaRequestPublisherBuilder {
        KafkaRequestPublisherBuilder::default()
    }

    /// The topic this publisher sends to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Builder for a [`KafkaRequestPublisher`].
#[derive(Default)]
pub struct KafkaRequestPublisherBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    delivery_mode: DeliveryMode,
}

impl KafkaRequestPublisherBuilder {
    /// Comma-separated broker addresses (e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Topic to publish request envelopes to.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Producer acknowledgement mode: "0", "1" or "all". Default: "1".
    #[must_use]
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// Compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    /// Default: "none".
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Publish timeout. Bounds the wait for the delivery report (and the
    /// broker-side message timeout). Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Delivery mode. Default: [`DeliveryMode::AwaitAck`].
    #[must_use]
    pub const fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    /// Build the publisher.
    ///
    /// # Errors
    ///
    /// [`PublishError::BrokerUnavailable`] if brokers or topic are missing or
    /// the producer cannot be created.
    pub fn build(self) -> Result<KafkaRequestPublisher, PublishError> {
        let brokers = self
            .brokers
            .ok_or_else(|| PublishError::BrokerUnavailable("brokers not configured".to_string()))?;
        let topic = self
            .topic
            .ok_or_else(|| PublishError::BrokerUnavailable("topic not configured".to_string()))?;
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", self.acks.as_deref().unwrap_or("1"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = config.create().map_err(|e| {
            PublishError::BrokerUnavailable(format!("failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            acks = self.acks.as_deref().unwrap_or("1"),
            delivery_mode = ?self.delivery_mode,
            "Kafka request publisher created"
        );

        Ok(KafkaRequestPublisher {
            producer,
            topic,
            timeout,
            delivery_mode: self.delivery_mode,
        })
    }
}

fn record_headers(envelope: &RequestEnvelope) -> OwnedHeaders {
    let mut headers = OwnedHeaders::new_with_capacity(envelope.trace_headers.len());
    for (key, value) in &envelope.trace_headers {
        headers = headers.insert(Header {
            key,
            value: Some(value.as_str()),
        });
    }
    headers
}

fn map_kafka_error(error: &KafkaError, timeout: Duration) -> PublishError {
    match error {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => {
            PublishError::Timeout(timeout)
        }
        other => PublishError::BrokerUnavailable(other.to_string()),
    }
}

impl RequestPublisher for KafkaRequestPublisher {
    fn publish(
        &self,
        envelope: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<PublishAck, PublishError>> + Send + '_>> {
        Box::pin(async move {
            let correlation_id = envelope.correlation_id;
            let body = envelope
                .wire_body()
                .to_json()
                .map_err(|e| PublishError::Serialization(e.to_string()))?;
            let headers = record_headers(&envelope);
            let key = correlation_id.to_string();

            match self.delivery_mode {
                DeliveryMode::AwaitAck => {
                    let record = FutureRecord::to(&self.topic)
                        .payload(&body)
                        .key(&key)
                        .headers(headers);

                    match self.producer.send(record, Timeout::After(self.timeout)).await {
                        Ok((partition, offset)) => {
                            tracing::debug!(
                                correlation_id = %correlation_id,
                                topic = %self.topic,
                                partition,
                                offset,
                                "envelope published"
                            );
                            Ok(PublishAck::Confirmed)
                        }
                        Err((error, _)) => {
                            tracing::error!(
                                correlation_id = %correlation_id,
                                topic = %self.topic,
                                error = %error,
                                "failed to publish envelope"
                            );
                            Err(map_kafka_error(&error, self.timeout))
                        }
                    }
                }
                DeliveryMode::FireAndForget => {
                    let (report, handle) = DeliveryHandle::channel();
                    let producer = self.producer.clone();
                    let topic = self.topic.clone();
                    let timeout = self.timeout;

                    tokio::spawn(async move {
                        let record = FutureRecord::to(&topic)
                            .payload(&body)
                            .key(&key)
                            .headers(headers);

                        let outcome = match producer.send(record, Timeout::After(timeout)).await {
                            Ok((partition, offset)) => {
                                tracing::debug!(
                                    correlation_id = %correlation_id,
                                    topic = %topic,
                                    partition,
                                    offset,
                                    "envelope delivered"
                                );
                                Ok(())
                            }
                            Err((error, _)) => {
                                tracing::error!(
                                    correlation_id = %correlation_id,
                                    topic = %topic,
                                    error = %error,
                                    "asynchronous delivery failed"
                                );
                                Err(map_kafka_error(&error, timeout))
                            }
                        };
                        report.complete(outcome);
                    });

                    Ok(PublishAck::Pending(handle))
                }
            }
        })
    }
}
