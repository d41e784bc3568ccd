use amiquip::{
    Channel, Connection, ConsumerMessage, ConsumerOptions, Exchange, Publish, QueueDeclareOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::SinkError;
use crate::global_variables::{QUEUE_INCIDENTS, QUEUE_LIGHT_ADJUSTMENTS};
use crate::monitoring::sink::{log_to_csv, RecordSink};
use crate::shared_data::{
    IncidentRecord, LightAdjustmentRecord, PerformanceRecord, QueueRecord, SpeedRecord,
};

/// Forwards every record to an inner sink and also publishes incidents and
/// light adjustments to RabbitMQ. Broker trouble is logged and never stops
/// the run.
pub struct AmqpPublisher<S: RecordSink> {
    inner: S,
    channel: Option<Channel>,
    connection: Option<Connection>,
}

impl<S: RecordSink> AmqpPublisher<S> {
    pub fn new(inner: S, url: &str) -> Self {
        match open_channel(url) {
            Ok((connection, channel)) => {
                log::info!("Publishing incidents and light adjustments to {}", url);
                Self {
                    inner,
                    channel: Some(channel),
                    connection: Some(connection),
                }
            }
            Err(e) => {
                log::warn!("AMQP broker at {} unavailable, not publishing: {}", url, e);
                Self {
                    inner,
                    channel: None,
                    connection: None,
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    fn publish<T: Serialize>(&mut self, queue: &str, record: &T) {
        let Some(channel) = &self.channel else {
            return;
        };
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Cannot encode record for {}: {}", queue, e);
                return;
            }
        };
        let exchange = Exchange::direct(channel);
        if let Err(e) = exchange.publish(Publish::new(payload.as_bytes(), queue)) {
            log::warn!("Publishing to {} failed, publisher disabled: {}", queue, e);
            self.channel = None;
        }
    }

    /// Closes the broker connection and hands back the inner sink.
    pub fn close(mut self) -> S {
        self.channel = None;
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close() {
                log::warn!("Closing AMQP connection failed: {}", e);
            }
        }
        self.inner
    }
}

fn open_channel(url: &str) -> Result<(Connection, Channel), amiquip::Error> {
    let mut connection = Connection::insecure_open(url)?;
    let channel = connection.open_channel(None)?;
    channel.queue_declare(QUEUE_INCIDENTS, QueueDeclareOptions::default())?;
    channel.queue_declare(QUEUE_LIGHT_ADJUSTMENTS, QueueDeclareOptions::default())?;
    Ok((connection, channel))
}

impl<S: RecordSink> RecordSink for AmqpPublisher<S> {
    fn queue(&mut self, record: &QueueRecord) -> Result<(), SinkError> {
        self.inner.queue(record)
    }

    fn speed(&mut self, record: &SpeedRecord) -> Result<(), SinkError> {
        self.inner.speed(record)
    }

    fn incident(&mut self, record: &IncidentRecord) -> Result<(), SinkError> {
        self.publish(QUEUE_INCIDENTS, record);
        self.inner.incident(record)
    }

    fn light_adjustment(&mut self, record: &LightAdjustmentRecord) -> Result<(), SinkError> {
        self.publish(QUEUE_LIGHT_ADJUSTMENTS, record);
        self.inner.light_adjustment(record)
    }

    fn performance(&mut self, record: &PerformanceRecord) -> Result<(), SinkError> {
        self.inner.performance(record)
    }

    fn summary(&mut self, text: &str) -> Result<(), SinkError> {
        self.inner.summary(text)
    }
}

/// Consumes JSON records of type `T` from `queue` and appends each to the
/// CSV file at `path` until the consumer ends.
fn consume_to_csv<T>(url: &str, queue: &str, path: &PathBuf) -> Result<(), SinkError>
where
    T: DeserializeOwned + Serialize,
{
    let mut connection = Connection::insecure_open(url)?;
    let channel = connection.open_channel(None)?;
    let queue_handle = channel.queue_declare(queue, QueueDeclareOptions::default())?;
    let consumer = queue_handle.consume(ConsumerOptions::default())?;
    log::info!("Listening on '{}', logging to {}", queue, path.display());
    for message in consumer.receiver() {
        match message {
            ConsumerMessage::Delivery(delivery) => {
                match serde_json::from_slice::<T>(&delivery.body) {
                    Ok(record) => {
                        if let Err(e) = log_to_csv(path, &record) {
                            log::error!("Error logging {} record: {}", queue, e);
                        }
                    }
                    Err(e) => log::warn!("Dropping malformed {} message: {}", queue, e),
                }
                consumer.ack(delivery)?;
            }
            other => {
                log::info!("{} consumer ended: {:?}", queue, other);
                break;
            }
        }
    }
    connection.close()?;
    Ok(())
}

/// Listens to the incidents queue and logs each record.
pub async fn listen_incidents(url: String, path: PathBuf) -> Result<(), SinkError> {
    tokio::task::spawn_blocking(move || consume_to_csv::<IncidentRecord>(&url, QUEUE_INCIDENTS, &path))
        .await?
}

/// Listens to the light adjustments queue and logs each record.
pub async fn listen_light_adjustments(url: String, path: PathBuf) -> Result<(), SinkError> {
    tokio::task::spawn_blocking(move || {
        consume_to_csv::<LightAdjustmentRecord>(&url, QUEUE_LIGHT_ADJUSTMENTS, &path)
    })
    .await?
}
