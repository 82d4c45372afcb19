//! HTTP remote store.
//!
//! Talks to a REST rendition of the schedule collection. Collections travel
//! as date-keyed JSON objects and pushes arrive as Server-Sent Events.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use jamahsync_core::schedule::{
    collection_from_records, connection_flag, date_key, record_from_entry,
    records_from_collection, ScheduleRecord,
};
use jamahsync_core::storage::{
    CancelHandle, DateRange, RemoteError, RemoteScheduleStore, RemoteSubscription, Result,
};

use super::sse::{decode_snapshot, parse_sse_message};

/// Buffered pushes per subscription.
const CHANNEL_CAPACITY: usize = 16;

/// Remote store backed by the schedule REST API.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Create a store for the API at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn record_url(&self, date: NaiveDate) -> String {
        self.url(&format!("/api/schedule/{}", date_key(date)))
    }

    async fn fetch_collection(&self, request: reqwest::RequestBuilder) -> Result<Vec<ScheduleRecord>> {
        let response = request.send().await.map_err(unavailable)?;
        let response = ensure_success(response, RemoteError::Unavailable).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidData(e.to_string()))?;
        decode_collection(&value)
    }
}

fn unavailable(err: reqwest::Error) -> RemoteError {
    RemoteError::Unavailable(err.to_string())
}

/// Passes successful responses through and turns the rest into `kind`.
async fn ensure_success(
    response: reqwest::Response,
    kind: fn(String) -> RemoteError,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(kind(format!("HTTP {}: {}", status.as_u16(), message)))
}

/// Decodes a collection body. `null` is an empty collection.
fn decode_collection(value: &Value) -> Result<Vec<ScheduleRecord>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    records_from_collection(value).map_err(|e| RemoteError::InvalidData(e.to_string()))
}

#[async_trait]
impl RemoteScheduleStore for HttpRemoteStore {
    async fn get_all(&self) -> Result<Vec<ScheduleRecord>> {
        self.fetch_collection(self.client.get(self.url("/api/schedule")))
            .await
    }

    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<ScheduleRecord>> {
        let response = self
            .client
            .get(self.record_url(date))
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, RemoteError::Unavailable).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidData(e.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }

        record_from_entry(&date_key(date), &value)
            .map(Some)
            .map_err(|e| RemoteError::InvalidData(e.to_string()))
    }

    async fn get_by_range(&self, range: DateRange) -> Result<Vec<ScheduleRecord>> {
        let request = self.client.get(self.url("/api/schedule")).query(&[
            ("start", date_key(range.start)),
            ("end", date_key(range.end)),
        ]);
        let records = self.fetch_collection(request).await?;
        Ok(records.into_iter().filter(|r| range.contains(r.date)).collect())
    }

    async fn write(&self, record: &ScheduleRecord) -> Result<()> {
        let response = self
            .client
            .put(self.record_url(record.date))
            .json(record)
            .send()
            .await
            .map_err(unavailable)?;
        ensure_success(response, RemoteError::WriteFailed).await?;
        Ok(())
    }

    /// Sends every record in one multi-key update.
    async fn write_batch(&self, records: &[ScheduleRecord]) -> Result<()> {
        let response = self
            .client
            .patch(self.url("/api/schedule"))
            .json(&collection_from_records(records))
            .send()
            .await
            .map_err(unavailable)?;
        ensure_success(response, RemoteError::WriteFailed).await?;
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<()> {
        let response = self
            .client
            .delete(self.record_url(date))
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        ensure_success(response, RemoteError::WriteFailed).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<RemoteSubscription> {
        let url = self.url("/api/schedule/events");
        tracing::info!(%url, "Starting SSE connection");

        let response = self
            .client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(unavailable)?;
        let response = ensure_success(response, RemoteError::Unavailable).await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (cancel, mut cancelled) = CancelHandle::new();

        tokio::spawn(async move {
            let snapshots = snapshot_stream(response);
            tokio::pin!(snapshots);

            loop {
                tokio::select! {
                    _ = &mut cancelled => {
                        tracing::info!("SSE connection cancelled");
                        break;
                    }
                    item = snapshots.next() => match item {
                        Some(Ok(records)) => {
                            if tx.send(records).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(RemoteError::InvalidData(err))) => {
                            tracing::warn!(error = %err, "Skipping undecodable snapshot");
                        }
                        Some(Err(err)) => {
                            tracing::error!(error = %err, "SSE stream error");
                            break;
                        }
                        None => {
                            tracing::info!("SSE stream ended");
                            break;
                        }
                    },
                }
            }
        });

        Ok(RemoteSubscription {
            updates: rx,
            cancel,
        })
    }

    async fn is_online(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/api/schedule/connection"))
            .send()
            .await
            .map_err(unavailable)?;
        let response = ensure_success(response, RemoteError::Unavailable).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidData(e.to_string()))?;

        Ok(connection_flag(&value)
            .or_else(|| value.as_bool())
            .unwrap_or(false))
    }
}

/// Turns an SSE response into a stream of decoded snapshots.
fn snapshot_stream(response: reqwest::Response) -> impl Stream<Item = Result<Vec<ScheduleRecord>>> {
    async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => {
                    buffer.push_str(&String::from_utf8_lossy(&chunk));

                    while let Some((message, remaining)) = parse_sse_message(&buffer) {
                        buffer = remaining;
                        if let Some(decoded) = decode_snapshot(&message) {
                            yield decoded.map_err(|e| RemoteError::InvalidData(e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    yield Err(RemoteError::Unavailable(e.to_string()));
                    break;
                }
            }
        }
    }
}
