//! Redis-backed key/value publication (optional).
//!
//! Each publish is a blocking `SET` run on the tokio blocking pool.

use async_trait::async_trait;
use redis::Commands;

use super::kv::KeyValueStore;
use super::DeliveryError;

#[derive(Debug, Clone)]
pub struct RedisKv {
    client: redis::Client,
}

impl RedisKv {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, DeliveryError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| DeliveryError::KeyValue(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KeyValueStore for RedisKv {
    async fn put(&self, key: &str, value: &str) -> Result<(), DeliveryError> {
        let client = self.client.clone();
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = client
                .get_connection()
                .map_err(|e| DeliveryError::KeyValue(e.to_string()))?;
            let _: () = conn
                .set(&key, &value)
                .map_err(|e| DeliveryError::KeyValue(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| DeliveryError::KeyValue(e.to_string()))?
    }
}
