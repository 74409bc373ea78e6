use std::sync::Mutex;

use ::redis::{Client, Commands, Connection, RedisError, RedisResult};
use tracing::{info, warn};

use super::{run_blocking, KeyValueStorage, StorageError};

const KEY_ROOT: &str = "skillmatch";

/// Redis-backed storage. Each entry is one Redis string under
/// `skillmatch:<profile>:<key>`, so several profiles can share a server.
///
/// Commands are blocking round-trips and go through `run_blocking`. A dropped
/// connection is reopened once per command before the error is returned.
pub struct RedisStorage {
    client: Client,
    conn: Mutex<Option<Connection>>,
    prefix: String,
}

impl RedisStorage {
    pub fn connect(url: &str, profile: &str) -> Result<Self, StorageError> {
        let client = Client::open(url)?;
        let conn = client.get_connection()?;
        info!("Redis storage connected (profile: {profile})");
        Ok(Self {
            client,
            conn: Mutex::new(Some(conn)),
            prefix: profile_prefix(profile),
        })
    }

    fn physical(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn with_conn<T>(&self, op: impl Fn(&mut Connection) -> RedisResult<T>) -> Result<T, StorageError> {
        run_blocking(|| -> Result<T, StorageError> {
            let mut slot = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
            let mut conn = match slot.take() {
                Some(conn) => conn,
                None => self.client.get_connection()?,
            };
            let result = match op(&mut conn) {
                Err(e) if connection_lost(&e) => {
                    warn!("Redis connection lost ({e}); reconnecting");
                    conn = self.client.get_connection()?;
                    op(&mut conn)
                }
                other => other,
            };
            // A broken connection is dropped; the next command reconnects.
            if !matches!(&result, Err(e) if connection_lost(e)) {
                *slot = Some(conn);
            }
            Ok(result?)
        })
    }
}

fn connection_lost(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal()
}

fn profile_prefix(profile: &str) -> String {
    format!("{KEY_ROOT}:{profile}:")
}

/// Maps physical Redis keys back to storage keys, dropping anything outside the profile.
fn strip_profile(prefix: &str, physical: Vec<String>) -> Vec<String> {
    let mut keys: Vec<String> = physical
        .into_iter()
        .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
        .collect();
    keys.sort();
    keys.dedup(); // SCAN may return a key more than once
    keys
}

impl KeyValueStorage for RedisStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let key = self.physical(key);
        self.with_conn(|conn| conn.get::<_, Option<String>>(&key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let key = self.physical(key);
        self.with_conn(|conn| conn.set::<_, _, ()>(&key, value))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let key = self.physical(key);
        self.with_conn(|conn| conn.del::<_, ()>(&key))
    }

    fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let pattern = format!("{}*", self.prefix);
        let physical = self.with_conn(|conn| {
            Ok(conn.scan_match::<_, String>(&pattern)?.collect::<Vec<_>>())
        })?;
        Ok(strip_profile(&self.prefix, physical))
    }
}
