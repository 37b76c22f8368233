use crate::scale::{from_minor_units, to_minor_units};
use async_trait::async_trait;
use ledger_errors::LedgerError;
use ledger_types::traits::{AtomicCounter, CounterOutcome, CounterReason};
use ledger_types::AccountId;
use once_cell::sync::Lazy;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, ConnectionInfo, Script};
use rust_decimal::Decimal;
use tracing::{debug, trace};

const DEFAULT_TTL_SECONDS: usize = 30;
const DEFAULT_KEY_PREFIX: &str = "ledger";

/// Atomically: load current (absent ⇒ 0), compute `candidate = current +
/// delta`, reject with `overspend`/`negative` if it would cross the given
/// ceiling or go below zero, otherwise store it and refresh its TTL. This is
/// the only place check-and-set logic for the counter lives; it must not be
/// decomposed into a client-side get/set sequence.
static ADD_BOUNDED: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local current = tonumber(redis.call('GET', KEYS[1]) or '0')
        local delta = tonumber(ARGV[1])
        local ceiling = tonumber(ARGV[2])
        local ttl = tonumber(ARGV[3])
        local candidate = current + delta

        if candidate > ceiling then
            return {0, current, 'overspend'}
        end
        if candidate < 0 then
            return {0, current, 'negative'}
        end

        redis.call('SET', KEYS[1], candidate, 'EX', ttl)
        return {1, candidate, 'ok'}
        ",
    )
});

/// Subtracts `amount` from the counter, clamped so the result never goes
/// below zero. Used only to roll back a fast-path reservation after a
/// durable sub-entry insert fails.
static SUBTRACT_FLOORED: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local current = tonumber(redis.call('GET', KEYS[1]) or '0')
        local amount = tonumber(ARGV[1])
        local ttl = tonumber(ARGV[2])
        local candidate = current - amount
        if candidate < 0 then
            candidate = 0
        end
        redis.call('SET', KEYS[1], candidate, 'EX', ttl)
        return candidate
        ",
    )
});

pub struct RedisCounterBuilder {
    redis_uri: ConnectionInfo,
    ttl_seconds: usize,
    key_prefix: String,
}

impl RedisCounterBuilder {
    pub fn new(redis_uri: ConnectionInfo) -> Self {
        RedisCounterBuilder {
            redis_uri,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
        }
    }

    pub fn ttl_seconds(mut self, ttl_seconds: usize) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub async fn connect(self) -> Result<RedisCounter, LedgerError> {
        let client = Client::open(self.redis_uri)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        debug!("connected to redis pending-counter backend");
        Ok(RedisCounter {
            connection,
            ttl_seconds: self.ttl_seconds,
            key_prefix: self.key_prefix,
        })
    }
}

/// Redis-backed [`AtomicCounter`]. Keys are `<prefix>:pending:<account_id>`
/// holding the minor-unit integer total, with a TTL so a stale entry left
/// behind by an outage expires on its own.
#[derive(Clone)]
pub struct RedisCounter {
    connection: MultiplexedConnection,
    ttl_seconds: usize,
    key_prefix: String,
}

impl RedisCounter {
    fn key(&self, account_id: &AccountId) -> String {
        format!("{}:pending:{}", self.key_prefix, account_id.as_str())
    }
}

#[async_trait]
impl AtomicCounter for RedisCounter {
    async fn add_bounded(
        &self,
        key: &AccountId,
        delta: Decimal,
        ceiling: Decimal,
    ) -> Result<CounterOutcome, LedgerError> {
        let mut connection = self.connection.clone();
        let redis_key = self.key(key);
        let (accepted, new_total, reason): (i64, i64, String) = ADD_BOUNDED
            .key(&redis_key)
            .arg(to_minor_units(delta))
            .arg(to_minor_units(ceiling))
            .arg(self.ttl_seconds)
            .invoke_async(&mut connection)
            .await?;

        trace!(account = %key, delta = %delta, accepted, "add_bounded");

        let reason = match reason.as_str() {
            "overspend" => CounterReason::Overspend,
            "negative" => CounterReason::Negative,
            _ => CounterReason::Ok,
        };
        Ok(CounterOutcome {
            accepted: accepted == 1,
            new_total: from_minor_units(new_total),
            reason,
        })
    }

    async fn get(&self, key: &AccountId) -> Result<Decimal, LedgerError> {
        let mut connection = self.connection.clone();
        let value: Option<i64> = connection.get(self.key(key)).await?;
        Ok(from_minor_units(value.unwrap_or(0)))
    }

    async fn clear(&self, key: &AccountId) -> Result<(), LedgerError> {
        let mut connection = self.connection.clone();
        let _: () = connection.del(self.key(key)).await?;
        Ok(())
    }

    async fn subtract(&self, key: &AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        let mut connection = self.connection.clone();
        let redis_key = self.key(key);
        let new_total: i64 = SUBTRACT_FLOORED
            .key(&redis_key)
            .arg(to_minor_units(amount))
            .arg(self.ttl_seconds)
            .invoke_async(&mut connection)
            .await?;
        Ok(from_minor_units(new_total))
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        let mut connection = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }
}
