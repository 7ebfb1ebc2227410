//! Read-through cache for display data
//!
//! Transfer details and shop inventory listings are cached per entity with a
//! TTL. Concurrent misses for the same key share one backend fetch. Every
//! committed mutation invalidates the entries it touched; mutations never
//! read from here.
//!
//! Keys are namespaced `<namespace>:<entity>:<id>`, e.g. `transfer:detail:42`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cached::{Cached, TimedCache};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use shared::{ShopId, ShopInventoryLine, TransferDetail, TransferId};

use crate::config::CacheConfig;
use crate::error::{AppError, AppResult};
use crate::ledger::LedgerStore;

pub fn cache_key(namespace: &str, entity: &str, id: i64) -> String {
    format!("{}:{}:{}", namespace, entity, id)
}

pub fn transfer_detail_key(transfer_id: TransferId) -> String {
    cache_key("transfer", "detail", transfer_id)
}

pub fn shop_inventory_key(shop_id: ShopId) -> String {
    cache_key("shop", "inventory", shop_id)
}

/// Key/value cache with a fixed time-to-live, backed by [`TimedCache`]
///
/// Each invalidation bumps an epoch. A fill started before an invalidation
/// carries the older epoch and is discarded, so a slow read can never put a
/// pre-mutation value back after the mutation cleared it.
pub struct TtlCache<V> {
    entries: Mutex<TimedCache<String, V>>,
    epoch: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// `ttl` is applied with whole-second resolution
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(TimedCache::with_lifespan(ttl.as_secs())),
            epoch: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, TimedCache<String, V>> {
        // Poisoning cannot leave an entry half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries().cache_get(key).cloned()
    }

    /// Current invalidation epoch; pass it back to [`TtlCache::fill`]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Store `value` unless an invalidation happened since `epoch` was read.
    /// Returns whether the value was stored.
    pub fn fill(&self, key: String, value: V, epoch: u64) -> bool {
        // Invalidation bumps the epoch under the same lock, so it is either
        // seen here or removes the entry after this insert.
        let mut entries = self.entries();
        if self.epoch() != epoch {
            return false;
        }
        entries.cache_set(key, value);
        true
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        entries.cache_remove(key);
    }
}

/// Collapses concurrent requests for the same key into one execution
pub struct RequestCoalescer<V: Clone> {
    in_flight: Arc<DashMap<String, Shared<BoxFuture<'static, V>>>>,
}

impl<V: Clone> Default for RequestCoalescer<V> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }
}

impl<V> RequestCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the in-flight request for `key`, or start `fetch` if there is
    /// none. Only the first caller's `fetch` is ever polled.
    pub async fn run<F>(&self, key: String, fetch: F) -> V
    where
        F: Future<Output = V> + Send + 'static,
    {
        let shared = match self.in_flight.entry(key) {
            MapEntry::Occupied(slot) => {
                tracing::debug!("Joining in-flight fetch for {}", slot.key());
                slot.get().clone()
            }
            MapEntry::Vacant(slot) => {
                let in_flight = Arc::clone(&self.in_flight);
                let key = slot.key().clone();
                let fut = async move {
                    let value = fetch.await;
                    in_flight.remove(&key);
                    value
                }
                .boxed()
                .shared();
                slot.insert(fut.clone());
                fut
            }
        };
        shared.await
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

type SharedResult<V> = Result<Option<V>, Arc<AppError>>;

/// Rebuild an error handed out to several waiters of one fetch
fn unshare_error(err: Arc<AppError>) -> AppError {
    match Arc::try_unwrap(err) {
        Ok(err) => err,
        Err(err) => match err.as_ref() {
            AppError::NotFound(resource) => AppError::NotFound(resource.clone()),
            AppError::Timeout(secs) => AppError::Timeout(*secs),
            AppError::Contention(reason) => AppError::Contention(reason.clone()),
            other => AppError::Internal(other.to_string()),
        },
    }
}

async fn read_through<V, F>(
    cache: &Arc<TtlCache<V>>,
    coalescer: &RequestCoalescer<SharedResult<V>>,
    key: String,
    fetch: F,
) -> AppResult<Option<V>>
where
    V: Clone + Send + Sync + 'static,
    F: Future<Output = AppResult<Option<V>>> + Send + 'static,
{
    if let Some(value) = cache.get(&key) {
        tracing::debug!("Cache hit for {}", key);
        return Ok(Some(value));
    }
    tracing::debug!("Cache miss for {}", key);

    let fill_cache = Arc::clone(cache);
    let fill_key = key.clone();
    let result = coalescer
        .run(key, async move {
            let epoch = fill_cache.epoch();
            let value = fetch.await.map_err(Arc::new)?;
            if let Some(value) = &value {
                if !fill_cache.fill(fill_key.clone(), value.clone(), epoch) {
                    tracing::debug!("Discarded stale fill for {}", fill_key);
                }
            }
            Ok(value)
        })
        .await;

    result.map_err(unshare_error)
}

/// Caches used by the display endpoints
pub struct CacheLayer {
    transfer_details: Arc<TtlCache<TransferDetail>>,
    shop_inventory: Arc<TtlCache<Vec<ShopInventoryLine>>>,
    transfer_fetches: RequestCoalescer<SharedResult<TransferDetail>>,
    inventory_fetches: RequestCoalescer<SharedResult<Vec<ShopInventoryLine>>>,
}

impl CacheLayer {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            transfer_details: Arc::new(TtlCache::new(Duration::from_secs(
                config.transfer_detail_ttl_secs,
            ))),
            shop_inventory: Arc::new(TtlCache::new(Duration::from_secs(
                config.shop_inventory_ttl_secs,
            ))),
            transfer_fetches: RequestCoalescer::new(),
            inventory_fetches: RequestCoalescer::new(),
        }
    }

    pub async fn transfer_detail(
        &self,
        ledger: Arc<dyn LedgerStore>,
        transfer_id: TransferId,
    ) -> AppResult<Option<TransferDetail>> {
        read_through(
            &self.transfer_details,
            &self.transfer_fetches,
            transfer_detail_key(transfer_id),
            async move { ledger.transfer_detail(transfer_id).await },
        )
        .await
    }

    pub async fn shop_inventory(
        &self,
        ledger: Arc<dyn LedgerStore>,
        shop_id: ShopId,
    ) -> AppResult<Option<Vec<ShopInventoryLine>>> {
        read_through(
            &self.shop_inventory,
            &self.inventory_fetches,
            shop_inventory_key(shop_id),
            async move { ledger.shop_inventory(shop_id).await },
        )
        .await
    }

    /// Drop the transfer detail and the inventory listings of `shops`
    pub fn invalidate_transfer(&self, transfer_id: TransferId, shops: &[ShopId]) {
        self.transfer_details.invalidate(&transfer_detail_key(transfer_id));
        self.invalidate_shops(shops);
    }

    pub fn invalidate_shops(&self, shops: &[ShopId]) {
        for shop_id in shops {
            self.shop_inventory.invalidate(&shop_inventory_key(*shop_id));
        }
    }

    pub fn is_transfer_cached(&self, transfer_id: TransferId) -> bool {
        self.transfer_details.get(&transfer_detail_key(transfer_id)).is_some()
    }

    pub fn is_shop_inventory_cached(&self, shop_id: ShopId) -> bool {
        self.shop_inventory.get(&shop_inventory_key(shop_id)).is_some()
    }
}
