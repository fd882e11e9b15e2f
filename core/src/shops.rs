// larder/src/shops.rs

use crate::error::LarderResult;
use crate::model::Shop;
use crate::store::{collections, RemoteStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Read-through shop cache. Each shop id is fetched at most once for the
/// lifetime of the cache, including ids that turned out not to exist. Failed
/// fetches are not cached and are retried on the next lookup.
pub struct ShopCache {
  store: Arc<dyn RemoteStore>,
  entries: Mutex<HashMap<String, Option<Arc<Shop>>>>,
  fetches: AtomicUsize,
}

impl ShopCache {
  pub fn new(store: Arc<dyn RemoteStore>) -> Self {
    Self {
      store,
      entries: Mutex::new(HashMap::new()),
      fetches: AtomicUsize::new(0),
    }
  }

  /// `Some(None)` means the shop is known not to exist.
  pub fn cached(&self, shop_id: &str) -> Option<Option<Arc<Shop>>> {
    self.entries.lock().get(shop_id).cloned()
  }

  #[instrument(name = "ShopCache::get", skip_all, fields(shop_id = %shop_id))]
  pub async fn get(&self, shop_id: &str) -> LarderResult<Option<Arc<Shop>>> {
    if let Some(hit) = self.cached(shop_id) {
      return Ok(hit);
    }

    self.fetches.fetch_add(1, Ordering::Relaxed);
    let shop = match self.store.get(collections::SHOPS, shop_id).await? {
      Some(doc) => match Shop::from_document(shop_id, &doc) {
        Ok(shop) => Some(Arc::new(shop)),
        Err(e) => {
          warn!(error = %e, "Shop document malformed, caching as missing.");
          None
        }
      },
      None => None,
    };
    debug!(found = shop.is_some(), "Shop fetched.");
    self.entries.lock().insert(shop_id.to_string(), shop.clone());
    Ok(shop)
  }

  /// Looks up every id, skipping failures. Ids that resolve to no shop are
  /// left out of the result.
  pub async fn resolve_many<'a>(&self, shop_ids: impl IntoIterator<Item = &'a str>) -> HashMap<String, Arc<Shop>> {
    let mut resolved = HashMap::new();
    for shop_id in shop_ids {
      if resolved.contains_key(shop_id) {
        continue;
      }
      match self.get(shop_id).await {
        Ok(Some(shop)) => {
          resolved.insert(shop_id.to_string(), shop);
        }
        Ok(None) => {}
        Err(e) => warn!(shop_id, error = %e, "Shop lookup failed, will retry on next pass."),
      }
    }
    resolved
  }

  /// Number of remote reads issued so far.
  pub fn fetch_count(&self) -> usize {
    self.fetches.load(Ordering::Relaxed)
  }
}
