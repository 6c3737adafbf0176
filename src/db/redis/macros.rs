/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present; otherwise awaits `$block`,
/// queues the result for a background write with `$ttl` seconds and
/// returns it. A failed cache read is logged and treated as a miss without
/// a write-back. Must be used inside a function returning `AppResult`.
///
/// ```rust,ignore
/// let books: Vec<Recommendation> = cached!(cache, key, 300, engine.trending(10))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = &$key;
        match $cache.get_from_cache(key).await {
            Ok(Some(cached)) => Ok(cached),
            Ok(None) => {
                let value = $block.await?;
                $cache.set_in_background(key, &value, $ttl);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache unavailable, computing directly");
                Ok($block.await?)
            }
        }
    }};
}
