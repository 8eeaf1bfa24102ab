use dashmap::DashMap;

/// Resolved endpoint URLs advertised by the carrier API's discovery
/// document, keyed by endpoint name ("tracking", "documents", ...).
///
/// Constructed once per application session and passed by reference to
/// consumers; there is deliberately no module-level instance.
#[derive(Debug, Default)]
pub struct CarrierEndpointsCache {
    endpoints: DashMap<String, String>,
}

impl CarrierEndpointsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.endpoints.get(name).map(|url| url.clone())
    }

    pub fn insert(&self, name: impl Into<String>, url: impl Into<String>) {
        self.endpoints.insert(name.into(), url.into());
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Drops all cached endpoints, forcing re-discovery on next use.
    pub fn clear(&self) {
        self.endpoints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_clear() {
        let cache = CarrierEndpointsCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get("tracking"), None);

        cache.insert("tracking", "https://api.example.com/tracking");
        assert_eq!(
            cache.get("tracking").as_deref(),
            Some("https://api.example.com/tracking")
        );

        cache.clear();
        assert!(cache.is_empty());
    }
}
