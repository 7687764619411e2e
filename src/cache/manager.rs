use crate::cache::{CacheError, CacheRegion, CacheRegionConfig, CacheStatsSnapshot};
use indexmap::IndexMap;
use log::info;
use std::sync::Arc;
use std::time::Duration;

pub const INDICATORS_REGION: &str = "indicators";
pub const STRATEGIES_REGION: &str = "strategies";
pub const DATA_REGION: &str = "data";

//owns the named cache regions shared by concurrent backtest runs
//built once at the composition root and handed out behind an arc
pub struct CacheManager {
    regions: IndexMap<String, Arc<CacheRegion>>,
}

impl CacheManager {
    //creates a manager with no regions
    pub fn new() -> Self {
        CacheManager {
            regions: IndexMap::new(),
        }
    }

    //indicators 5000/30min, strategies 2000/60min, data 10000/10min
    pub fn default_region_configs() -> Vec<CacheRegionConfig> {
        vec![
            CacheRegionConfig::new(INDICATORS_REGION, 5000, Duration::from_secs(30 * 60)),
            CacheRegionConfig::new(STRATEGIES_REGION, 2000, Duration::from_secs(60 * 60)),
            CacheRegionConfig::new(DATA_REGION, 10000, Duration::from_secs(10 * 60)),
        ]
    }

    pub fn with_defaults() -> Self {
        let mut manager = CacheManager::new();
        for config in Self::default_region_configs() {
            let region = CacheRegion::new(&config)
                .unwrap_or_else(|e| unreachable!("default cache region is valid: {e}"));
            manager.regions.insert(config.name.clone(), Arc::new(region));
        }
        manager
    }

    pub fn from_configs(configs: &[CacheRegionConfig]) -> Result<Self, CacheError> {
        let mut manager = CacheManager::new();
        for config in configs {
            manager.register(config)?;
        }
        Ok(manager)
    }

    //adds a region; names must be unique
    pub fn register(&mut self, config: &CacheRegionConfig) -> Result<Arc<CacheRegion>, CacheError> {
        if self.regions.contains_key(&config.name) {
            return Err(CacheError::DuplicateRegion(config.name.clone()));
        }

        let region = Arc::new(CacheRegion::new(config)?);
        self.regions.insert(config.name.clone(), Arc::clone(&region));

        info!(
            "registered cache region '{}' (max_size={}, ttl={}ms)",
            config.name, config.max_size, config.expire_after_write_ms
        );

        Ok(region)
    }

    pub fn region(&self, name: &str) -> Option<Arc<CacheRegion>> {
        self.regions.get(name).cloned()
    }

    pub fn indicators(&self) -> Option<Arc<CacheRegion>> {
        self.region(INDICATORS_REGION)
    }

    pub fn region_names(&self) -> Vec<&str> {
        self.regions.keys().map(String::as_str).collect()
    }

    //sweeps expired entries in every region
    pub fn cleanup_all(&self) -> usize {
        self.regions.values().map(|region| region.cleanup()).sum()
    }

    pub fn stats(&self) -> Vec<(String, CacheStatsSnapshot)> {
        self.regions
            .iter()
            .map(|(name, region)| (name.clone(), region.stats()))
            .collect()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_regions_are_registered() {
        let manager = CacheManager::with_defaults();
        assert_eq!(
            manager.region_names(),
            vec![INDICATORS_REGION, STRATEGIES_REGION, DATA_REGION]
        );

        let indicators = manager.indicators().unwrap();
        assert_eq!(indicators.max_size(), 5000);
        assert_eq!(indicators.expire_after_write(), Duration::from_secs(1800));
        assert_eq!(manager.region(DATA_REGION).unwrap().max_size(), 10000);
        assert!(manager.region("missing").is_none());
    }

    #[test]
    fn regions_are_isolated() {
        let manager = CacheManager::with_defaults();
        let indicators = manager.region(INDICATORS_REGION).unwrap();
        let data = manager.region(DATA_REGION).unwrap();

        indicators.put("k", 1.0.into());
        assert!(data.get("k").is_none());
        assert_eq!(indicators.get("k").and_then(|v| v.as_scalar()), Some(1.0));
    }

    #[test]
    fn duplicate_region_rejected() {
        let config = CacheRegionConfig::new("x", 10, Duration::from_secs(1));
        let result = CacheManager::from_configs(&[config.clone(), config]);
        assert!(matches!(result, Err(CacheError::DuplicateRegion(name)) if name == "x"));
    }
}
