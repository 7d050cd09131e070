use std::collections::HashSet;

use crate::config::ProductConfig;

/// Case-insensitive allow/deny filter over metric names of one product.
#[derive(Debug, Default, Clone)]
pub struct MetricFilter {
    exclude: HashSet<String>,
    only_include: HashSet<String>,
}

impl MetricFilter {
    pub fn from_product(product: &ProductConfig) -> Self {
        Self {
            exclude: product
                .exclude_metrics
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            only_include: product
                .only_include_metrics
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    /// Returns true if metrics named `name` should be collected.
    pub fn allows(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.exclude.contains(&name) {
            return false;
        }
        self.only_include.is_empty() || self.only_include.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Namespace;

    fn product() -> ProductConfig {
        ProductConfig::new(Namespace::new("KEC").unwrap())
    }

    #[test]
    fn test_exclude_is_case_insensitive() {
        let mut conf = product();
        conf.exclude_metrics = vec!["CPU.Idle".to_owned()];
        let filter = MetricFilter::from_product(&conf);

        assert!(!filter.allows("cpu.idle"));
        assert!(!filter.allows("CPU.IDLE"));
        assert!(filter.allows("cpu.util"));
    }

    #[test]
    fn test_only_include_restricts_and_exclude_wins() {
        let mut conf = product();
        conf.only_include_metrics = vec!["cpu.util".to_owned(), "mem.util".to_owned()];
        conf.exclude_metrics = vec!["mem.util".to_owned()];
        let filter = MetricFilter::from_product(&conf);

        assert!(filter.allows("Cpu.Util"));
        assert!(!filter.allows("mem.util"));
        assert!(!filter.allows("disk.read"));
    }

    #[test]
    fn test_default_allows_everything() {
        assert!(MetricFilter::default().allows("anything"));
    }
}
