//! Route selection by estimated cost.

use super::registry::{BackendRole, Registry};

/// Where the dispatcher sends a request first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// In budget: high-capacity backend, with an emergency fallback on
    /// resource exhaustion.
    Primary,
    /// Over the admission threshold: constrained backend only.
    DirectFallback,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Primary => "primary",
            Route::DirectFallback => "direct_fallback",
        }
    }

    /// The backend that receives the first attempt.
    pub fn first_target(&self) -> BackendRole {
        match self {
            Route::Primary => BackendRole::HighCapacity,
            Route::DirectFallback => BackendRole::Constrained,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the route for a request of the given cost.
///
/// A cost equal to the threshold is still in budget.
pub fn select_route(cost: u64, registry: &Registry) -> Route {
    let threshold = registry.admission_threshold();
    if cost > threshold {
        tracing::debug!(cost, threshold, "Cost over admission threshold");
        Route::DirectFallback
    } else {
        Route::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_registry(threshold: u64) -> Registry {
        let config = Config::parse_str(&format!(
            r#"
            [constrained]
            name = "intel"
            url = "http://intel.test"
            model = "phi3:3.8b"
            admission_threshold = {}

            [high_capacity]
            name = "nvidia"
            url = "http://nvidia.test"
            model = "gemma:2b"
            "#,
            threshold
        ))
        .unwrap();
        Registry::from_config(&config).unwrap()
    }

    #[test]
    fn test_in_budget_routes_primary() {
        let registry = test_registry(4000);
        assert_eq!(select_route(0, &registry), Route::Primary);
        assert_eq!(select_route(2, &registry), Route::Primary);
        assert_eq!(select_route(4000, &registry), Route::Primary);
    }

    #[test]
    fn test_over_budget_routes_direct_fallback() {
        let registry = test_registry(4000);
        assert_eq!(select_route(4001, &registry), Route::DirectFallback);
        assert_eq!(select_route(u64::MAX, &registry), Route::DirectFallback);
    }

    #[test]
    fn test_first_target() {
        assert_eq!(Route::Primary.first_target(), BackendRole::HighCapacity);
        assert_eq!(Route::DirectFallback.first_target(), BackendRole::Constrained);
    }

    #[test]
    fn test_zero_threshold_sends_everything_but_empty_to_constrained() {
        let registry = test_registry(0);
        assert_eq!(select_route(0, &registry), Route::Primary);
        assert_eq!(select_route(1, &registry), Route::DirectFallback);
    }
}
