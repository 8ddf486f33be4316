//! API server configuration

use drone_core::GeoPoint;
use drone_tracker::{DEFAULT_MAP_CENTER, SimulationConfig};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// REST API port
    pub api_port: u16,
    /// WebSocket port
    pub ws_port: u16,
    /// Enable CORS for all origins (development)
    pub cors_permissive: bool,
    /// Map center used to lay out parking spots
    pub map_center: GeoPoint,
    /// Flight simulation timing and capacities
    pub simulation: SimulationConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_port: 3000,
            ws_port: 9090,
            cors_permissive: true,
            map_center: DEFAULT_MAP_CENTER,
            simulation: SimulationConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let cors_permissive = std::env::var("CORS_PERMISSIVE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.cors_permissive);

        let map_center = GeoPoint::new(
            env_or("MAP_CENTER_LAT", defaults.map_center.lat),
            env_or("MAP_CENTER_LNG", defaults.map_center.lng),
        );

        let simulation = SimulationConfig {
            tick_interval: env_millis("TICK_INTERVAL_MS", defaults.simulation.tick_interval),
            takeoff_delay: env_millis("TAKEOFF_DELAY_MS", defaults.simulation.takeoff_delay),
            landing_delay: env_millis("LANDING_DELAY_MS", defaults.simulation.landing_delay),
            ..defaults.simulation
        };

        Self {
            api_port: env_or("API_PORT", defaults.api_port),
            ws_port: env_or("WS_PORT", defaults.ws_port),
            cors_permissive,
            map_center,
            simulation,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    let millis = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_or(key, millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.api_port, 3000);
        assert_eq!(config.ws_port, 9090);
        assert_eq!(config.simulation.tick_interval, Duration::from_millis(100));
        assert!(config.map_center.is_valid());
    }

    #[test]
    fn test_missing_variable_falls_back() {
        assert_eq!(env_or("DRONE_API_TEST_UNSET_VARIABLE", 42u16), 42);
        assert_eq!(
            env_millis("DRONE_API_TEST_UNSET_MILLIS", Duration::from_millis(2000)),
            Duration::from_millis(2000)
        );
    }
}
