// ABOUTME: Shared test utilities: provider setup over both backends, quiet logging
// ABOUTME: ManualClock is handed back so tests can drive expiry deterministically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use oauth2_provider::{AuthConfig, AuthorizationProvider, ManualClock};
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// Wall-clock start truncated to seconds, matching storage precision
fn test_start() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .init();
    });
}

/// Provider over the in-memory backend with a controllable clock
pub async fn memory_provider() -> Result<(AuthorizationProvider, Arc<ManualClock>)> {
    init_test_logging();
    let clock = Arc::new(ManualClock::new(test_start()));
    let provider =
        AuthorizationProvider::connect_with_clock(&AuthConfig::default(), clock.clone()).await?;
    Ok((provider, clock))
}

/// Provider over an in-memory SQLite database with a controllable clock
pub async fn sqlite_provider() -> Result<(AuthorizationProvider, Arc<ManualClock>)> {
    init_test_logging();
    let clock = Arc::new(ManualClock::new(test_start()));
    let config = AuthConfig {
        database_url: "sqlite::memory:".to_owned(),
        ..AuthConfig::default()
    };
    let provider = AuthorizationProvider::connect_with_clock(&config, clock.clone()).await?;
    Ok((provider, clock))
}

/// Both backends, for suites that assert identical behavior
pub async fn all_providers() -> Result<Vec<(AuthorizationProvider, Arc<ManualClock>)>> {
    Ok(vec![memory_provider().await?, sqlite_provider().await?])
}
