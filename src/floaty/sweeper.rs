//! Background rotation.
//!
//! Identifiers normally rotate lazily on the first read after their window
//! ends, so an idle handler keeps serving the same value. A sweeper observes
//! the registry on a fixed period so rotation keeps pace with the wall clock
//! even without traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::floaty::registry::Registry;

/// Spawns a task that observes `registry` every `period`.
///
/// Rotations performed by the sweeper are logged like the ones triggered by
/// requests. The task runs until the returned handle is aborted or the
/// runtime shuts down. A zero `period` is treated as one millisecond.
///
/// Must be called from within a tokio runtime.
///
/// # Example
///
/// ```rust
/// use floaty::{FloatyConfig, Registry, spawn_sweeper};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), floaty::FloatyError> {
/// let registry = Arc::new(Registry::builder().build(&FloatyConfig::default())?);
/// let sweeper = spawn_sweeper(Arc::clone(&registry), Duration::from_secs(60));
/// // ... serve requests ...
/// sweeper.abort();
/// # Ok(())
/// # }
/// ```
pub fn spawn_sweeper(registry: Arc<Registry>, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep(&registry);
        }
    })
}

fn sweep(registry: &Registry) {
    match registry.now() {
        Ok(now) => {
            for rotation in registry.observe(now).rotations {
                rotation.log();
            }
        }
        Err(e) => tracing::warn!(target: "floaty", error = %e, "sweep skipped, clock unavailable"),
    }
}
