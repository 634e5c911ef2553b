//! SimContext - Deterministic implementation of RelayContext.

use async_trait::async_trait;
use blobber_env::RelayContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Simulation context backed by a virtual clock and a master seed.
///
/// This implements `RelayContext` using:
/// - A virtual clock that only moves when the harness (or a sleeper)
///   advances it
/// - Seed derivation so every simulated participant gets its own
///   reproducible random stream
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.virtual_time_ns.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        self.virtual_time_ns.store(time_ns, Ordering::SeqCst);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent random stream for participant `stream`.
    pub fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        let combined_seed = self.seed.wrapping_mul(0x517c_c1b7_2722_0a95) ^ stream;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
        }
    }
}

#[async_trait]
impl RelayContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping jumps the clock; yielding lets pending events win the race
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!("Spawning simulated task {}", name);
        tokio::spawn(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobber_env::{outbound_channel, PlayerId, ServerMessage};
    use blobber_relay::{Hub, HubConfig, HubEvent};
    use rand::Rng;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));

        ctx.set_time(0);
        assert_eq!(ctx.time_ns(), 0);
    }

    #[test]
    fn test_sim_context_derived_streams() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        let a: u64 = ctx1.derive_rng(1).gen();
        let b: u64 = ctx2.derive_rng(1).gen();
        assert_eq!(a, b);

        let c: u64 = ctx1.derive_rng(2).gen();
        assert_ne!(a, c);
        assert_eq!(ctx1.seed(), 42);
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        assert_eq!(ctx1.now(), ctx2.now());
    }

    #[tokio::test]
    async fn test_hub_runs_on_virtual_clock() {
        let ctx = SimContext::shared(7);
        let config = HubConfig::new(Duration::from_millis(50), 100_000, 30);
        let (hub, handle) = Hub::new(config, Arc::clone(&ctx));
        let hub_task = tokio::spawn(hub.run());

        let (tx, mut rx) = outbound_channel(64);
        let conn = handle.next_conn_id();
        handle
            .send(HubEvent::Register {
                conn,
                player_id: PlayerId::new("sim-0"),
                sink: tx,
            })
            .await
            .unwrap();

        let mut ticks = Vec::new();
        while ticks.len() < 5 {
            match rx.recv().await.as_deref() {
                Some(ServerMessage::Tick(t)) => ticks.push(t.tick.tick),
                Some(_) => {}
                None => panic!("hub dropped the client"),
            }
        }
        assert_eq!(ticks, vec![0, 1, 2, 3, 4]);
        // Five deadlines passed without any real waiting
        assert!(ctx.now() >= Duration::from_millis(250));

        drop(handle);
        drop(rx);
        hub_task.await.unwrap();
    }
}
