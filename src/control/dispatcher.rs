//! Command dispatcher.
//!
//! Every accepted intent runs the same chain while holding the chain lock:
//!
//! 1. commit the new state to the [`DeviceRegistry`]
//! 2. drive the [`ActuationSink`]
//! 3. announce on the [`TelemetryPublisher`]
//! 4. refresh the control panel
//!
//! Backend failures are logged and never undo the commit or skip a later
//! step. Only an unknown device name is reported to the caller, and in that
//! case nothing at all happens.

use super::Intent;
use crate::actuation::ActuationSink;
use crate::device::{DeviceRegistry, Power};
use crate::error::{TelemetryError, UnknownDevice};
use crate::mqtt::TelemetryPublisher;
use crate::panel::UiNotifier;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct CommandDispatcher {
    registry: DeviceRegistry,
    actuator: Arc<dyn ActuationSink>,
    telemetry: Arc<dyn TelemetryPublisher>,
    notifier: UiNotifier,
    /// Held for the full chain so concurrent callers never interleave.
    chain: Mutex<()>,
}

impl CommandDispatcher {
    pub fn new(
        registry: DeviceRegistry,
        actuator: Arc<dyn ActuationSink>,
        telemetry: Arc<dyn TelemetryPublisher>,
        notifier: UiNotifier,
    ) -> Self {
        Self {
            registry,
            actuator,
            telemetry,
            notifier,
            chain: Mutex::new(()),
        }
    }

    /// Read-only access to device state.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn notifier(&self) -> &UiNotifier {
        &self.notifier
    }

    /// Set `name` to `on` and run the dispatch chain.
    pub async fn apply(&self, name: &str, on: bool) -> Result<(), UnknownDevice> {
        let _chain = self.chain.lock().await;
        self.run_chain(name, on).await
    }

    pub async fn apply_intent(&self, intent: &Intent) -> Result<(), UnknownDevice> {
        self.apply(&intent.device, intent.on).await
    }

    /// Flip `name` and return its new state.
    ///
    /// The read and the write happen under one chain lock, so two concurrent
    /// toggles always flip twice.
    pub async fn toggle(&self, name: &str) -> Result<bool, UnknownDevice> {
        let _chain = self.chain.lock().await;
        let target = !self.registry.get(name)?;
        self.run_chain(name, target).await?;
        Ok(target)
    }

    /// Render the current state without changing anything.
    pub async fn refresh(&self) {
        let _chain = self.chain.lock().await;
        self.notifier.refresh(&self.registry.snapshot());
    }

    /// Release backend resources. Call once at exit.
    pub async fn shutdown(&self) {
        let _chain = self.chain.lock().await;
        self.actuator.shutdown().await;
        self.telemetry.shutdown().await;
    }

    async fn run_chain(&self, name: &str, on: bool) -> Result<(), UnknownDevice> {
        // Validation comes first: an unknown name must leave no trace
        let pin = self.registry.pin(name)?;
        let previous = self.registry.set(name, on)?;
        info!("[Dispatch] {} {}", name, Power::from(on));
        if previous == on {
            debug!("[Dispatch] {} already {}", name, Power::from(on));
        }

        if let Err(e) = self.actuator.apply(name, pin, on).await {
            warn!("[Dispatch] Actuation failed for {}: {}", name, e);
        }

        match self.telemetry.publish(name, on).await {
            Ok(()) => {}
            Err(TelemetryError::Unavailable) => {
                debug!("[Dispatch] Telemetry disabled, {} not published", name)
            }
            Err(e) => warn!("[Dispatch] Telemetry publish failed for {}: {}", name, e),
        }

        self.notifier.refresh(&self.registry.snapshot());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::NullActuator;
    use crate::error::ActuationError;
    use crate::mqtt::DisabledTelemetry;
    use crate::panel::notifier::tests::RecordingSurface;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    type Journal = Arc<SyncMutex<Vec<String>>>;

    /// Actuator that records calls, optionally failing every one.
    struct FakeActuator {
        journal: Journal,
        fail: bool,
    }

    #[async_trait]
    impl ActuationSink for FakeActuator {
        async fn apply(
            &self,
            device: &str,
            pin: Option<u32>,
            on: bool,
        ) -> Result<(), ActuationError> {
            self.journal
                .lock()
                .push(format!("actuate {} {:?} {}", device, pin, on));
            tokio::task::yield_now().await;
            if self.fail {
                Err(ActuationError::Unavailable("fake".to_string()))
            } else {
                Ok(())
            }
        }

        fn describe(&self) -> &'static str {
            "fake"
        }
    }

    /// Telemetry that records calls, optionally failing every one.
    struct FakeTelemetry {
        journal: Journal,
        fail: bool,
    }

    #[async_trait]
    impl TelemetryPublisher for FakeTelemetry {
        async fn publish(&self, device: &str, on: bool) -> Result<(), TelemetryError> {
            self.journal.lock().push(format!("publish {} {}", device, on));
            tokio::task::yield_now().await;
            if self.fail {
                Err(TelemetryError::Disconnected)
            } else {
                Ok(())
            }
        }
    }

    struct Harness {
        dispatcher: Arc<CommandDispatcher>,
        journal: Journal,
        surface: Arc<RecordingSurface>,
    }

    /// Registry order used throughout: Light, Fan, AC, TV.
    fn registry() -> DeviceRegistry {
        DeviceRegistry::new([
            ("Light", Some(17)),
            ("Fan", Some(27)),
            ("AC", Some(22)),
            ("TV", None),
        ])
        .unwrap()
    }

    fn harness(fail_actuation: bool, fail_telemetry: bool) -> Harness {
        let journal: Journal = Arc::default();
        let surface = Arc::new(RecordingSurface::default());
        let dispatcher = CommandDispatcher::new(
            registry(),
            Arc::new(FakeActuator {
                journal: journal.clone(),
                fail: fail_actuation,
            }),
            Arc::new(FakeTelemetry {
                journal: journal.clone(),
                fail: fail_telemetry,
            }),
            UiNotifier::new(surface.clone()),
        );
        Harness {
            dispatcher: Arc::new(dispatcher),
            journal,
            surface,
        }
    }

    #[tokio::test]
    async fn test_apply_runs_chain_in_order() {
        let h = harness(false, false);
        h.dispatcher.apply("Light", true).await.unwrap();

        assert_eq!(h.dispatcher.registry().get("Light"), Ok(true));
        assert_eq!(
            *h.journal.lock(),
            vec!["actuate Light Some(17) true", "publish Light true"]
        );
        // Full snapshot rendered once
        assert_eq!(h.surface.renders.lock().len(), 4);
        assert_eq!(h.surface.label("Light").as_deref(), Some("Light: ON"));
        assert_eq!(h.surface.label("TV").as_deref(), Some("TV: OFF"));
    }

    #[tokio::test]
    async fn test_unknown_device_has_no_side_effects() {
        let h = harness(false, false);
        h.dispatcher.apply("Fan", true).await.unwrap();
        let before = h.dispatcher.registry().snapshot();
        let journal_len = h.journal.lock().len();
        let renders = h.surface.renders.lock().len();

        let err = h.dispatcher.apply("Unknown", true).await.unwrap_err();
        assert_eq!(err, UnknownDevice("Unknown".to_string()));
        assert!(h.dispatcher.toggle("Unknown").await.is_err());

        assert_eq!(h.dispatcher.registry().snapshot(), before);
        assert_eq!(h.journal.lock().len(), journal_len);
        assert_eq!(h.surface.renders.lock().len(), renders);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let h = harness(false, false);
        for name in ["Light", "Fan", "AC", "TV"] {
            let original = h.dispatcher.registry().get(name).unwrap();
            assert_eq!(h.dispatcher.toggle(name).await, Ok(!original));
            assert_eq!(h.dispatcher.toggle(name).await, Ok(original));
            assert_eq!(h.dispatcher.registry().get(name), Ok(original));
        }
    }

    #[tokio::test]
    async fn test_failing_telemetry_still_commits_and_refreshes() {
        let h = harness(false, true);
        h.dispatcher.apply("Fan", true).await.unwrap();
        assert_eq!(h.dispatcher.registry().get("Fan"), Ok(true));
        assert_eq!(h.surface.label("Fan").as_deref(), Some("Fan: ON"));
    }

    #[tokio::test]
    async fn test_failing_actuation_does_not_block_chain() {
        let h = harness(true, false);
        h.dispatcher.apply("AC", true).await.unwrap();
        assert_eq!(h.dispatcher.registry().get("AC"), Ok(true));
        assert_eq!(
            *h.journal.lock(),
            vec!["actuate AC Some(22) true", "publish AC true"]
        );
        assert_eq!(h.surface.label("AC").as_deref(), Some("AC: ON"));
    }

    #[tokio::test]
    async fn test_null_actuator_matches_healthy_hardware() {
        let healthy = harness(false, false);
        let surface = Arc::new(RecordingSurface::default());
        let null = CommandDispatcher::new(
            registry(),
            Arc::new(NullActuator),
            Arc::new(DisabledTelemetry),
            UiNotifier::new(surface.clone()),
        );

        for (name, on) in [("Light", true), ("Fan", true), ("Light", false)] {
            healthy.dispatcher.apply(name, on).await.unwrap();
            null.apply(name, on).await.unwrap();
        }
        assert_eq!(
            healthy.dispatcher.registry().snapshot(),
            null.registry().snapshot()
        );
        assert_eq!(surface.label("Fan").as_deref(), Some("Fan: ON"));
    }

    #[tokio::test]
    async fn test_same_state_still_notifies() {
        let h = harness(false, false);
        h.dispatcher.apply("TV", false).await.unwrap();
        assert_eq!(*h.journal.lock(), vec!["actuate TV None false", "publish TV false"]);
        assert_eq!(h.surface.renders.lock().len(), 4);
        assert_eq!(h.dispatcher.registry().devices()[3].version(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_applies_are_serialized() {
        let h = harness(false, false);
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let dispatcher = h.dispatcher.clone();
                tokio::spawn(async move { dispatcher.apply("Light", i % 2 == 0).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Each chain ran to completion before the next started
        let journal = h.journal.lock().clone();
        assert_eq!(journal.len(), 64);
        for pair in journal.chunks(2) {
            let actuated = pair[0].rsplit(' ').next().unwrap();
            let published = pair[1].rsplit(' ').next().unwrap();
            assert!(pair[0].starts_with("actuate Light"));
            assert_eq!(actuated, published);
        }

        // Final state is the last applied value
        let last: bool = journal[63].rsplit(' ').next().unwrap().parse().unwrap();
        assert_eq!(h.dispatcher.registry().get("Light"), Ok(last));
        assert_eq!(
            h.surface.label("Light").as_deref(),
            Some(if last { "Light: ON" } else { "Light: OFF" })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_never_lose_updates() {
        let h = harness(false, false);
        let tasks: Vec<_> = (0..15)
            .map(|_| {
                let dispatcher = h.dispatcher.clone();
                tokio::spawn(async move { dispatcher.toggle("Fan").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        // Odd number of flips from OFF
        assert_eq!(h.dispatcher.registry().get("Fan"), Ok(true));
        assert_eq!(h.dispatcher.registry().devices()[1].version(), 15);
    }

    #[tokio::test]
    async fn test_apply_intent() {
        let h = harness(false, false);
        h.dispatcher
            .apply_intent(&Intent::new("TV", true))
            .await
            .unwrap();
        assert_eq!(h.dispatcher.registry().get("TV"), Ok(true));
    }
}
