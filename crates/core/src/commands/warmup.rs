use bastion_permissions::HyphenatedUuid;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

/// Which external events cancel a pending warmup. Disconnecting always
/// does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupSettings {
    pub cancel_on_move: bool,
    pub cancel_on_command: bool,
}

impl Default for WarmupSettings {
    fn default() -> Self {
        WarmupSettings {
            cancel_on_move: true,
            cancel_on_command: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationTrigger {
    Move,
    Command,
    Disconnect,
}

/// Work to run once a warmup elapses, and what to do if it never does.
pub struct WarmupTask {
    run: Box<dyn FnOnce() + Send>,
    on_cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl WarmupTask {
    pub fn new(
        run: impl FnOnce() + Send + 'static,
        on_cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        WarmupTask {
            run: Box::new(run),
            on_cancel: Box::new(on_cancel),
        }
    }
}

struct PendingWarmup {
    id: u64,
    cancel: oneshot::Sender<()>,
    on_cancel: Box<dyn FnOnce() + Send + Sync>,
}

/// Delayed execution, at most one pending task per invoker.
///
/// Whoever removes the pending entry first (the timer or a cancellation)
/// decides the outcome, so a task either runs or is cancelled, never both.
pub struct WarmupService {
    runtime: Handle,
    pending: Arc<DashMap<u128, PendingWarmup>>,
    next_id: AtomicU64,
    settings: RwLock<WarmupSettings>,
}

impl WarmupService {
    pub fn new(runtime: Handle) -> Self {
        WarmupService {
            runtime,
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            settings: RwLock::new(WarmupSettings::default()),
        }
    }

    pub fn settings(&self) -> WarmupSettings {
        *self.settings.read()
    }

    pub fn apply_settings(&self, settings: WarmupSettings) {
        *self.settings.write() = settings;
    }

    /// Runs `task` after `delay`, replacing (and cancelling) any warmup the
    /// invoker already has pending.
    pub fn execute_after(&self, invoker: u128, delay: Duration, task: WarmupTask) {
        self.cancel(invoker);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let WarmupTask { run, on_cancel } = task;
        self.pending.insert(
            invoker,
            PendingWarmup {
                id,
                cancel: cancel_tx,
                on_cancel,
            },
        );
        debug!("Warmup of {:?} armed for {}", delay, HyphenatedUuid(invoker));

        let pending = Arc::clone(&self.pending);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx => return,
            }
            if pending.remove_if(&invoker, |_, task| task.id == id).is_some() {
                debug!("Warmup for {} elapsed", HyphenatedUuid(invoker));
                run();
            }
        });
    }

    /// Cancels the invoker's pending warmup. Returns whether there was one;
    /// cancelling twice, or after the task already ran, does nothing.
    pub fn cancel(&self, invoker: u128) -> bool {
        match self.pending.remove(&invoker) {
            Some((_, task)) => {
                debug!("Warmup for {} cancelled", HyphenatedUuid(invoker));
                let _ = task.cancel.send(());
                (task.on_cancel)();
                true
            }
            None => false,
        }
    }

    pub fn awaiting_execution(&self, invoker: u128) -> bool {
        self.pending.contains_key(&invoker)
    }

    /// Routes an external event. Returns whether a warmup was cancelled.
    pub fn on_trigger(&self, invoker: u128, trigger: CancellationTrigger) -> bool {
        let settings = self.settings();
        let applies = match trigger {
            CancellationTrigger::Move => settings.cancel_on_move,
            CancellationTrigger::Command => settings.cancel_on_command,
            CancellationTrigger::Disconnect => true,
        };
        applies && self.cancel(invoker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        ran: AtomicUsize,
        cancelled: AtomicUsize,
    }

    fn task(counters: &Arc<Counters>) -> WarmupTask {
        let ran = counters.clone();
        let cancelled = counters.clone();
        WarmupTask::new(
            move || {
                ran.ran.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                cancelled.cancelled.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    async fn wait(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn runs_after_delay() {
        let service = WarmupService::new(Handle::current());
        let counters = Arc::new(Counters::default());
        service.execute_after(1, Duration::from_secs(5), task(&counters));

        wait(3).await;
        assert!(service.awaiting_execution(1));
        assert_eq!(counters.ran.load(Ordering::SeqCst), 0);

        wait(3).await;
        assert!(!service.awaiting_execution(1));
        assert_eq!(counters.ran.load(Ordering::SeqCst), 1);
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 0);

        // cancelling after the task fired is a no-op
        assert!(!service.cancel(1));
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_idempotent() {
        let service = WarmupService::new(Handle::current());
        let counters = Arc::new(Counters::default());
        service.execute_after(1, Duration::from_secs(5), task(&counters));

        wait(2).await;
        assert!(service.cancel(1));
        assert!(!service.cancel(1));

        wait(10).await;
        assert_eq!(counters.ran.load(Ordering::SeqCst), 0);
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_previous() {
        let service = WarmupService::new(Handle::current());
        let first = Arc::new(Counters::default());
        let second = Arc::new(Counters::default());
        service.execute_after(1, Duration::from_secs(5), task(&first));
        service.execute_after(1, Duration::from_secs(5), task(&second));

        wait(6).await;
        assert_eq!(first.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(first.ran.load(Ordering::SeqCst), 0);
        assert_eq!(second.ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_respect_settings() {
        let service = WarmupService::new(Handle::current());
        service.apply_settings(WarmupSettings {
            cancel_on_move: false,
            cancel_on_command: true,
        });
        let counters = Arc::new(Counters::default());
        service.execute_after(1, Duration::from_secs(5), task(&counters));

        assert!(!service.on_trigger(1, CancellationTrigger::Move));
        assert!(service.awaiting_execution(1));
        assert!(service.on_trigger(1, CancellationTrigger::Disconnect));
        assert!(!service.on_trigger(1, CancellationTrigger::Command));
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 1);
    }
}
