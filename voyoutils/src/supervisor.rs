use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// Période minimale d'une tâche périodique
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Propriétaire des tâches détachées du service
///
/// Les tâches sont lancées sans que l'appelant n'attende leur résultat. Une
/// erreur ou une panique est journalisée ici et ne remonte jamais vers le
/// chemin de requête qui a déclenché la tâche.
#[derive(Clone, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lance une tâche de fond nommée
    ///
    /// # Arguments
    ///
    /// * `name` - Nom utilisé dans les logs
    /// * `task` - Future retournant `Result<(), E>` ; l'erreur est seulement loguée
    pub fn spawn<F, E>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let name = name.into();
        self.tracker.spawn(async move {
            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => debug!(task = %name, "Background task finished"),
                Ok(Err(e)) => warn!(task = %name, "Background task failed: {}", e),
                Err(_) => error!(task = %name, "Background task panicked"),
            }
        });
    }

    /// Lance une tâche périodique jusqu'à l'arrêt du superviseur
    ///
    /// Le premier tick a lieu après une période complète. Une période
    /// inférieure à [`MIN_PERIOD`] (zéro compris) est ramenée à ce minimum.
    pub fn spawn_periodic<F>(&self, name: impl Into<String>, period: Duration, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        if period < MIN_PERIOD {
            warn!(task = %name, ?period, "Periodic task period too short, using {:?}", MIN_PERIOD);
        }
        let period = period.max(MIN_PERIOD);
        let shutdown = self.shutdown.clone();
        self.tracker.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if std::panic::catch_unwind(AssertUnwindSafe(&mut tick)).is_err() {
                            error!(task = %name, "Periodic task panicked");
                        }
                    }
                }
            }
            debug!(task = %name, "Periodic task stopped");
        });
    }

    /// Nombre de tâches encore actives
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Attend la fin des tâches ponctuelles en cours
    ///
    /// Ne doit pas être appelé tant que des tâches périodiques tournent :
    /// elles ne se terminent qu'à l'arrêt.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Arrête les tâches périodiques et attend la fin des autres
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_failures_do_not_propagate() {
        let supervisor = TaskSupervisor::new();
        let done = Arc::new(AtomicUsize::new(0));

        supervisor.spawn("fails", async { Err::<(), _>("boom") });
        supervisor.spawn("panics", async {
            if true {
                panic!("boom");
            }
            Ok::<(), String>(())
        });
        let d = done.clone();
        supervisor.spawn("ok", async move {
            d.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        supervisor.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.active(), 0);
    }

    #[tokio::test]
    async fn test_drain_keeps_supervisor_usable() {
        let supervisor = TaskSupervisor::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let d = done.clone();
            supervisor.spawn("job", async move {
                tokio::task::yield_now().await;
                d.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
            supervisor.drain().await;
        }

        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_ticks_until_shutdown() {
        let supervisor = TaskSupervisor::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        supervisor.spawn_periodic("sweep", Duration::from_secs(10), move || {
            t.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        supervisor.shutdown().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let supervisor = TaskSupervisor::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        supervisor.spawn_periodic("sweep", Duration::ZERO, move || {
            t.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        supervisor.shutdown().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
