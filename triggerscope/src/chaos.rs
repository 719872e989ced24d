//! Random worker disruption during the test window.
//!
//! The disruptor runs independently of the verification pipeline: on a
//! fixed period it lists the marked workers and kills one chosen uniformly
//! at random, exercising the engine's resilience while events flow. It
//! shares nothing with the coordinator beyond the test window itself and
//! the cancellation signal.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::ChaosError;

/// Seam for listing and killing disruption targets.
#[async_trait]
pub trait Reaper {
    /// Names of the currently running targets matching the selector.
    async fn targets(&self) -> Result<Vec<String>, ChaosError>;

    /// Kill one target.
    async fn kill(&self, target: &str) -> Result<(), ChaosError>;
}

/// Periodically kills one randomly chosen marked worker.
pub struct Disruptor<R> {
    reaper: R,
    period: Duration,
}

impl<R: Reaper> Disruptor<R> {
    /// Create a disruptor striking every `period`.
    pub fn new(reaper: R, period: Duration) -> Self {
        Self { reaper, period }
    }

    /// Strike on the period until cancelled. The first strike happens one
    /// full period after start; failed strikes are logged and the loop
    /// keeps going.
    pub async fn run(self, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + self.period;
        let mut ticker = tokio::time::interval_at(start, self.period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(error) = self.strike().await {
                        tracing::warn!(%error, "disruption strike failed");
                    }
                }
            }
        }
    }

    async fn strike(&self) -> Result<(), ChaosError> {
        let targets = self.reaper.targets().await?;
        if targets.is_empty() {
            return Err(ChaosError::NoTargets);
        }

        let target = &targets[rand::rng().random_range(0..targets.len())];
        tracing::info!(%target, "killing worker");
        self.reaper.kill(target).await
    }
}

/// Kills pods labelled `chaos=true` in one namespace through kubectl.
pub struct KubectlReaper {
    namespace: String,
}

impl KubectlReaper {
    /// Target pods in `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Reaper for KubectlReaper {
    async fn targets(&self) -> Result<Vec<String>, ChaosError> {
        let output = Command::new("kubectl")
            .args([
                "get",
                "pods",
                "-n",
                &self.namespace,
                "-l",
                "chaos=true",
                "-o",
                "name",
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ChaosError::List(e.to_string()))?;

        if !output.status.success() {
            return Err(ChaosError::List(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    async fn kill(&self, target: &str) -> Result<(), ChaosError> {
        let output = Command::new("kubectl")
            .args([
                "delete",
                "-n",
                &self.namespace,
                "--grace-period=0",
                "--force",
                target,
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ChaosError::Kill {
                target: target.to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ChaosError::Kill {
                target: target.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingReaper {
        kills: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Reaper for CountingReaper {
        async fn targets(&self) -> Result<Vec<String>, ChaosError> {
            Ok(vec!["pod/a".to_string(), "pod/b".to_string()])
        }

        async fn kill(&self, _target: &str) -> Result<(), ChaosError> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn strikes_on_the_period_until_cancelled() {
        let kills = Arc::new(AtomicUsize::new(0));
        let disruptor = Disruptor::new(
            CountingReaper {
                kills: kills.clone(),
            },
            Duration::from_secs(10),
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(disruptor.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(35)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(kills.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_target_list_does_not_stop_the_loop() {
        struct EmptyReaper;

        #[async_trait]
        impl Reaper for EmptyReaper {
            async fn targets(&self) -> Result<Vec<String>, ChaosError> {
                Ok(Vec::new())
            }

            async fn kill(&self, _target: &str) -> Result<(), ChaosError> {
                panic!("must not kill with no targets");
            }
        }

        let disruptor = Disruptor::new(EmptyReaper, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(disruptor.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(12)).await;
        cancel.cancel();
        task.await.unwrap();
    }
}
