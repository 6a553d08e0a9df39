use std::{future::Future, time::Duration};
use tokio::task::JoinHandle;
use tracing::debug;

/// Delay mínimo antes de abandonar un canal vacío
pub const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Temporizador de un solo disparo para abandonar un canal vacío.
///
/// Vive dentro de la cola del servidor. Soltarlo aborta la tarea, así que
/// cancelar es simplemente descartarlo; el callback además compara su token
/// con el del temporizador armado antes de actuar.
#[derive(Debug)]
pub struct IdleTimer {
    token: u64,
    delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl IdleTimer {
    /// Arma el temporizador; `on_fire` corre tras `delay`
    pub fn arm<F>(token: u64, delay: Duration, on_fire: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = delay.max(MIN_IDLE_TIMEOUT);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });

        Self { token, delay, handle: Some(handle) }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancela el temporizador
    pub fn cancel(self) {
        debug!("⏲️ Temporizador de inactividad {} cancelado", self.token);
        drop(self);
    }

    /// Consume el temporizador desde su propio callback sin abortar la tarea
    pub(crate) fn release(mut self) {
        self.handle.take();
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _timer = IdleTimer::arm(1, Duration::from_secs(60), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = IdleTimer::arm(1, Duration::from_secs(60), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_has_a_floor() {
        let timer = IdleTimer::arm(1, Duration::ZERO, async {});
        assert_eq!(timer.delay(), MIN_IDLE_TIMEOUT);
    }
}
