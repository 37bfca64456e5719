//! Debounce and throttle helpers
//!
//! Cache refreshes and modified-flag events arrive in bursts; these
//! helpers collapse a burst into the calls the subscriber actually
//! wants. Each helper spawns a worker task on the ambient tokio
//! runtime, so they must be created inside one.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Handle produced by [`debounce`]
#[derive(Debug)]
pub struct Debounced<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Debounced<T> {
    /// Schedules a call, replacing any pending one
    pub fn call(&self, value: T) {
        let _ = self.tx.send(value);
    }
}

impl<T> Clone for Debounced<T> {
    fn clone(&self) -> Self {
        Debounced {
            tx: self.tx.clone(),
        }
    }
}

/// Trailing-edge debounce
///
/// `f` runs once with the most recent value, `delay` after the burst of
/// calls goes quiet. Dropping every handle flushes a pending call at
/// its original deadline, then stops the worker.
pub fn debounce<T, F>(delay: Duration, mut f: F) -> Debounced<T>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<T>();
    tokio::spawn(async move {
        let mut pending: Option<T> = None;
        let mut deadline = Instant::now();
        loop {
            match pending.take() {
                None => match rx.recv().await {
                    Some(value) => {
                        pending = Some(value);
                        deadline = Instant::now() + delay;
                    }
                    None => break,
                },
                Some(value) => {
                    tokio::select! {
                        next = rx.recv() => match next {
                            Some(v) => {
                                pending = Some(v);
                                deadline = Instant::now() + delay;
                            }
                            None => {
                                sleep_until(deadline).await;
                                f(value);
                                break;
                            }
                        },
                        _ = sleep_until(deadline) => f(value),
                    }
                }
            }
        }
    });
    Debounced { tx }
}

/// Leading/trailing behavior for [`throttle`]
#[derive(Debug, Clone, Copy)]
pub struct ThrottleOptions {
    /// Fire immediately on the call that opens a window
    pub leading: bool,
    /// Fire the last call received during a window when it closes
    pub trailing: bool,
}

impl Default for ThrottleOptions {
    fn default() -> Self {
        ThrottleOptions {
            leading: true,
            trailing: false,
        }
    }
}

/// Handle produced by [`throttle`]
#[derive(Debug)]
pub struct Throttled<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Throttled<T> {
    /// Submits a call into the current or a new window
    pub fn call(&self, value: T) {
        let _ = self.tx.send(value);
    }
}

impl<T> Clone for Throttled<T> {
    fn clone(&self) -> Self {
        Throttled {
            tx: self.tx.clone(),
        }
    }
}

/// Rate-limits calls to one window per `delay`
///
/// A call outside any window opens one; with `leading` it fires
/// immediately. Calls landing inside the window are dropped unless
/// `trailing` is set, in which case the last of them fires when the
/// window closes. With both flags the opening call and the final call
/// of a burst each fire once.
pub fn throttle<T, F>(delay: Duration, options: ThrottleOptions, mut f: F) -> Throttled<T>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<T>();
    tokio::spawn(async move {
        while let Some(value) = rx.recv().await {
            let mut pending = if options.leading {
                f(value);
                None
            } else {
                Some(value)
            };
            let deadline = Instant::now() + delay;
            let mut closed = false;
            loop {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(v) => {
                            if options.trailing {
                                pending = Some(v);
                            }
                        }
                        None => {
                            closed = true;
                            break;
                        }
                    },
                    _ = sleep_until(deadline) => break,
                }
            }
            if options.trailing {
                if let Some(v) = pending.take() {
                    f(v);
                }
            }
            if closed {
                break;
            }
        }
    });
    Throttled { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;
    use tokio::time::advance;

    async fn settle() {
        for _ in 0..4 {
            yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_trailing_value() {
        let (out_tx, mut out) = mpsc::unbounded_channel();
        let debounced = debounce(Duration::from_millis(100), move |v: u32| {
            let _ = out_tx.send(v);
        });

        debounced.call(1);
        settle().await;
        advance(Duration::from_millis(50)).await;
        assert!(out.try_recv().is_err());

        debounced.call(2);
        settle().await;
        advance(Duration::from_millis(99)).await;
        settle().await;
        assert!(out.try_recv().is_err());

        advance(Duration::from_millis(2)).await;
        assert_eq!(out.recv().await, Some(2));
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_once_per_burst() {
        let (out_tx, mut out) = mpsc::unbounded_channel();
        let debounced = debounce(Duration::from_millis(100), move |v: u32| {
            let _ = out_tx.send(v);
        });

        for i in 0..5 {
            debounced.call(i);
            settle().await;
            advance(Duration::from_millis(10)).await;
        }
        advance(Duration::from_millis(100)).await;
        assert_eq!(out.recv().await, Some(4));
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_leading_drops_burst() {
        let (out_tx, mut out) = mpsc::unbounded_channel();
        let throttled = throttle(
            Duration::from_millis(100),
            ThrottleOptions::default(),
            move |v: u32| {
                let _ = out_tx.send(v);
            },
        );

        throttled.call(1);
        throttled.call(2);
        throttled.call(3);
        settle().await;
        assert_eq!(out.recv().await, Some(1));

        advance(Duration::from_millis(101)).await;
        settle().await;
        assert!(out.try_recv().is_err());

        throttled.call(4);
        settle().await;
        assert_eq!(out.recv().await, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_trailing_fires_last_of_window() {
        let (out_tx, mut out) = mpsc::unbounded_channel();
        let throttled = throttle(
            Duration::from_millis(100),
            ThrottleOptions {
                leading: false,
                trailing: true,
            },
            move |v: u32| {
                let _ = out_tx.send(v);
            },
        );

        throttled.call(1);
        throttled.call(2);
        settle().await;
        advance(Duration::from_millis(99)).await;
        settle().await;
        assert!(out.try_recv().is_err());

        advance(Duration::from_millis(2)).await;
        assert_eq!(out.recv().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_leading_and_trailing() {
        let (out_tx, mut out) = mpsc::unbounded_channel();
        let throttled = throttle(
            Duration::from_millis(100),
            ThrottleOptions {
                leading: true,
                trailing: true,
            },
            move |v: u32| {
                let _ = out_tx.send(v);
            },
        );

        throttled.call(1);
        settle().await;
        throttled.call(2);
        throttled.call(3);
        settle().await;
        assert_eq!(out.recv().await, Some(1));

        advance(Duration::from_millis(101)).await;
        assert_eq!(out.recv().await, Some(3));
    }
}
