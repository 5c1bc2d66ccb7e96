//! Stop conditions for the blocking CLI commands
//!
//! The controller must be driven from plain threads, so waiting on Ctrl+C and
//! Enter happens on a small current-thread runtime owned by [`StopSignal`].

use std::io;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::{Builder, Runtime};

use crate::application::{AudioError, PlaybackHandle};

/// Progress callback interval
const TICK: Duration = Duration::from_millis(100);

/// Why a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The time limit elapsed
    Elapsed,
    /// Enter was pressed
    Enter,
    /// Ctrl+C was received
    Interrupted,
    /// The tick callback asked to stop
    Ended,
}

/// Waits for Ctrl+C, Enter or a deadline
pub struct StopSignal {
    runtime: Option<Runtime>,
}

impl StopSignal {
    pub fn new() -> Result<Self, io::Error> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Block until `limit` elapses, Ctrl+C arrives, Enter is pressed (when
    /// `watch_stdin` is set) or `on_tick` returns false.
    ///
    /// `on_tick` receives the elapsed time roughly every 100ms.
    pub fn wait(
        &self,
        limit: Option<Duration>,
        watch_stdin: bool,
        mut on_tick: impl FnMut(Duration) -> bool,
    ) -> StopReason {
        let Some(runtime) = self.runtime.as_ref() else {
            return StopReason::Ended;
        };

        runtime.block_on(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(TICK);
            let enter = wait_for_enter(watch_stdin);
            let ctrl_c = interrupted();
            tokio::pin!(enter);
            tokio::pin!(ctrl_c);

            loop {
                tokio::select! {
                    _ = &mut ctrl_c => return StopReason::Interrupted,
                    _ = &mut enter => return StopReason::Enter,
                    _ = ticker.tick() => {
                        let elapsed = started.elapsed();
                        if limit.is_some_and(|limit| elapsed >= limit) {
                            return StopReason::Elapsed;
                        }
                        if !on_tick(elapsed) {
                            return StopReason::Ended;
                        }
                    }
                }
            }
        })
    }

    /// Block until playback finishes; `None` if Ctrl+C came first
    pub fn wait_playback(&self, handle: PlaybackHandle) -> Option<Result<(), AudioError>> {
        let Some(runtime) = self.runtime.as_ref() else {
            return Some(handle.wait());
        };

        runtime.block_on(async move {
            tokio::select! {
                outcome = handle => Some(outcome),
                _ = interrupted() => None,
            }
        })
    }
}

impl Drop for StopSignal {
    fn drop(&mut self) {
        // A pending stdin read would otherwise hold the runtime open
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Resolves when a line is entered; never resolves on EOF or when not watching
async fn wait_for_enter(watch: bool) {
    if watch {
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if let Ok(n) = stdin.read_line(&mut line).await {
            if n > 0 {
                return;
            }
        }
    }
    std::future::pending::<()>().await;
}
