// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Learning Control
//!
//! Cooperative pause/resume/stop for long-running learn loops.
//!
//! ```text
//! NotStarted ──begin──► Running ◄──resume── Paused
//!                          │  └────pause─────►│
//!                          └──stop / finish──►Stopped◄──stop──┘
//! ```
//!
//! Controllers talk to the loop through a `watch` command channel and observe
//! it through a `watch` state channel. The loop side holds a [`LearnRun`]
//! guard and calls [`LearnRun::checkpoint`] between units of work; dropping
//! the guard publishes `Stopped` on every exit path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnState {
    NotStarted,
    Running,
    Paused,
    Stopped,
}

impl LearnState {
    pub fn is_started(&self) -> bool {
        matches!(self, LearnState::Running | LearnState::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LearnCommand {
    Run,
    Pause,
    Stop,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LearnControlError {
    #[error("Learning is not running")]
    NotRunning,

    #[error("Learning is not paused")]
    NotPaused,

    #[error("Learning has not started")]
    NotStarted,

    #[error("Learning is already in progress")]
    AlreadyStarted,
}

/// Controller handle. Cheap to clone; all clones drive the same loop.
#[derive(Clone)]
pub struct LearnControl {
    command: Arc<watch::Sender<LearnCommand>>,
    state: Arc<watch::Sender<LearnState>>,
}

impl Default for LearnControl {
    fn default() -> Self {
        Self::new()
    }
}

impl LearnControl {
    pub fn new() -> Self {
        let (command, _) = watch::channel(LearnCommand::Run);
        let (state, _) = watch::channel(LearnState::NotStarted);
        Self {
            command: Arc::new(command),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LearnState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LearnState> {
        self.state.subscribe()
    }

    /// Start a run. Fails while another run is in progress.
    pub fn begin(&self) -> Result<LearnRun, LearnControlError> {
        if self.state().is_started() {
            return Err(LearnControlError::AlreadyStarted);
        }
        self.command.send_replace(LearnCommand::Run);
        let commands = self.command.subscribe();
        self.state.send_replace(LearnState::Running);
        debug!("Learn loop started");
        Ok(LearnRun {
            state: Arc::clone(&self.state),
            commands,
        })
    }

    /// Pause a running loop. Returns once the loop has been resumed or stopped.
    pub async fn learn_pause(&self) -> Result<(), LearnControlError> {
        if self.state() != LearnState::Running {
            return Err(LearnControlError::NotRunning);
        }
        let mut rx = self.state.subscribe();
        self.command.send_replace(LearnCommand::Pause);

        // The sender lives in `self`, so these waits cannot observe a closed channel.
        let _ = rx.wait_for(|s| *s != LearnState::Running).await;
        let _ = rx.wait_for(|s| *s != LearnState::Paused).await;
        Ok(())
    }

    pub fn learn_resume(&self) -> Result<(), LearnControlError> {
        if self.state() != LearnState::Paused {
            return Err(LearnControlError::NotPaused);
        }
        self.command.send_replace(LearnCommand::Run);
        Ok(())
    }

    /// Stop the loop and wait until it has exited
    pub async fn learn_stop(&self) -> Result<(), LearnControlError> {
        if !self.state().is_started() {
            return Err(LearnControlError::NotStarted);
        }
        let mut rx = self.state.subscribe();
        self.command.send_replace(LearnCommand::Stop);
        let _ = rx.wait_for(|s| !s.is_started()).await;
        Ok(())
    }

    /// Request a stop without waiting for acknowledgment
    pub fn learn_force_stop(&self) -> Result<(), LearnControlError> {
        if !self.state().is_started() {
            return Err(LearnControlError::NotStarted);
        }
        self.command.send_replace(LearnCommand::Stop);
        Ok(())
    }
}

/// Loop-side guard of a learn run
pub struct LearnRun {
    state: Arc<watch::Sender<LearnState>>,
    commands: watch::Receiver<LearnCommand>,
}

impl LearnRun {
    /// Cooperative checkpoint between units of work.
    ///
    /// Parks while paused. Returns `false` when the loop must stop.
    pub async fn checkpoint(&mut self) -> bool {
        loop {
            let command = *self.commands.borrow_and_update();
            match command {
                LearnCommand::Run => {
                    self.state.send_if_modified(|s| {
                        if *s == LearnState::Paused {
                            *s = LearnState::Running;
                            true
                        } else {
                            false
                        }
                    });
                    return true;
                }
                LearnCommand::Stop => return false,
                LearnCommand::Pause => {
                    self.state.send_replace(LearnState::Paused);
                    debug!("Learn loop paused");
                    if self.commands.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

impl Drop for LearnRun {
    fn drop(&mut self) {
        self.state.send_replace(LearnState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_controls_reject_invalid_states() {
        let control = LearnControl::new();
        assert_eq!(control.learn_resume(), Err(LearnControlError::NotPaused));
        assert_eq!(control.learn_force_stop(), Err(LearnControlError::NotStarted));

        let run = control.begin().unwrap();
        assert!(matches!(control.begin(), Err(LearnControlError::AlreadyStarted)));
        drop(run);
        assert_eq!(control.state(), LearnState::Stopped);
    }

    #[tokio::test]
    async fn test_pause_resume_stop() {
        let control = LearnControl::new();
        let mut run = control.begin().unwrap();

        let worker = tokio::spawn(async move {
            let mut steps = 0u32;
            while run.checkpoint().await {
                steps += 1;
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            steps
        });

        let pauser = control.clone();
        let pause = tokio::spawn(async move { pauser.learn_pause().await });

        let mut rx = control.subscribe();
        rx.wait_for(|s| *s == LearnState::Paused).await.unwrap();
        assert!(!pause.is_finished());

        control.learn_resume().unwrap();
        pause.await.unwrap().unwrap();

        control.learn_stop().await.unwrap();
        assert_eq!(control.state(), LearnState::Stopped);
        assert!(worker.await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_stop_wakes_paused_loop() {
        let control = LearnControl::new();
        let mut run = control.begin().unwrap();
        let worker = tokio::spawn(async move {
            while run.checkpoint().await {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let pauser = control.clone();
        let pause = tokio::spawn(async move { pauser.learn_pause().await });
        control
            .subscribe()
            .wait_for(|s| *s == LearnState::Paused)
            .await
            .unwrap();

        control.learn_stop().await.unwrap();
        pause.await.unwrap().unwrap();
        worker.await.unwrap();
        assert_eq!(control.state(), LearnState::Stopped);
    }
}
