// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Setup Event Bus - Pub/Sub for setup and learning progress
//
// Bridges the synchronous listener contract onto tokio broadcast channels so
// async observers (the service host, tests) can stream setup events.
// In-memory only: events published with no subscriber are dropped.

use crate::domain::events::{EventListener, ListenerError, SetupAlgEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus fanning setup events out to every subscriber
#[derive(Clone)]
pub struct SetupEventBus {
    sender: Arc<broadcast::Sender<SetupAlgEvent>>,
}

impl SetupEventBus {
    /// Capacity is how many events are buffered before lagging receivers
    /// start losing the oldest ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: SetupAlgEvent) {
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to setup event");
        }
    }

    pub fn subscribe(&self) -> SetupEventReceiver {
        SetupEventReceiver {
            receiver: self.sender.subscribe(),
            alg_name: None,
        }
    }

    /// Subscribe to the events of one algorithm only
    pub fn subscribe_alg(&self, alg_name: impl Into<String>) -> SetupEventReceiver {
        SetupEventReceiver {
            receiver: self.sender.subscribe(),
            alg_name: Some(alg_name.into()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SetupEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl EventListener for SetupEventBus {
    fn receive(&self, event: &SetupAlgEvent) -> Result<(), ListenerError> {
        self.publish(event.clone());
        Ok(())
    }
}

pub struct SetupEventReceiver {
    receiver: broadcast::Receiver<SetupAlgEvent>,
    alg_name: Option<String>,
}

impl SetupEventReceiver {
    /// Next matching event; waits until one is available
    pub async fn recv(&mut self) -> Result<SetupAlgEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Setup event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<SetupAlgEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Setup event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &SetupAlgEvent) -> bool {
        self.alg_name
            .as_deref()
            .is_none_or(|name| name == event.alg_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
