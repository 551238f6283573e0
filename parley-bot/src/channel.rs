//! Channel trait and base functionality for chat transports.
//!
//! A channel turns platform events into [`Invocation`](crate::dispatcher::Invocation)s,
//! hands them to the shared [`CommandDispatcher`] and delivers the reply on
//! the same platform.

use crate::dispatcher::CommandDispatcher;
use crate::error::ChannelResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ChannelState {
    /// Channel is not started.
    #[default]
    Stopped,
    /// Channel is starting up.
    Starting,
    /// Channel is running and connected.
    Running,
    /// Channel is stopping.
    Stopping,
    /// Channel encountered an error.
    Error,
}

/// Channel status information.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Current state.
    pub state: ChannelState,
    /// Number of commands received.
    pub messages_received: u64,
    /// Number of replies delivered.
    pub messages_sent: u64,
    /// Last error message, if any.
    pub last_error: Option<String>,
    /// Whether the channel is healthy.
    pub healthy: bool,
}

/// Trait for implementing chat channels.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the unique name of this channel.
    fn name(&self) -> &str;

    /// Start the channel and begin handling commands.
    ///
    /// Implementations connect to their platform, spawn whatever background
    /// tasks they need and return once the channel is accepting input.
    async fn start(&self, dispatcher: Arc<CommandDispatcher>) -> ChannelResult<()>;

    /// Stop the channel and cleanup resources.
    async fn stop(&self) -> ChannelResult<()>;

    /// Get the current channel status.
    async fn status(&self) -> ChannelStatus;

    /// Check if the channel is currently running.
    async fn is_running(&self) -> bool {
        self.status().await.state == ChannelState::Running
    }

    /// Resolve once the channel has finished on its own.
    ///
    /// `Ok` means the transport ended normally (the local console reached
    /// end of input), `Err` means a background task failed after `start`
    /// returned. Channels that only end when stopped never resolve.
    async fn closed(&self) -> ChannelResult<()> {
        std::future::pending().await
    }
}

/// Manager for multiple channels.
///
/// Starts, stops and reports on every registered channel, sharing one
/// dispatcher between them.
pub struct ChannelManager {
    channels: RwLock<Vec<Arc<dyn Channel>>>,
    dispatcher: Arc<CommandDispatcher>,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a new channel manager around the given dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            dispatcher,
        }
    }

    /// Register a channel with the manager.
    pub async fn register(&self, channel: impl Channel + 'static) {
        self.register_shared(Arc::new(channel)).await;
    }

    /// Register an already shared channel.
    pub async fn register_shared(&self, channel: Arc<dyn Channel>) {
        info!(channel = %channel.name(), "channel registered");
        self.channels.write().await.push(channel);
    }

    /// Start all registered channels.
    pub async fn start_all(&self) -> Vec<ChannelResult<()>> {
        let channels = self.channels.read().await;
        let mut results = Vec::with_capacity(channels.len());

        for channel in channels.iter() {
            info!(channel = %channel.name(), "starting channel");
            let result = channel.start(Arc::clone(&self.dispatcher)).await;
            if let Err(ref e) = result {
                error!(channel = %channel.name(), error = %e, "failed to start channel");
            }
            results.push(result);
        }

        results
    }

    /// Stop all registered channels.
    pub async fn stop_all(&self) -> Vec<ChannelResult<()>> {
        let channels = self.channels.read().await;
        let mut results = Vec::with_capacity(channels.len());

        for channel in channels.iter() {
            info!(channel = %channel.name(), "stopping channel");
            let result = channel.stop().await;
            if let Err(ref e) = result {
                error!(channel = %channel.name(), error = %e, "failed to stop channel");
            }
            results.push(result);
        }

        results
    }

    /// Get status of all channels.
    pub async fn status_all(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.read().await;
        let mut statuses = Vec::with_capacity(channels.len());

        for channel in channels.iter() {
            statuses.push(channel.status().await);
        }

        statuses
    }

    /// Wait for the first registered channel to finish on its own.
    ///
    /// Returns the channel name and how it ended. Never resolves if no
    /// channel finishes.
    pub async fn closed_any(&self) -> (String, ChannelResult<()>) {
        let mut watchers = JoinSet::new();
        for channel in self.channels.read().await.iter() {
            let channel = Arc::clone(channel);
            watchers.spawn(async move {
                let outcome = channel.closed().await;
                (channel.name().to_string(), outcome)
            });
        }

        loop {
            match watchers.join_next().await {
                Some(Ok(closed)) => return closed,
                Some(Err(e)) => error!(error = %e, "channel watcher failed"),
                None => std::future::pending::<()>().await,
            }
        }
    }
}

/// Base implementation helpers for channels.
///
/// Tracks state and delivery counters so each channel only implements its
/// transport.
pub struct ChannelBase {
    name: String,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
    closed: watch::Sender<Option<ChannelResult<()>>>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    messages_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

impl ChannelBase {
    /// Create a new channel base.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
            closed: watch::Sender::new(None),
        }
    }

    /// Get the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Set the channel state.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Record a received command.
    pub async fn record_received(&self) {
        self.stats.write().await.messages_received += 1;
    }

    /// Record a delivered reply.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Record an error.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Record that the transport ended by itself.
    ///
    /// A failure is recorded as the last error and moves the channel to
    /// [`ChannelState::Error`]; a normal end moves it to `Stopped`.
    pub async fn close(&self, outcome: ChannelResult<()>) {
        match &outcome {
            Ok(()) => self.set_state(ChannelState::Stopped).await,
            Err(e) => {
                self.record_error(e.to_string()).await;
                self.set_state(ChannelState::Error).await;
            }
        }
        self.closed.send_replace(Some(outcome));
    }

    /// Wait until [`close`](Self::close) has been called.
    pub async fn closed(&self) -> ChannelResult<()> {
        let mut rx = self.closed.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|closed| (*closed).clone());
        match outcome {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }

    /// Build status from current state and stats.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;

        ChannelStatus {
            name: self.name.clone(),
            state,
            messages_received: stats.messages_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
            healthy: state == ChannelState::Running && stats.last_error.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;

    #[tokio::test]
    async fn test_channel_base() {
        let base = ChannelBase::new("test");
        assert_eq!(base.name(), "test");
        assert_eq!(base.state().await, ChannelState::Stopped);

        base.set_state(ChannelState::Running).await;
        assert_eq!(base.state().await, ChannelState::Running);

        base.record_received().await;
        base.record_sent().await;

        let status = base.build_status().await;
        assert_eq!(status.messages_received, 1);
        assert_eq!(status.messages_sent, 1);
        assert!(status.healthy);
    }

    #[tokio::test]
    async fn test_error_marks_unhealthy() {
        let base = ChannelBase::new("test");
        base.set_state(ChannelState::Running).await;
        base.record_error("reply failed").await;

        let status = base.build_status().await;
        assert!(!status.healthy);
        assert_eq!(status.last_error.as_deref(), Some("reply failed"));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "Running");
    }

    #[tokio::test]
    async fn test_close_with_failure() {
        let base = Arc::new(ChannelBase::new("test"));
        base.set_state(ChannelState::Running).await;

        let waiter = {
            let base = Arc::clone(&base);
            tokio::spawn(async move { base.closed().await })
        };
        base.close(Err(ChannelError::auth("token rejected"))).await;

        let outcome = waiter.await.unwrap();
        assert_eq!(outcome, Err(ChannelError::auth("token rejected")));

        let status = base.build_status().await;
        assert_eq!(status.state, ChannelState::Error);
        assert_eq!(status.last_error.as_deref(), Some("auth failed: token rejected"));

        // Late subscribers still see the outcome.
        assert!(base.closed().await.is_err());
    }

    #[tokio::test]
    async fn test_close_normally_stops() {
        let base = ChannelBase::new("test");
        base.set_state(ChannelState::Running).await;
        base.close(Ok(())).await;

        assert_eq!(base.closed().await, Ok(()));
        assert_eq!(base.state().await, ChannelState::Stopped);
        assert!(base.build_status().await.last_error.is_none());
    }
}
