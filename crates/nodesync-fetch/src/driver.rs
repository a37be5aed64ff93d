// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Async execution of an [`AddressSpaceFetcher`].
//!
//! [`FetchDriver`] spawns every outgoing request on the runtime, bounds it
//! with the configured timeout and feeds completions back to the fetcher
//! in arrival order. Events leave through a bounded channel. A
//! [`FetcherHandle`] lets other tasks request fetches while the driver
//! runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use nodesync_core::{NodeId, NodeSyncError, NodeSyncResult, StatusCode, TransportError};

use crate::config::FetcherConfig;
use crate::fetch_status::NodeFetchStatus;
use crate::fetcher::{AddressSpaceFetcher, Completion, FetcherEvent, OutgoingRequest};
use crate::transport::{AttributeService, ViewEvent, ViewService};

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Commands
// =============================================================================

/// Requests sent to a running driver.
#[derive(Debug)]
pub enum FetcherCommand {
    /// See [`AddressSpaceFetcher::fetch_node`].
    FetchNode {
        /// Node to fetch.
        node_id: NodeId,
        /// Requested completeness.
        requested: NodeFetchStatus,
    },
    /// The channel to the server opened.
    ChannelOpened,
    /// The channel to the server closed.
    ChannelClosed,
    /// Asks for the status of a node.
    Status {
        /// Node to query.
        node_id: NodeId,
        /// Receives the answer.
        reply: oneshot::Sender<(StatusCode, NodeFetchStatus)>,
    },
}

/// Cloneable sender side of a driver.
#[derive(Debug, Clone)]
pub struct FetcherHandle {
    sender: mpsc::Sender<FetcherCommand>,
}

impl FetcherHandle {
    /// Requests a fetch.
    pub async fn fetch_node(&self, node_id: NodeId, requested: NodeFetchStatus) -> NodeSyncResult<()> {
        self.send(FetcherCommand::FetchNode { node_id, requested })
            .await
    }

    /// Reports the channel as open.
    pub async fn channel_opened(&self) -> NodeSyncResult<()> {
        self.send(FetcherCommand::ChannelOpened).await
    }

    /// Reports the channel as closed.
    pub async fn channel_closed(&self) -> NodeSyncResult<()> {
        self.send(FetcherCommand::ChannelClosed).await
    }

    /// Queries the fetch status of a node.
    pub async fn status(&self, node_id: NodeId) -> NodeSyncResult<(StatusCode, NodeFetchStatus)> {
        let (reply, response) = oneshot::channel();
        self.send(FetcherCommand::Status { node_id, reply }).await?;
        response.await.map_err(|_| driver_stopped())
    }

    async fn send(&self, command: FetcherCommand) -> NodeSyncResult<()> {
        self.sender.send(command).await.map_err(|_| driver_stopped())
    }
}

fn driver_stopped() -> NodeSyncError {
    NodeSyncError::transport(TransportError::channel_closed("fetch driver stopped"))
}

// =============================================================================
// FetchDriver
// =============================================================================

/// Runs an [`AddressSpaceFetcher`] against async services.
pub struct FetchDriver {
    fetcher: AddressSpaceFetcher,
    attributes: Arc<dyn AttributeService>,
    view: Arc<dyn ViewService>,
    request_timeout: Duration,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    command_tx: mpsc::Sender<FetcherCommand>,
    command_rx: mpsc::Receiver<FetcherCommand>,
    events: mpsc::Sender<FetcherEvent>,
    in_flight: usize,
}

impl std::fmt::Debug for FetchDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchDriver")
            .field("fetcher", &self.fetcher)
            .field("request_timeout", &self.request_timeout)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl FetchDriver {
    /// Creates a driver and the receiver for its events.
    pub fn new(
        fetcher: AddressSpaceFetcher,
        attributes: Arc<dyn AttributeService>,
        view: Arc<dyn ViewService>,
        config: &FetcherConfig,
    ) -> (Self, mpsc::Receiver<FetcherEvent>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let driver = Self {
            fetcher,
            attributes,
            view,
            request_timeout: config.request_timeout,
            completion_tx,
            completion_rx,
            command_tx,
            command_rx,
            events,
            in_flight: 0,
        };
        (driver, event_rx)
    }

    /// Returns a handle for sending commands.
    pub fn handle(&self) -> FetcherHandle {
        FetcherHandle {
            sender: self.command_tx.clone(),
        }
    }

    /// Returns the fetcher.
    pub fn fetcher(&self) -> &AddressSpaceFetcher {
        &self.fetcher
    }

    /// Returns the fetcher for direct calls between runs.
    pub fn fetcher_mut(&mut self) -> &mut AddressSpaceFetcher {
        &mut self.fetcher
    }

    /// Consumes the driver and returns the fetcher.
    pub fn into_fetcher(self) -> AddressSpaceFetcher {
        self.fetcher
    }

    /// Returns the number of requests awaiting completion.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Processes requests and commands until nothing is in flight.
    pub async fn run_until_idle(&mut self) {
        loop {
            while let Ok(command) = self.command_rx.try_recv() {
                self.on_command(command);
            }
            self.dispatch();
            self.forward_events().await;
            if self.in_flight == 0 {
                return;
            }
            if let Some(completion) = self.completion_rx.recv().await {
                self.on_completion(completion);
            }
        }
    }

    /// Runs until `shutdown` fires and returns the fetcher.
    pub async fn run(
        mut self,
        mut view_events: mpsc::Receiver<ViewEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> AddressSpaceFetcher {
        info!("Fetch driver started");
        let mut view_open = true;

        loop {
            self.dispatch();
            self.forward_events().await;

            tokio::select! {
                Some(completion) = self.completion_rx.recv() => {
                    self.on_completion(completion);
                }
                Some(command) = self.command_rx.recv() => {
                    self.on_command(command);
                }
                event = view_events.recv(), if view_open => {
                    match event {
                        Some(event) => {
                            debug!(node_id = %event.node_id(), "View event");
                            self.fetcher.on_view_event(event);
                        }
                        None => {
                            debug!("View event stream ended");
                            view_open = false;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(in_flight = self.in_flight, "Fetch driver shutting down");
                    break;
                }
            }
        }

        self.forward_events().await;
        self.fetcher
    }

    fn on_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.fetcher.on_completion(completion);
    }

    fn on_command(&mut self, command: FetcherCommand) {
        match command {
            FetcherCommand::FetchNode { node_id, requested } => {
                self.fetcher.fetch_node(&node_id, requested);
            }
            FetcherCommand::ChannelOpened => self.fetcher.on_channel_opened(),
            FetcherCommand::ChannelClosed => self.fetcher.on_channel_closed(),
            FetcherCommand::Status { node_id, reply } => {
                let _ = reply.send(self.fetcher.node_fetch_status(&node_id));
            }
        }
    }

    /// Spawns every queued request without waiting for completions.
    pub fn dispatch(&mut self) {
        for request in self.fetcher.take_requests() {
            self.in_flight += 1;
            let attributes = Arc::clone(&self.attributes);
            let view = Arc::clone(&self.view);
            let completions = self.completion_tx.clone();
            let timeout = self.request_timeout;
            tokio::spawn(async move {
                let completion = execute(attributes.as_ref(), view.as_ref(), request, timeout).await;
                // The receiver lives as long as the driver.
                let _ = completions.send(completion);
            });
        }
    }

    async fn forward_events(&mut self) {
        for event in self.fetcher.take_events() {
            if self.events.send(event).await.is_err() {
                debug!("Event receiver dropped");
            }
        }
    }
}

async fn execute(
    attributes: &dyn AttributeService,
    view: &dyn ViewService,
    request: OutgoingRequest,
    timeout: Duration,
) -> Completion {
    let service = request.service();
    let ticket = request.ticket();
    let expired = request.fail(StatusCode::BAD_TIMEOUT);

    let completion = match request {
        OutgoingRequest::Read { read_ids, .. } => {
            tokio::time::timeout(timeout, attributes.read(read_ids))
                .await
                .map(|result| Completion::Read { ticket, result })
        }
        OutgoingRequest::Browse { descriptions, .. } => {
            tokio::time::timeout(timeout, view.browse(descriptions))
                .await
                .map(|result| Completion::Browse { ticket, result })
        }
    };

    completion.unwrap_or_else(|_| {
        NodeSyncError::transport(TransportError::timeout(service, timeout)).log("fetch driver");
        expired
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{test_server_space, MemoryServer};
    use nodesync_core::{AddressSpace, GenericNodeFactory, StandardCatalog};

    fn driver(server: &MemoryServer) -> (FetchDriver, mpsc::Receiver<FetcherEvent>) {
        let mut space = AddressSpace::new();
        StandardCatalog::standard().install(&mut space).unwrap();
        let config = FetcherConfig::default();
        let fetcher =
            AddressSpaceFetcher::new(space, Arc::new(GenericNodeFactory::new()), &config);
        let server = Arc::new(server.clone());
        FetchDriver::new(fetcher, server.clone(), server, &config)
    }

    #[tokio::test]
    async fn test_run_until_idle_fetches_node() {
        let server = MemoryServer::new(test_server_space());
        let (mut driver, mut events) = driver(&server);
        let node_id = NodeId::numeric(1, 2);

        driver.fetcher_mut().on_channel_opened();
        driver
            .fetcher_mut()
            .fetch_node(&node_id, NodeFetchStatus::node_only());
        driver.run_until_idle().await;

        assert_eq!(driver.in_flight(), 0);
        assert!(driver.fetcher().space().contains(&node_id));

        let mut status_events = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, FetcherEvent::StatusChanged(_)) {
                status_events += 1;
            }
        }
        assert!(status_events > 0);
    }

    #[tokio::test]
    async fn test_handle_commands_and_shutdown() {
        let server = MemoryServer::new(test_server_space());
        let (driver, _events) = driver(&server);
        let handle = driver.handle();
        let (_view_tx, view_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(driver.run(view_rx, shutdown_rx));

        handle.channel_opened().await.unwrap();
        handle
            .fetch_node(NodeId::numeric(1, 1), NodeFetchStatus::node_only())
            .await
            .unwrap();

        let mut status = handle.status(NodeId::numeric(1, 1)).await.unwrap();
        for _ in 0..1000 {
            if status.1.node_fetched {
                break;
            }
            tokio::task::yield_now().await;
            status = handle.status(NodeId::numeric(1, 1)).await.unwrap();
        }
        assert_eq!(status, (StatusCode::GOOD, NodeFetchStatus::node_only()));

        shutdown_tx.send(()).unwrap();
        let fetcher = task.await.unwrap();
        assert!(fetcher.space().contains(&NodeId::numeric(1, 1)));
        assert!(handle.channel_closed().await.is_err());
    }
}
