//! Controller and transport wired together.
//!
//! [`Session`] is what a front end drives: it owns the controller, the
//! transport handle and the event receiver. Every state change goes through
//! [`Session::apply`] or [`Session::submit`], both of which flush queued
//! frames to the transport immediately.

use tokio::sync::mpsc;
use tracing::debug;

use crate::controller::{ControllerConfig, SessionController};
use crate::protocol;
use crate::transport::{TransportConfig, TransportEvent, TransportHandle, TransportManager};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub controller: ControllerConfig,
}

pub struct Session {
    controller: SessionController,
    transport: TransportHandle,
    events: mpsc::Receiver<TransportEvent>,
}

impl Session {
    /// Create the controller and start connecting.
    pub fn start(config: SessionConfig) -> Self {
        let controller = SessionController::new(config.controller);
        let (transport, events) = TransportManager::spawn(config.transport);
        Self {
            controller,
            transport,
            events,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut SessionController {
        &mut self.controller
    }

    /// Next transport event. `None` once the transport has shut down.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn apply(&mut self, event: TransportEvent) {
        self.controller.handle(event);
        self.flush();
    }

    /// Submit the pending prompt. Returns `false` when nothing was pending.
    pub fn submit(&mut self) -> bool {
        let submitted = self.controller.submit();
        self.flush();
        submitted
    }

    /// Close the connection and end the session. No reconnect follows.
    ///
    /// Events not yet received are discarded, so a backlog of server frames
    /// cannot hold up the shutdown.
    pub async fn stop(mut self) {
        self.controller.stop();
        self.events.close();
        while self.events.try_recv().is_ok() {}
        self.transport.stop().await;
    }

    fn flush(&mut self) {
        for out in self.controller.take_outgoing() {
            let text = protocol::encode(&out.message);
            if !self.transport.send(out.connection, text) {
                debug!(connection = %out.connection, "transport gone, frame dropped");
            }
        }
    }
}
