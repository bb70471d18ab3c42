use log::{info, warn};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep_until, Instant};

use super::node::TelemetryNode;
use crate::output::link::LinkEvent;
use crate::scheduler::{duration_to_ticks, ticks_to_duration, ticks_to_duration_ceil, Ticks};

const IDLE_WAKE: Duration = Duration::from_secs(60);

pub struct NodeRuntime {
    node: TelemetryNode,
    events: UnboundedReceiver<LinkEvent>,
    origin: Instant,
}

impl NodeRuntime {
    pub fn new(node: TelemetryNode, events: UnboundedReceiver<LinkEvent>) -> Self {
        Self {
            node,
            events,
            origin: Instant::now(),
        }
    }

    fn elapsed_ticks(&self) -> Ticks {
        duration_to_ticks(self.origin.elapsed())
    }

    fn wake_at(&self) -> Instant {
        match self.node.next_deadline() {
            Some(due) => self.origin + ticks_to_duration_ceil(due),
            None => Instant::now() + IDLE_WAKE,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<TelemetryNode> {
        self.origin = Instant::now() - ticks_to_duration(self.node.now());
        info!("🚀 Node running, Ctrl-C to stop");

        loop {
            self.node.advance_to(self.elapsed_ticks());
            let wake = self.wake_at();

            tokio::select! {
                _ = sleep_until(wake) => {}
                event = self.events.recv() => match event {
                    Some(event) => {
                        self.node.advance_to(self.elapsed_ticks());
                        self.node.handle_link_event(event);
                    }
                    None => {
                        warn!("⚠️  Link event channel closed");
                        break;
                    }
                },
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("🛑 Shutdown requested");
                    break;
                }
            }
        }

        let quality = self.node.network_quality();
        info!(
            "📊 {} acknowledged, {} failed, {} queued",
            quality.acks,
            quality.nacks,
            self.node.queue().len()
        );
        Ok(self.node)
    }
}
