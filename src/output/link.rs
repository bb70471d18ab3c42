use bytes::Bytes;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use crate::storage::models::FileId;
use crate::utils::error::LinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub u8);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Addressee {
    Broadcast { expected_responders: u8 },
    Unicast { uid: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub access_class: u8,
    pub addressee: Addressee,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            access_class: 0x01,
            addressee: Addressee::Broadcast {
                expected_responders: 3,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub destination: Destination,
    pub file_id: FileId,
    pub offset: u32,
    pub payload: Bytes,
}

impl Command {
    pub fn length(&self) -> u32 {
        self.payload.len() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub tag: Tag,
    pub link_budget: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Completed { tag: Tag, success: bool },
    Result(LinkStatus),
}

pub trait RadioLink {
    fn submit(&mut self, command: &Command) -> Result<Tag, LinkError>;

    fn free_commands(&mut self);

    fn set_tx_power(&mut self, dbm: u8);
}

/// Stand-in link for bench runs: logs each command and acknowledges it
/// through the node's event channel.
pub struct LoopbackLink {
    events: UnboundedSender<LinkEvent>,
    next_tag: u8,
    tx_power: u8,
}

impl LoopbackLink {
    pub fn new(events: UnboundedSender<LinkEvent>) -> Self {
        Self {
            events,
            next_tag: 0,
            tx_power: 0,
        }
    }
}

impl RadioLink for LoopbackLink {
    fn submit(&mut self, command: &Command) -> Result<Tag, LinkError> {
        self.next_tag = self.next_tag.wrapping_add(1);
        let tag = Tag(self.next_tag);
        info!(
            "📡 [LOOPBACK] {} file {} offset {} ({} bytes @ {} dBm): {}",
            tag,
            command.file_id,
            command.offset,
            command.length(),
            self.tx_power,
            hex::encode(&command.payload)
        );

        let status = LinkEvent::Result(LinkStatus {
            tag,
            link_budget: 80,
        });
        self.events
            .send(status)
            .and_then(|_| self.events.send(LinkEvent::Completed { tag, success: true }))
            .map_err(|_| LinkError::Unavailable("event channel closed".to_string()))?;
        Ok(tag)
    }

    fn free_commands(&mut self) {
        debug!("[LOOPBACK] freeing outstanding commands");
    }

    fn set_tx_power(&mut self, dbm: u8) {
        self.tx_power = dbm;
    }
}
