use bytes::Bytes;
use log::{debug, error, info, warn};

use super::transmission::TransmissionSession;
use crate::config::settings::QueueConfig;
use crate::output::indicator::Indicator;
use crate::scheduler::{Scheduler, Task, Ticks};
use crate::storage::models::FileId;
use crate::utils::error::{QueueError, SessionError};

const META_BYTES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFile {
    pub id: FileId,
    pub payload: Vec<u8>,
}

/// Fixed-capacity byte ring. `put` is all-or-nothing.
#[derive(Debug)]
pub struct ByteRing {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl ByteRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn put(&mut self, data: &[u8]) -> bool {
        if data.len() > self.free() {
            return false;
        }
        let capacity = self.capacity();
        for (i, byte) in data.iter().enumerate() {
            self.buf[(self.head + self.len + i) % capacity] = *byte;
        }
        self.len += data.len();
        true
    }

    pub fn peek(&self, offset: usize, count: usize) -> Option<Vec<u8>> {
        if offset.checked_add(count)? > self.len {
            return None;
        }
        let capacity = self.capacity();
        Some(
            (0..count)
                .map(|i| self.buf[(self.head + offset + i) % capacity])
                .collect(),
        )
    }

    pub fn skip(&mut self, count: usize) {
        let count = count.min(self.len);
        if self.capacity() > 0 {
            self.head = (self.head + count) % self.capacity();
        }
        self.len -= count;
    }
}

pub struct OutboundQueue {
    payloads: ByteRing,
    meta: ByteRing,
    max_item_size: usize,
    max_attempts: u32,
    debounce: Ticks,
    failures: u32,
    flash_on_empty: bool,
    indicator: Box<dyn Indicator>,
}

impl OutboundQueue {
    pub fn new(config: &QueueConfig, indicator: Box<dyn Indicator>) -> Self {
        let max_item_size = config.max_item_size.min(u8::MAX as usize);
        Self {
            payloads: ByteRing::with_capacity(config.max_entries * max_item_size),
            meta: ByteRing::with_capacity(config.max_entries * META_BYTES),
            max_item_size,
            max_attempts: config.max_attempts.max(1),
            debounce: config.debounce_ticks,
            failures: 0,
            flash_on_empty: config.flash_on_empty,
            indicator,
        }
    }

    pub fn len(&self) -> usize {
        self.meta.len() / META_BYTES
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    pub fn retry_count(&self) -> u32 {
        self.failures
    }

    pub fn set_flash_on_empty(&mut self, enabled: bool) {
        self.flash_on_empty = enabled;
    }

    /// Queues a copy of `payload` for `id`. When the channel is free and no
    /// drain is pending, a drain is posted.
    pub fn enqueue(
        &mut self,
        payload: &[u8],
        id: FileId,
        channel_ready: bool,
        scheduler: &mut dyn Scheduler,
    ) -> Result<(), QueueError> {
        let len = payload.len();
        if len > self.max_item_size {
            error!(
                "❌ File {} ({} bytes) exceeds the {} byte item limit, dropped",
                id, len, self.max_item_size
            );
            return Err(QueueError::TooLarge {
                id,
                len,
                max: self.max_item_size,
            });
        }
        if self.payloads.free() < len || self.meta.free() < META_BYTES {
            error!("❌ Queue full, file {} ({} bytes) not added", id, len);
            return Err(QueueError::Full { id, len });
        }

        // both rings were checked for room, neither put can fail
        self.payloads.put(payload);
        self.meta.put(&[len as u8, id]);
        debug!("📥 File {} queued ({} bytes, {} entries)", id, len, self.len());

        if channel_ready && !scheduler.is_scheduled(Task::DrainQueue) {
            scheduler.post(Task::DrainQueue);
        }
        Ok(())
    }

    pub fn front(&self) -> Option<OutboundFile> {
        let meta = self.meta.peek(0, META_BYTES)?;
        let payload = self.payloads.peek(0, meta[0] as usize)?;
        Some(OutboundFile {
            id: meta[1],
            payload,
        })
    }

    pub fn drain(&mut self, session: &mut TransmissionSession, scheduler: &mut dyn Scheduler) {
        if !session.is_ready() {
            return;
        }
        let Some(entry) = self.front() else {
            return;
        };

        debug!(
            "📤 Transmitting file {} ({} bytes): {}",
            entry.id,
            entry.payload.len(),
            hex::encode(&entry.payload)
        );
        match session.transmit(entry.id, 0, Bytes::from(entry.payload), scheduler) {
            Ok(_) => {}
            Err(SessionError::Link(e)) => {
                warn!("⚠️  Could not hand file {} to the link: {}", entry.id, e);
                self.on_transmit_done(false, scheduler);
            }
            Err(e) => warn!("⚠️  Could not send file {}: {}", entry.id, e),
        }
    }

    pub fn on_transmit_done(&mut self, success: bool, scheduler: &mut dyn Scheduler) {
        if !success {
            self.failures += 1;
        }
        if success || self.failures >= self.max_attempts {
            if let Some(id) = self.pop_front() {
                if success {
                    debug!("✅ File {} delivered", id);
                } else {
                    error!(
                        "❌ File {} discarded after {} failed attempts",
                        id, self.failures
                    );
                }
            }
            self.failures = 0;
        } else {
            debug!(
                "🔁 Front entry failed, attempt {} of {}",
                self.failures, self.max_attempts
            );
        }

        if !self.is_empty() {
            scheduler.post_delayed(Task::DrainQueue, self.debounce);
        } else if self.flash_on_empty {
            info!("📭 Queue cleared");
            self.indicator.flash(1);
        }
    }

    fn pop_front(&mut self) -> Option<FileId> {
        let meta = self.meta.peek(0, META_BYTES)?;
        self.payloads.skip(meta[0] as usize);
        self.meta.skip(META_BYTES);
        Some(meta[1])
    }
}
