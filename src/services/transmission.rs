use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::settings::{NetworkConfig, MAX_TX_POWER_DBM};
use crate::output::link::{Command, Destination, LinkStatus, RadioLink, Tag};
use crate::scheduler::{Scheduler, Task, Ticks};
use crate::storage::models::FileId;
use crate::utils::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    NotReady,
    Ready,
    Transmitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub tag: Tag,
    pub file_id: FileId,
    pub deadline: Ticks,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkQuality {
    pub acks: u32,
    pub nacks: u32,
    pub last_link_budget: Option<u8>,
    pub last_ack_at: Option<DateTime<Utc>>,
}

pub struct TransmissionSession {
    link: Box<dyn RadioLink>,
    destination: Destination,
    timeout: Ticks,
    initial_tx_power: u8,
    tx_power: u8,
    state: SessionState,
    in_flight: Option<InFlight>,
    quality: NetworkQuality,
}

impl TransmissionSession {
    pub fn new(link: Box<dyn RadioLink>, config: &NetworkConfig) -> Self {
        Self {
            link,
            destination: config.destination,
            timeout: config.timeout_ticks,
            initial_tx_power: config.tx_power_dbm,
            tx_power: 0,
            state: SessionState::NotReady,
            in_flight: None,
            quality: NetworkQuality::default(),
        }
    }

    pub fn start(&mut self) {
        self.set_tx_power(self.initial_tx_power);
        self.state = SessionState::Ready;
        info!(
            "📡 Transmission session ready ({} dBm, timeout {} ticks)",
            self.tx_power, self.timeout
        );
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub fn tx_power(&self) -> u8 {
        self.tx_power
    }

    pub fn transmit(
        &mut self,
        file_id: FileId,
        offset: u32,
        payload: Bytes,
        scheduler: &mut dyn Scheduler,
    ) -> Result<Tag, SessionError> {
        match self.state {
            SessionState::Ready => {}
            SessionState::Transmitting => return Err(SessionError::Busy),
            SessionState::NotReady => return Err(SessionError::NotReady),
        }

        let command = Command {
            destination: self.destination,
            file_id,
            offset,
            payload,
        };
        let tag = self.link.submit(&command)?;

        let deadline = scheduler.now().saturating_add(self.timeout);
        self.in_flight = Some(InFlight {
            tag,
            file_id,
            deadline,
        });
        self.state = SessionState::Transmitting;
        scheduler.post_delayed(Task::TransmitTimeout(tag), self.timeout);
        debug!(
            "📤 File {} submitted as {} ({} bytes), deadline tick {}",
            file_id,
            tag,
            command.length(),
            deadline
        );
        Ok(tag)
    }

    /// Completion reported by the link. Returns the outcome when `tag` is the
    /// transmission in flight, `None` for stale or foreign tags.
    pub fn on_command_completed(
        &mut self,
        tag: Tag,
        success: bool,
        scheduler: &mut dyn Scheduler,
    ) -> Option<bool> {
        if !self.is_in_flight(tag) {
            debug!("Ignoring completion for {}", tag);
            return None;
        }
        scheduler.cancel(Task::TransmitTimeout(tag));
        if success {
            debug!("✅ {} acknowledged", tag);
        } else {
            debug!("❌ {} completed without acknowledgement", tag);
        }
        Some(self.finish(success))
    }

    pub fn on_timeout(&mut self, tag: Tag) -> Option<bool> {
        if !self.is_in_flight(tag) {
            debug!("Ignoring stale timeout for {}", tag);
            return None;
        }
        warn!("⏰ No completion for {} before the deadline", tag);
        self.link.free_commands();
        Some(self.finish(false))
    }

    pub fn on_command_result(&mut self, status: LinkStatus) {
        debug!(
            "📶 Response for {} @ {} dB link budget",
            status.tag, status.link_budget
        );
        self.quality.last_link_budget = Some(status.link_budget);
    }

    pub fn set_tx_power(&mut self, dbm: u8) -> u8 {
        let clamped = dbm.min(MAX_TX_POWER_DBM);
        if clamped != dbm {
            warn!("⚠️  TX power {} dBm clamped to {} dBm", dbm, clamped);
        }
        self.link.set_tx_power(clamped);
        self.tx_power = clamped;
        clamped
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.quality
    }

    fn is_in_flight(&self, tag: Tag) -> bool {
        self.in_flight.is_some_and(|f| f.tag == tag)
    }

    fn finish(&mut self, success: bool) -> bool {
        self.in_flight = None;
        self.state = SessionState::Ready;
        if success {
            self.quality.acks = self.quality.acks.saturating_add(1);
            self.quality.last_ack_at = Some(Utc::now());
        } else {
            self.quality.nacks = self.quality.nacks.saturating_add(1);
        }
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerQueue;
    use crate::testing::RecordingLink;
    use crate::utils::error::LinkError;

    fn setup() -> (TransmissionSession, RecordingLink, TimerQueue) {
        let link = RecordingLink::new();
        let mut session =
            TransmissionSession::new(Box::new(link.clone()), &NetworkConfig::default());
        session.start();
        let mut scheduler = TimerQueue::new();
        scheduler.register(Task::TransmitTimeout(Tag(0)));
        (session, link, scheduler)
    }

    #[test]
    fn test_not_ready_until_started() {
        let mut session = TransmissionSession::new(
            Box::new(RecordingLink::new()),
            &NetworkConfig::default(),
        );
        let mut scheduler = TimerQueue::new();
        assert_eq!(session.state(), SessionState::NotReady);
        assert_eq!(
            session.transmit(52, 0, Bytes::new(), &mut scheduler),
            Err(SessionError::NotReady)
        );
    }

    #[test]
    fn test_start_applies_configured_tx_power() {
        let (session, link, _) = setup();
        assert_eq!(session.tx_power(), 17);
        assert_eq!(link.log.borrow().tx_power, Some(17));
    }

    #[test]
    fn test_accepted_transmit_arms_timeout() {
        let (mut session, link, mut scheduler) = setup();
        let tag = session
            .transmit(52, 0, Bytes::from_static(&[1, 2, 3]), &mut scheduler)
            .unwrap();

        assert_eq!(session.state(), SessionState::Transmitting);
        assert_eq!(session.in_flight().map(|f| f.deadline), Some(10_000));
        assert_eq!(scheduler.remaining(Task::TransmitTimeout(tag)), Some(10_000));

        let command = link.last().unwrap();
        assert_eq!(command.file_id, 52);
        assert_eq!(command.offset, 0);
        assert_eq!(command.length(), 3);
        assert_eq!(command.destination, Destination::default());
    }

    #[test]
    fn test_transmit_while_transmitting_is_busy() {
        let (mut session, link, mut scheduler) = setup();
        let tag = session
            .transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler)
            .unwrap();
        let before = session.in_flight();
        scheduler.advance_to(100);

        assert_eq!(
            session.transmit(51, 0, Bytes::from_static(&[2]), &mut scheduler),
            Err(SessionError::Busy)
        );
        assert_eq!(session.in_flight(), before);
        assert_eq!(link.submitted(), 1);
        assert_eq!(scheduler.remaining(Task::TransmitTimeout(tag)), Some(9_900));
    }

    #[test]
    fn test_timeout_reports_failure_and_frees_link() {
        let (mut session, link, mut scheduler) = setup();
        let tag = session
            .transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler)
            .unwrap();

        scheduler.advance_to(9_999);
        assert_eq!(scheduler.pop_due(), None);
        scheduler.advance_to(10_000);
        assert_eq!(scheduler.pop_due(), Some(Task::TransmitTimeout(tag)));

        assert_eq!(session.on_timeout(tag), Some(false));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.in_flight(), None);
        assert_eq!(link.log.borrow().freed, 1);
        assert_eq!(session.network_quality().nacks, 1);
    }

    #[test]
    fn test_completion_cancels_timeout() {
        let (mut session, _, mut scheduler) = setup();
        let tag = session
            .transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler)
            .unwrap();
        session.on_command_result(LinkStatus {
            tag,
            link_budget: 92,
        });
        assert_eq!(session.state(), SessionState::Transmitting);

        assert_eq!(session.on_command_completed(tag, true, &mut scheduler), Some(true));
        assert!(!scheduler.is_scheduled(Task::TransmitTimeout(tag)));
        assert!(session.is_ready());

        let quality = session.network_quality();
        assert_eq!(quality.acks, 1);
        assert_eq!(quality.nacks, 0);
        assert_eq!(quality.last_link_budget, Some(92));
        assert!(quality.last_ack_at.is_some());
    }

    #[test]
    fn test_foreign_and_late_tags_are_ignored() {
        let (mut session, _, mut scheduler) = setup();
        let first = session
            .transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler)
            .unwrap();

        assert_eq!(
            session.on_command_completed(Tag(first.0.wrapping_add(7)), true, &mut scheduler),
            None
        );
        assert_eq!(session.state(), SessionState::Transmitting);

        assert_eq!(session.on_command_completed(first, false, &mut scheduler), Some(false));
        let second = session
            .transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler)
            .unwrap();

        // a duplicate completion and a stale timeout for the first command
        assert_eq!(session.on_command_completed(first, true, &mut scheduler), None);
        assert_eq!(session.on_timeout(first), None);
        assert_eq!(session.in_flight().map(|f| f.tag), Some(second));
    }

    #[test]
    fn test_link_rejection_keeps_channel_ready() {
        let (mut session, link, mut scheduler) = setup();
        link.reject_next(1);
        assert!(matches!(
            session.transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler),
            Err(SessionError::Link(LinkError::Rejected(_)))
        ));
        assert!(session.is_ready());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_tx_power_is_clamped_in_any_state() {
        let (mut session, link, mut scheduler) = setup();
        session
            .transmit(52, 0, Bytes::from_static(&[1]), &mut scheduler)
            .unwrap();
        assert_eq!(session.set_tx_power(30), 20);
        assert_eq!(link.log.borrow().tx_power, Some(20));
        assert_eq!(session.state(), SessionState::Transmitting);
    }
}
