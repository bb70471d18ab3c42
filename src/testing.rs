use std::cell::RefCell;
use std::rc::Rc;

use crate::output::indicator::Indicator;
use crate::output::link::{Command, RadioLink, Tag};
use crate::utils::error::LinkError;

#[derive(Debug, Default)]
pub struct LinkLog {
    pub submitted: Vec<Command>,
    pub freed: usize,
    pub tx_power: Option<u8>,
    pub reject_next: usize,
    next_tag: u8,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    pub log: Rc<RefCell<LinkLog>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.log.borrow().submitted.len()
    }

    pub fn last(&self) -> Option<Command> {
        self.log.borrow().submitted.last().cloned()
    }

    pub fn reject_next(&self, count: usize) {
        self.log.borrow_mut().reject_next = count;
    }
}

impl RadioLink for RecordingLink {
    fn submit(&mut self, command: &Command) -> Result<Tag, LinkError> {
        let mut log = self.log.borrow_mut();
        if log.reject_next > 0 {
            log.reject_next -= 1;
            return Err(LinkError::Rejected("no command slot".to_string()));
        }
        log.next_tag = log.next_tag.wrapping_add(1);
        log.submitted.push(command.clone());
        Ok(Tag(log.next_tag))
    }

    fn free_commands(&mut self) {
        self.log.borrow_mut().freed += 1;
    }

    fn set_tx_power(&mut self, dbm: u8) {
        self.log.borrow_mut().tx_power = Some(dbm);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountingIndicator {
    pub flashes: Rc<RefCell<u32>>,
}

impl CountingIndicator {
    pub fn count(&self) -> u32 {
        *self.flashes.borrow()
    }
}

impl Indicator for CountingIndicator {
    fn flash(&mut self, times: u8) {
        *self.flashes.borrow_mut() += times as u32;
    }
}
