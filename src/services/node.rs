use log::{error, info};

use super::button_files::ButtonFiles;
use super::energy_files::EnergyFiles;
use super::measurement::MeasurementOrchestrator;
use super::outbound_queue::{OutboundFile, OutboundQueue};
use super::transmission::{NetworkQuality, TransmissionSession};
use crate::config::Config;
use crate::devices::acquisition::RegisterReader;
use crate::modbus::RegisterTransport;
use crate::output::indicator::Indicator;
use crate::output::link::{LinkEvent, RadioLink, Tag};
use crate::scheduler::{Scheduler, Task, Ticks, TimerQueue};
use crate::storage::models::{
    EnergyConfigFile, EnergyFile, BUTTON_CONFIG_FILE_ID, BUTTON_FILE_ID, ENERGY_CONFIG_FILE_ID,
    ENERGY_FILE_ID,
};
use crate::storage::store::FileStore;
use crate::utils::error::StoreError;

pub struct TelemetryNode {
    scheduler: TimerQueue,
    store: Box<dyn FileStore>,
    measurement: MeasurementOrchestrator,
    queue: OutboundQueue,
    session: TransmissionSession,
    energy: EnergyFiles,
    buttons: ButtonFiles,
}

impl TelemetryNode {
    pub fn new(
        config: &Config,
        transport: Box<dyn RegisterTransport>,
        link: Box<dyn RadioLink>,
        indicator: Box<dyn Indicator>,
        mut store: Box<dyn FileStore>,
    ) -> Result<Self, StoreError> {
        info!("🚀 Initializing {} [{}]", config.node.name, config.node.uuid);

        let mut scheduler = TimerQueue::new();
        for task in [
            Task::MeasurementCycle,
            Task::MeasurementStep,
            Task::DrainQueue,
            Task::TransmitTimeout(Tag(0)),
        ] {
            scheduler.register(task);
        }

        let defaults = EnergyConfigFile {
            interval: config.measurement.interval_secs,
            enabled: config.measurement.enabled,
        };
        let energy = EnergyFiles::initialize(store.as_mut(), defaults)?;
        let buttons = ButtonFiles::initialize(store.as_mut())?;

        let reader = RegisterReader::new(transport, &config.meter);
        let mut session = TransmissionSession::new(link, &config.network);
        session.start();

        Ok(Self {
            scheduler,
            store,
            measurement: MeasurementOrchestrator::new(reader, &config.measurement),
            queue: OutboundQueue::new(&config.queue, indicator),
            session,
            energy,
            buttons,
        })
    }

    pub fn start(&mut self) {
        self.set_measure_state(true);
        info!(
            "✅ Node started, measuring every {} s",
            self.energy.config().interval
        );
    }

    pub fn set_measure_state(&mut self, enable: bool) {
        self.energy.set_measure_state(enable, &mut self.scheduler);
        self.buttons.set_measure_state(enable);
    }

    pub fn now(&self) -> Ticks {
        self.scheduler.now()
    }

    pub fn next_deadline(&self) -> Option<Ticks> {
        self.scheduler.next_due()
    }

    pub fn run_task(&mut self, task: Task) {
        match task {
            Task::MeasurementCycle => {
                if let Err(e) = self
                    .measurement
                    .start_cycle(&mut self.scheduler, self.store.as_mut())
                {
                    error!("❌ Cannot store measurement: {}", e);
                }
            }
            Task::MeasurementStep => {
                if let Err(e) = self.measurement.step(&mut self.scheduler, self.store.as_mut()) {
                    error!("❌ Cannot store measurement: {}", e);
                }
            }
            Task::DrainQueue => self.queue.drain(&mut self.session, &mut self.scheduler),
            Task::TransmitTimeout(tag) => {
                if let Some(success) = self.session.on_timeout(tag) {
                    self.queue.on_transmit_done(success, &mut self.scheduler);
                }
            }
        }
        self.process_changes();
    }

    pub fn run_due(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop_due() {
            self.run_task(task);
            ran += 1;
        }
        ran
    }

    /// Moves the clock to `target`, running tasks at their due ticks on the
    /// way.
    pub fn advance_to(&mut self, target: Ticks) -> usize {
        let mut ran = self.run_due();
        while let Some(due) = self.scheduler.next_due().filter(|&due| due <= target) {
            self.scheduler.advance_to(due);
            ran += self.run_due();
        }
        self.scheduler.advance_to(target);
        ran + self.run_due()
    }

    pub fn advance(&mut self, ticks: Ticks) -> usize {
        self.advance_to(self.now().saturating_add(ticks))
    }

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Completed { tag, success } => {
                if let Some(success) =
                    self.session
                        .on_command_completed(tag, success, &mut self.scheduler)
                {
                    self.queue.on_transmit_done(success, &mut self.scheduler);
                }
            }
            LinkEvent::Result(status) => self.session.on_command_result(status),
        }
    }

    pub fn measure_once(&mut self) -> Option<EnergyFile> {
        self.run_task(Task::MeasurementCycle);
        while self.measurement.is_running() {
            let due = self.scheduler.next_due()?;
            self.advance_to(due);
        }
        self.measurement.last_record()
    }

    pub fn on_button_event(&mut self, button_id: u8, pressed: bool, buttons_state: u8) {
        if let Err(e) =
            self.buttons
                .on_button_event(button_id, pressed, buttons_state, self.store.as_mut())
        {
            error!("❌ Cannot record button {}: {}", button_id, e);
        }
        self.process_changes();
    }

    pub fn set_measurement_enabled(&mut self, enable: bool) -> Result<(), StoreError> {
        self.energy.set_enabled(enable, self.store.as_mut())?;
        self.process_changes();
        Ok(())
    }

    pub fn set_measurement_interval(&mut self, secs: u32) -> Result<(), StoreError> {
        self.energy.set_interval(secs, self.store.as_mut())?;
        self.process_changes();
        Ok(())
    }

    pub fn set_buttons_enabled(&mut self, enable: bool) -> Result<(), StoreError> {
        self.buttons.set_enabled(enable, self.store.as_mut())?;
        self.process_changes();
        Ok(())
    }

    pub fn set_button_test_mode(&mut self, enable: bool) {
        self.buttons.set_test_mode(enable);
    }

    pub fn transmit_config_files(&mut self) -> Result<(), StoreError> {
        let energy = self.energy.transmit_config_file(self.store.as_ref())?;
        let buttons = self.buttons.transmit_config_file(self.store.as_ref())?;
        self.enqueue(energy);
        self.enqueue(buttons);
        Ok(())
    }

    pub fn set_tx_power(&mut self, dbm: u8) -> u8 {
        self.session.set_tx_power(dbm)
    }

    pub fn set_flash_on_empty(&mut self, enabled: bool) {
        self.queue.set_flash_on_empty(enabled);
    }

    pub fn network_quality(&self) -> NetworkQuality {
        self.session.network_quality()
    }

    pub fn store(&self) -> &dyn FileStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn FileStore {
        self.store.as_mut()
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn session(&self) -> &TransmissionSession {
        &self.session
    }

    pub fn measurement(&self) -> &MeasurementOrchestrator {
        &self.measurement
    }

    pub fn energy_files(&self) -> &EnergyFiles {
        &self.energy
    }

    pub fn button_files(&self) -> &ButtonFiles {
        &self.buttons
    }

    pub fn scheduler(&self) -> &TimerQueue {
        &self.scheduler
    }

    fn process_changes(&mut self) {
        loop {
            let changes = self.store.take_changes();
            if changes.is_empty() {
                break;
            }
            for id in changes {
                let outgoing = match id {
                    ENERGY_FILE_ID | ENERGY_CONFIG_FILE_ID => {
                        self.energy
                            .on_file_changed(id, self.store.as_ref(), &mut self.scheduler)
                    }
                    BUTTON_FILE_ID | BUTTON_CONFIG_FILE_ID => {
                        self.buttons.on_file_changed(id, self.store.as_ref())
                    }
                    _ => Ok(None),
                };
                match outgoing {
                    Ok(Some(file)) => self.enqueue(file),
                    Ok(None) => {}
                    Err(e) => error!("❌ Cannot handle change of file {}: {}", id, e),
                }
            }
        }
    }

    fn enqueue(&mut self, file: OutboundFile) {
        let ready = self.session.is_ready();
        // rejections are logged by the queue
        let _ = self
            .queue
            .enqueue(&file.payload, file.id, ready, &mut self.scheduler);
    }
}
