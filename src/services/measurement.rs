use log::{debug, info, warn};
use serde::Serialize;

use crate::config::settings::MeasurementConfig;
use crate::devices::acquisition::{Acquisition, RegisterReader};
use crate::devices::power_meter::Quantity;
use crate::scheduler::{Scheduler, Task, Ticks};
use crate::storage::models::EnergyFile;
use crate::storage::store::{write_record, FileStore};
use crate::utils::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    ReadingRealEnergy,
    ReadingApparentEnergy,
    ReadingVoltage,
    ReadingCurrent,
    Done,
}

impl Phase {
    pub fn quantity(self) -> Option<Quantity> {
        match self {
            Phase::ReadingRealEnergy => Some(Quantity::RealEnergy),
            Phase::ReadingApparentEnergy => Some(Quantity::ApparentEnergy),
            Phase::ReadingVoltage => Some(Quantity::Voltage),
            Phase::ReadingCurrent => Some(Quantity::Current),
            Phase::Idle | Phase::Done => None,
        }
    }

    fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::ReadingRealEnergy,
            Phase::ReadingRealEnergy => Phase::ReadingApparentEnergy,
            Phase::ReadingApparentEnergy => Phase::ReadingVoltage,
            Phase::ReadingVoltage => Phase::ReadingCurrent,
            Phase::ReadingCurrent | Phase::Done => Phase::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseOutcome {
    pub quantity: Quantity,
    pub success: bool,
    pub attempts: u32,
}

pub struct MeasurementOrchestrator {
    reader: RegisterReader,
    phase: Phase,
    valid: bool,
    record: EnergyFile,
    outcomes: Vec<PhaseOutcome>,
    step_delay: Ticks,
    abort_on_failure: bool,
    cycles: u64,
}

impl MeasurementOrchestrator {
    pub fn new(reader: RegisterReader, config: &MeasurementConfig) -> Self {
        Self {
            reader,
            phase: Phase::Idle,
            valid: true,
            record: EnergyFile::default(),
            outcomes: Vec::with_capacity(Quantity::ALL.len()),
            step_delay: config.step_delay_ticks,
            abort_on_failure: config.abort_on_failure,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn last_phase_outcomes(&self) -> &[PhaseOutcome] {
        &self.outcomes
    }

    pub fn last_record(&self) -> Option<EnergyFile> {
        (self.cycles > 0 && !self.is_running()).then_some(self.record)
    }

    pub fn completed_cycles(&self) -> u64 {
        self.cycles
    }

    pub fn start_cycle(
        &mut self,
        scheduler: &mut dyn Scheduler,
        store: &mut dyn FileStore,
    ) -> Result<(), StoreError> {
        if self.is_running() {
            warn!("⚠️  Measurement cycle requested while {:?}, ignored", self.phase);
            return Ok(());
        }
        info!("⚡ Starting measurement cycle {}", self.cycles + 1);
        self.valid = true;
        self.record = EnergyFile::default();
        self.outcomes.clear();
        self.phase = Phase::ReadingRealEnergy;
        self.step(scheduler, store)
    }

    /// Runs the current phase, then either posts the next step or, after the
    /// last phase, writes the record.
    pub fn step(
        &mut self,
        scheduler: &mut dyn Scheduler,
        store: &mut dyn FileStore,
    ) -> Result<(), StoreError> {
        let Some(quantity) = self.phase.quantity() else {
            debug!("Measurement step in {:?}, nothing to do", self.phase);
            return Ok(());
        };

        let acquisition = self.reader.read_quantity(quantity);
        self.valid &= acquisition.success;
        self.outcomes.push(PhaseOutcome {
            quantity,
            success: acquisition.success,
            attempts: acquisition.attempts,
        });
        self.store_values(quantity, &acquisition);

        self.phase = if !acquisition.success && self.abort_on_failure {
            warn!("⚠️  {} failed, skipping the remaining phases", quantity);
            Phase::Done
        } else {
            self.phase.next()
        };

        if self.phase == Phase::Done {
            self.finish(store)
        } else {
            scheduler.post_delayed(Task::MeasurementStep, self.step_delay);
            Ok(())
        }
    }

    fn store_values(&mut self, quantity: Quantity, acquisition: &Acquisition) {
        match quantity {
            Quantity::RealEnergy => self.record.real_energy = acquisition.values(),
            Quantity::ApparentEnergy => self.record.apparent_energy = acquisition.values(),
            Quantity::Voltage => self.record.voltage = acquisition.values(),
            Quantity::Current => self.record.current = acquisition.values(),
        }
    }

    fn finish(&mut self, store: &mut dyn FileStore) -> Result<(), StoreError> {
        self.record.measurement_valid = self.valid;
        self.phase = Phase::Idle;
        self.cycles += 1;
        info!(
            "⚡ Measurement done (valid: {}): real {:?} Wh, apparent {:?} VAh, {:?} V, {:?} mA",
            self.valid,
            self.record.real_energy,
            self.record.apparent_energy,
            self.record.voltage,
            self.record.current
        );
        write_record(store, &self.record)
    }
}
