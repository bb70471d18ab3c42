use log::{debug, info, warn};

use super::outbound_queue::OutboundFile;
use crate::scheduler::{secs_to_ticks, Scheduler, Task, Ticks};
use crate::storage::models::{
    EnergyConfigFile, EnergyFile, FileId, Record, ENERGY_CONFIG_FILE_ID, ENERGY_FILE_ID,
};
use crate::storage::store::{load_or_init, read_record, write_record, FileStore};
use crate::utils::error::StoreError;

pub struct EnergyFiles {
    config: EnergyConfigFile,
    transmit_state: bool,
    config_transmit_state: bool,
}

impl EnergyFiles {
    pub fn initialize(
        store: &mut dyn FileStore,
        defaults: EnergyConfigFile,
    ) -> Result<Self, StoreError> {
        let config = load_or_init(store, &defaults)?;
        store.init(ENERGY_FILE_ID, EnergyFile::header(), &EnergyFile::default().encode())?;
        store.watch(ENERGY_CONFIG_FILE_ID);
        store.watch(ENERGY_FILE_ID);
        info!(
            "⚡ Energy files ready: interval {} s, {}",
            config.interval,
            if config.enabled { "enabled" } else { "disabled" }
        );
        Ok(Self {
            config,
            transmit_state: false,
            config_transmit_state: false,
        })
    }

    pub fn config(&self) -> EnergyConfigFile {
        self.config
    }

    pub fn interval_ticks(&self) -> Ticks {
        secs_to_ticks(self.config.interval)
    }

    pub fn is_measuring(&self) -> bool {
        self.config.enabled && self.transmit_state
    }

    pub fn on_file_changed(
        &mut self,
        id: FileId,
        store: &dyn FileStore,
        scheduler: &mut dyn Scheduler,
    ) -> Result<Option<OutboundFile>, StoreError> {
        match id {
            ENERGY_CONFIG_FILE_ID => {
                self.config = read_record(store)?;
                info!(
                    "⚙️  Energy config changed: interval {} s, {}",
                    self.config.interval,
                    if self.config.enabled { "enabled" } else { "disabled" }
                );
                self.rearm(scheduler);
                if self.config_transmit_state {
                    return Ok(Some(self.config_file()));
                }
                Ok(None)
            }
            ENERGY_FILE_ID => {
                let payload = store.read(ENERGY_FILE_ID, 0, EnergyFile::LAYOUT.size)?;
                self.rearm(scheduler);
                Ok(Some(OutboundFile {
                    id: ENERGY_FILE_ID,
                    payload,
                }))
            }
            _ => Ok(None),
        }
    }

    pub fn set_measure_state(&mut self, enable: bool, scheduler: &mut dyn Scheduler) {
        self.transmit_state = enable;
        self.config_transmit_state = enable;
        scheduler.cancel(Task::MeasurementCycle);
        self.rearm(scheduler);
    }

    pub fn set_enabled(&mut self, enable: bool, store: &mut dyn FileStore) -> Result<(), StoreError> {
        if self.config.enabled == enable {
            return Ok(());
        }
        self.config.enabled = enable;
        write_record(store, &self.config)
    }

    pub fn set_interval(&mut self, secs: u32, store: &mut dyn FileStore) -> Result<(), StoreError> {
        if self.config.interval == secs {
            return Ok(());
        }
        if secs == 0 {
            warn!("⚠️  Measurement interval of 0 s, cycles will run back to back");
        }
        self.config.interval = secs;
        write_record(store, &self.config)
    }

    pub fn transmit_config_file(&mut self, store: &dyn FileStore) -> Result<OutboundFile, StoreError> {
        self.config = read_record(store)?;
        Ok(self.config_file())
    }

    fn config_file(&self) -> OutboundFile {
        OutboundFile {
            id: ENERGY_CONFIG_FILE_ID,
            payload: self.config.encode(),
        }
    }

    fn rearm(&self, scheduler: &mut dyn Scheduler) {
        if self.is_measuring() {
            debug!("⏱️  Next measurement in {} s", self.config.interval);
            scheduler.post_delayed(Task::MeasurementCycle, self.interval_ticks());
        } else {
            scheduler.cancel(Task::MeasurementCycle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TimerQueue;
    use crate::storage::store::MemoryStore;

    fn setup() -> (EnergyFiles, MemoryStore, TimerQueue) {
        let mut store = MemoryStore::new();
        let files = EnergyFiles::initialize(&mut store, EnergyConfigFile::default()).unwrap();
        let mut scheduler = TimerQueue::new();
        scheduler.register(Task::MeasurementCycle);
        (files, store, scheduler)
    }

    #[test]
    fn test_measure_state_arms_periodic_cycle() {
        let (mut files, _, mut scheduler) = setup();
        assert!(!scheduler.is_scheduled(Task::MeasurementCycle));

        files.set_measure_state(true, &mut scheduler);
        assert_eq!(scheduler.remaining(Task::MeasurementCycle), Some(900 * 1024));

        files.set_measure_state(false, &mut scheduler);
        assert!(!scheduler.is_scheduled(Task::MeasurementCycle));
    }

    #[test]
    fn test_energy_change_queues_record_and_rearms() {
        let (mut files, mut store, mut scheduler) = setup();
        files.set_measure_state(true, &mut scheduler);
        scheduler.advance_to(1000);

        let record = EnergyFile {
            real_energy: [1, 2, 3],
            measurement_valid: true,
            ..EnergyFile::default()
        };
        write_record(&mut store, &record).unwrap();
        assert_eq!(store.take_changes(), vec![ENERGY_FILE_ID]);

        let queued = files
            .on_file_changed(ENERGY_FILE_ID, &store, &mut scheduler)
            .unwrap()
            .unwrap();
        assert_eq!(queued.id, ENERGY_FILE_ID);
        assert_eq!(queued.payload, record.encode());
        assert_eq!(scheduler.remaining(Task::MeasurementCycle), Some(900 * 1024));
    }

    #[test]
    fn test_config_change_rearms_and_reports() {
        let (mut files, mut store, mut scheduler) = setup();
        files.set_measure_state(true, &mut scheduler);

        files.set_interval(60, &mut store).unwrap();
        assert_eq!(store.take_changes(), vec![ENERGY_CONFIG_FILE_ID]);
        let queued = files
            .on_file_changed(ENERGY_CONFIG_FILE_ID, &store, &mut scheduler)
            .unwrap()
            .unwrap();
        assert_eq!(queued.id, ENERGY_CONFIG_FILE_ID);
        assert_eq!(queued.payload, vec![60, 0, 0, 0, 1]);
        assert_eq!(scheduler.remaining(Task::MeasurementCycle), Some(60 * 1024));

        files.set_enabled(false, &mut store).unwrap();
        files
            .on_file_changed(ENERGY_CONFIG_FILE_ID, &store, &mut scheduler)
            .unwrap();
        assert!(!scheduler.is_scheduled(Task::MeasurementCycle));
    }

    #[test]
    fn test_unchanged_settings_do_not_write() {
        let (mut files, mut store, _) = setup();
        files.set_enabled(true, &mut store).unwrap();
        files.set_interval(900, &mut store).unwrap();
        assert!(store.take_changes().is_empty());
    }

    #[test]
    fn test_config_not_reported_before_measure_state() {
        let (mut files, mut store, mut scheduler) = setup();
        files.set_interval(120, &mut store).unwrap();
        let queued = files
            .on_file_changed(ENERGY_CONFIG_FILE_ID, &store, &mut scheduler)
            .unwrap();
        assert_eq!(queued, None);
        assert_eq!(files.config().interval, 120);
    }

    #[test]
    fn test_transmit_config_file_rereads_store() {
        let (mut files, mut store, _) = setup();
        write_record(
            &mut store,
            &EnergyConfigFile {
                interval: 30,
                enabled: false,
            },
        )
        .unwrap();
        let file = files.transmit_config_file(&store).unwrap();
        assert_eq!(file.payload, vec![30, 0, 0, 0, 0]);
        assert!(!files.config().enabled);
    }
}
