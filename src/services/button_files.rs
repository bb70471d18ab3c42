use log::{debug, info};

use super::outbound_queue::OutboundFile;
use crate::storage::models::{
    ButtonConfigFile, ButtonFile, FileId, Record, BUTTON_CONFIG_FILE_ID, BUTTON_FILE_ID,
};
use crate::storage::store::{load_or_init, read_record, write_record, FileStore};
use crate::utils::error::StoreError;

pub struct ButtonFiles {
    stored: ButtonConfigFile,
    transmit_state: bool,
    config_transmit_state: bool,
    test_mode: bool,
}

impl ButtonFiles {
    pub fn initialize(store: &mut dyn FileStore) -> Result<Self, StoreError> {
        let stored = load_or_init(store, &ButtonConfigFile::default())?;
        store.init(BUTTON_FILE_ID, ButtonFile::header(), &ButtonFile::default().encode())?;
        store.watch(BUTTON_CONFIG_FILE_ID);
        store.watch(BUTTON_FILE_ID);
        Ok(Self {
            stored,
            transmit_state: false,
            config_transmit_state: false,
            test_mode: false,
        })
    }

    /// Configuration in force. Test mode reports every edge whatever the
    /// stored flags say.
    pub fn config(&self) -> ButtonConfigFile {
        if self.test_mode {
            ButtonConfigFile {
                transmit_mask_0: true,
                transmit_mask_1: true,
                enabled: true,
                ..self.stored
            }
        } else {
            self.stored
        }
    }

    pub fn stored_config(&self) -> ButtonConfigFile {
        self.stored
    }

    pub fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    pub fn on_button_event(
        &self,
        button_id: u8,
        pressed: bool,
        buttons_state: u8,
        store: &mut dyn FileStore,
    ) -> Result<(), StoreError> {
        debug!(
            "🔘 Button {} {}",
            button_id,
            if pressed { "pressed" } else { "released" }
        );
        write_record(
            store,
            &ButtonFile {
                button_id,
                mask: pressed,
                buttons_state,
            },
        )
    }

    pub fn on_file_changed(
        &mut self,
        id: FileId,
        store: &dyn FileStore,
    ) -> Result<Option<OutboundFile>, StoreError> {
        match id {
            BUTTON_CONFIG_FILE_ID => {
                self.stored = read_record(store)?;
                if self.config_transmit_state {
                    return Ok(Some(self.config_file()));
                }
                Ok(None)
            }
            BUTTON_FILE_ID => {
                let file: ButtonFile = read_record(store)?;
                let config = self.config();
                let wanted = if file.mask {
                    config.transmit_mask_1
                } else {
                    config.transmit_mask_0
                };
                if wanted && self.transmit_state && config.enabled {
                    Ok(Some(OutboundFile {
                        id: BUTTON_FILE_ID,
                        payload: file.encode(),
                    }))
                } else {
                    debug!("Button {} edge not reported", file.button_id);
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    pub fn set_measure_state(&mut self, enable: bool) {
        self.transmit_state = enable;
        self.config_transmit_state = enable;
    }

    pub fn set_test_mode(&mut self, enable: bool) {
        if self.test_mode != enable {
            self.test_mode = enable;
            info!("🧪 Button test mode {}", if enable { "on" } else { "off" });
        }
    }

    pub fn set_enabled(&mut self, enable: bool, store: &mut dyn FileStore) -> Result<(), StoreError> {
        if self.stored.enabled == enable {
            return Ok(());
        }
        self.stored.enabled = enable;
        write_record(store, &self.stored)
    }

    pub fn transmit_config_file(&mut self, store: &dyn FileStore) -> Result<OutboundFile, StoreError> {
        self.stored = read_record(store)?;
        Ok(self.config_file())
    }

    fn config_file(&self) -> OutboundFile {
        OutboundFile {
            id: BUTTON_CONFIG_FILE_ID,
            payload: self.stored.encode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::MemoryStore;

    fn setup() -> (ButtonFiles, MemoryStore) {
        let mut store = MemoryStore::new();
        let files = ButtonFiles::initialize(&mut store).unwrap();
        (files, store)
    }

    fn press(files: &mut ButtonFiles, store: &mut MemoryStore, pressed: bool) -> Option<OutboundFile> {
        files.on_button_event(2, pressed, 0b0100, store).unwrap();
        assert_eq!(store.take_changes(), vec![BUTTON_FILE_ID]);
        files.on_file_changed(BUTTON_FILE_ID, &*store).unwrap()
    }

    #[test]
    fn test_edges_reported_once_enabled() {
        let (mut files, mut store) = setup();
        assert_eq!(press(&mut files, &mut store, true), None);

        files.set_measure_state(true);
        let queued = press(&mut files, &mut store, true).unwrap();
        assert_eq!(queued.id, BUTTON_FILE_ID);
        assert_eq!(queued.payload, vec![2, 1, 0b0100]);
    }

    #[test]
    fn test_mask_filters_edge_type() {
        let (mut files, mut store) = setup();
        files.set_measure_state(true);
        write_record(
            &mut store,
            &ButtonConfigFile {
                transmit_mask_0: false,
                ..ButtonConfigFile::default()
            },
        )
        .unwrap();
        store.take_changes();
        files.on_file_changed(BUTTON_CONFIG_FILE_ID, &store).unwrap();

        assert!(press(&mut files, &mut store, true).is_some());
        assert!(press(&mut files, &mut store, false).is_none());
    }

    #[test]
    fn test_disabled_suppresses_edges() {
        let (mut files, mut store) = setup();
        files.set_measure_state(true);
        files.set_enabled(false, &mut store).unwrap();
        store.take_changes();
        let queued = files.on_file_changed(BUTTON_CONFIG_FILE_ID, &store).unwrap();
        assert_eq!(queued.map(|f| f.payload), Some(vec![1, 1, 1, 0]));
        assert!(!files.is_enabled());
        assert!(press(&mut files, &mut store, true).is_none());
    }

    #[test]
    fn test_test_mode_overrides_stored_config() {
        let (mut files, mut store) = setup();
        files.set_measure_state(true);
        files.set_enabled(false, &mut store).unwrap();
        store.take_changes();
        files.on_file_changed(BUTTON_CONFIG_FILE_ID, &store).unwrap();

        files.set_test_mode(true);
        assert!(files.is_enabled());
        assert!(press(&mut files, &mut store, false).is_some());

        files.set_test_mode(false);
        assert!(!files.is_enabled());
    }

    #[test]
    fn test_test_mode_never_reaches_stored_config() {
        let (mut files, mut store) = setup();
        files.set_measure_state(true);
        write_record(
            &mut store,
            &ButtonConfigFile {
                transmit_mask_0: false,
                ..ButtonConfigFile::default()
            },
        )
        .unwrap();
        store.take_changes();
        files.on_file_changed(BUTTON_CONFIG_FILE_ID, &store).unwrap();

        files.set_test_mode(true);
        files.set_enabled(false, &mut store).unwrap();
        store.take_changes();
        let reported = files
            .on_file_changed(BUTTON_CONFIG_FILE_ID, &store)
            .unwrap()
            .unwrap();
        files.set_test_mode(false);

        let stored: ButtonConfigFile = read_record(&store).unwrap();
        assert!(!stored.transmit_mask_0);
        assert!(!stored.enabled);
        assert_eq!(reported.payload, stored.encode());
        assert_eq!(files.config(), stored);
    }

    #[test]
    fn test_enabling_during_test_mode_is_persisted() {
        let (mut files, mut store) = setup();
        files.set_enabled(false, &mut store).unwrap();
        files.set_test_mode(true);
        files.set_enabled(true, &mut store).unwrap();
        files.set_test_mode(false);

        let stored: ButtonConfigFile = read_record(&store).unwrap();
        assert!(stored.enabled);
        assert!(files.is_enabled());
    }
}
