//! Key material in ESP32 NVS (Non-Volatile Storage)

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_svc::sys::EspError;
use smartlock_mcu::BlobStorage;

const NVS_NAMESPACE: &str = "smartlock";

/// NVS keys are limited to 15 characters
const MAX_KEY_LEN: usize = 15;

/// Largest blob we read back (armored key material)
const MAX_BLOB_LEN: usize = 512;

pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    pub fn open(partition: &EspNvsPartition<NvsDefault>) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition.clone(), NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

/// `/private_key.pem` -> `private_key_pem`
fn nvs_key(name: &str) -> String {
    name.trim_start_matches('/')
        .replace(['.', '/'], "_")
        .chars()
        .take(MAX_KEY_LEN)
        .collect()
}

impl BlobStorage for NvsStorage {
    type Error = EspError;

    fn write(&mut self, name: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.nvs.set_blob(&nvs_key(name), data)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut buf = vec![0u8; MAX_BLOB_LEN];
        Ok(self
            .nvs
            .get_blob(&nvs_key(name), &mut buf)?
            .map(|data| data.to_vec()))
    }

    fn remove(&mut self, name: &str) -> Result<(), Self::Error> {
        self.nvs.remove(&nvs_key(name)).map(|_| ())
    }

    fn exists(&self, name: &str) -> bool {
        matches!(self.nvs.blob_len(&nvs_key(name)), Ok(Some(_)))
    }
}
