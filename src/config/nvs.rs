//! NVS persistence for the link configuration with schema versioning.
//!
//! # Version History
//!
//! - **v1** (current): frame_len, mode
//!
//! The sample rate is not stored: only 8 kHz is supported.

use crate::config::LinkConfig;

#[cfg(target_os = "espidf")]
use crate::audio::mode::LinkMode;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;

/// Current NVS schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// NVS namespace for the link configuration
pub const NVS_NAMESPACE: &str = "audio_link";

#[cfg(target_os = "espidf")]
const VERSION_KEY: &str = "schema_ver";
#[cfg(target_os = "espidf")]
const FRAME_LEN_KEY: &str = "frame_len";
#[cfg(target_os = "espidf")]
const MODE_KEY: &str = "mode";

/// Outcome of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    /// Nothing stored yet, defaults kept
    FreshInstall,
    /// Stored configuration loaded
    Loaded(LinkConfig),
}

/// NVS operation errors
#[derive(Debug, thiserror::Error)]
pub enum NvsError {
    /// NVS initialization failed
    #[cfg(target_os = "espidf")]
    #[error("NVS init failed: {0}")]
    InitFailed(EspError),
    /// Schema version too new (downgrade not supported)
    #[error("stored schema v{stored_version} is newer than this firmware")]
    TooNew { stored_version: u32 },
    /// NVS read/write error
    #[cfg(target_os = "espidf")]
    #[error("NVS access failed: {0}")]
    IoError(EspError),
    /// Stored values do not form a valid configuration
    #[error("stored configuration is invalid: {0}")]
    Invalid(crate::config::ConfigError),
    /// Feature not available on this platform
    #[cfg(not(target_os = "espidf"))]
    #[error("NVS not available on this platform")]
    NotAvailable,
}

#[cfg(target_os = "espidf")]
impl From<EspError> for NvsError {
    fn from(e: EspError) -> Self {
        NvsError::IoError(e)
    }
}

/// Load the stored link configuration.
///
/// A fresh partition leaves the caller's defaults in place.
#[cfg(target_os = "espidf")]
pub fn load_link_config(partition: EspDefaultNvsPartition) -> Result<LoadResult, NvsError> {
    let storage: EspNvs<NvsDefault> =
        EspNvs::new(partition, NVS_NAMESPACE, true).map_err(NvsError::InitFailed)?;

    let stored_version = storage.get_u32(VERSION_KEY)?.unwrap_or(0);
    if stored_version == 0 {
        return Ok(LoadResult::FreshInstall);
    }
    if stored_version > CURRENT_SCHEMA_VERSION {
        return Err(NvsError::TooNew { stored_version });
    }

    let mut config = LinkConfig::default();
    if let Some(frame_len) = storage.get_u32(FRAME_LEN_KEY)? {
        config.frame_len = frame_len as usize;
    }
    if let Some(mode) = storage.get_u8(MODE_KEY)? {
        config.mode = LinkMode::from_u8(mode);
    }
    config.validate().map_err(NvsError::Invalid)?;

    Ok(LoadResult::Loaded(config))
}

/// Stub for non-ESP platforms
#[cfg(not(target_os = "espidf"))]
pub fn load_link_config() -> Result<LoadResult, NvsError> {
    Err(NvsError::NotAvailable)
}

/// Save the link configuration with the current version stamp.
#[cfg(target_os = "espidf")]
pub fn save_link_config(
    partition: EspDefaultNvsPartition,
    config: &LinkConfig,
) -> Result<(), NvsError> {
    config.validate().map_err(NvsError::Invalid)?;

    let mut storage: EspNvs<NvsDefault> =
        EspNvs::new(partition, NVS_NAMESPACE, true).map_err(NvsError::InitFailed)?;

    storage.set_u32(VERSION_KEY, CURRENT_SCHEMA_VERSION)?;
    storage.set_u32(FRAME_LEN_KEY, config.frame_len as u32)?;
    storage.set_u8(MODE_KEY, config.mode as u8)?;

    Ok(())
}

/// Stub for non-ESP platforms
#[cfg(not(target_os = "espidf"))]
pub fn save_link_config(config: &LinkConfig) -> Result<(), NvsError> {
    config.validate().map_err(NvsError::Invalid)?;
    Err(NvsError::NotAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mode::LinkMode;
    use crate::config::ConfigError;

    #[test]
    fn test_schema_version_constant() {
        assert_eq!(CURRENT_SCHEMA_VERSION, 1);
        assert_eq!(NVS_NAMESPACE, "audio_link");
    }

    #[test]
    fn test_host_stubs() {
        assert!(matches!(load_link_config(), Err(NvsError::NotAvailable)));
        assert!(matches!(
            save_link_config(&LinkConfig::default()),
            Err(NvsError::NotAvailable)
        ));
        assert!(matches!(
            save_link_config(&LinkConfig::new(41, LinkMode::Lpc)),
            Err(NvsError::Invalid(ConfigError::InvalidFrameLength(41)))
        ));
    }
}
