//! Per-session cached device state.

use crate::properties::CameraProperties;
use crate::session::error::ConfigError;

/// State owned by one session: the camera characteristics fetched from the
/// device. Decode calls that need calibration data receive this explicitly
/// rather than reading it from hidden session globals.
#[derive(Debug, Default)]
pub struct SessionState {
    properties: Option<CameraProperties>,
}

impl SessionState {
    pub fn properties(&self) -> Result<&CameraProperties, ConfigError> {
        self.properties.as_ref().ok_or(ConfigError::MissingProperties)
    }

    pub fn has_properties(&self) -> bool {
        self.properties.is_some()
    }

    pub fn set_properties(&mut self, properties: CameraProperties) {
        self.properties = Some(properties);
    }
}
