//! Commands understood by the device-side camera service.
//!
//! Each logical operation is one variant of a closed tagged union; the
//! `cmdName` discriminator and field names are fixed by the service's wire
//! protocol. Commands are immutable once built and serialize to a single
//! JSON object.

use serde::Serialize;
use serde_json::Value;

use crate::session::format::SurfaceFormat;

/// Per-frame capture settings: a flat map of qualified metadata keys.
pub type CaptureRequest = serde_json::Map<String, Value>;

/// One requested output surface.
///
/// Width and height may be omitted, in which case the device default is the
/// largest size available for the format. At most one surface per format
/// per camera is allowed, and at most one raw-family format per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSurfaceSpec {
    pub format: SurfaceFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_camera: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_case: Option<i64>,
    /// Statistics grid cell width, for the rawStats family only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_width: Option<u32>,
    /// Statistics grid cell height, for the rawStats family only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_height: Option<u32>,
}

impl OutputSurfaceSpec {
    pub fn new(format: SurfaceFormat) -> Self {
        Self {
            format,
            width: None,
            height: None,
            physical_camera: None,
            use_case: None,
            grid_width: None,
            grid_height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_physical_camera(mut self, id: impl Into<String>) -> Self {
        self.physical_camera = Some(id.into());
        self
    }

    pub fn with_use_case(mut self, use_case: i64) -> Self {
        self.use_case = Some(use_case);
        self
    }

    pub fn with_stats_grid(mut self, grid_width: u32, grid_height: u32) -> Self {
        self.grid_width = Some(grid_width);
        self.grid_height = Some(grid_height);
        self
    }
}

/// Intermediate format for reprocessed captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReprocessFormat {
    #[serde(rename = "yuv")]
    Yuv,
    #[serde(rename = "private")]
    Private,
}

/// Weighted metering regions for the 3A loop, each flattened as
/// `[x, y, w, h, weight]` quintuples in normalized coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeteringRegions {
    pub ae: Vec<f64>,
    pub awb: Vec<f64>,
    pub af: Vec<f64>,
}

/// Which of the 3A routines are actively triggered (AWB always runs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Triggers {
    pub ae: bool,
    pub af: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmdName", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    Open { camera_id: String },
    Close,
    GetCameraIds,
    GetCameraProperties,
    #[serde(rename_all = "camelCase")]
    GetCameraPropertiesById { camera_id: String },
    #[serde(rename_all = "camelCase")]
    GetCameraSessionProperties {
        output_surfaces: Vec<OutputSurfaceSpec>,
        capture_request: CaptureRequest,
    },
    #[serde(rename_all = "camelCase")]
    DoCapture {
        capture_requests: Vec<CaptureRequest>,
        repeat_requests: Vec<CaptureRequest>,
        output_surfaces: Vec<OutputSurfaceSpec>,
        reuse_session: bool,
        #[serde(rename = "firstSurfaceFor3A")]
        first_surface_for_3a: bool,
    },
    #[serde(rename_all = "camelCase")]
    DoReprocessCapture {
        capture_requests: Vec<CaptureRequest>,
        repeat_requests: Vec<CaptureRequest>,
        output_surfaces: Vec<OutputSurfaceSpec>,
        reprocess_format: ReprocessFormat,
        reuse_session: bool,
        #[serde(rename = "firstSurfaceFor3A")]
        first_surface_for_3a: bool,
    },
    #[serde(rename = "do3A", rename_all = "camelCase")]
    Do3A {
        regions: MeteringRegions,
        triggers: Triggers,
        #[serde(skip_serializing_if = "Option::is_none")]
        ae_lock: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        awb_lock: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ev_comp: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        flash_mode: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        auto_flash: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        physical_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        zoom_ratio: Option<f64>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        output_surfaces: Vec<OutputSurfaceSpec>,
        repeat_requests: Vec<CaptureRequest>,
        reuse_session: bool,
        #[serde(rename = "firstSurfaceFor3A")]
        first_surface_for_3a: bool,
    },
    #[serde(rename_all = "camelCase")]
    IsStreamCombinationSupported {
        camera_id: String,
        output_surfaces: Vec<OutputSurfaceSpec>,
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<CaptureRequest>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_carries_discriminator() {
        let cmd = Command::Open {
            camera_id: "1".into(),
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"cmdName": "open", "cameraId": "1"})
        );
    }

    #[test]
    fn unit_variants_serialize_bare() {
        assert_eq!(
            serde_json::to_value(Command::Close).unwrap(),
            json!({"cmdName": "close"})
        );
        assert_eq!(
            serde_json::to_value(Command::GetCameraIds).unwrap(),
            json!({"cmdName": "getCameraIds"})
        );
    }

    #[test]
    fn surface_spec_omits_absent_fields() {
        let spec = OutputSurfaceSpec::new(SurfaceFormat::Raw);
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!({"format": "raw"}));

        let spec = OutputSurfaceSpec::new(SurfaceFormat::Yuv)
            .with_size(640, 480)
            .with_physical_camera("2");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"format": "yuv", "width": 640, "height": 480, "physicalCamera": "2"})
        );
    }

    #[test]
    fn do_capture_field_names() {
        let cmd = Command::DoCapture {
            capture_requests: vec![CaptureRequest::new()],
            repeat_requests: vec![],
            output_surfaces: vec![OutputSurfaceSpec::new(SurfaceFormat::Jpeg)],
            reuse_session: false,
            first_surface_for_3a: false,
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["cmdName"], "doCapture");
        assert!(value.get("captureRequests").is_some());
        assert!(value.get("repeatRequests").is_some());
        assert!(value.get("outputSurfaces").is_some());
        assert_eq!(value["firstSurfaceFor3A"], false);
    }

    #[test]
    fn do_3a_tag_and_options() {
        let cmd = Command::Do3A {
            regions: MeteringRegions {
                ae: vec![0.0, 0.0, 1.0, 1.0, 1.0],
                awb: vec![0.0, 0.0, 1.0, 1.0, 1.0],
                af: vec![0.0, 0.0, 1.0, 1.0, 1.0],
            },
            triggers: Triggers { ae: true, af: true },
            ae_lock: None,
            awb_lock: Some(true),
            ev_comp: None,
            flash_mode: None,
            auto_flash: None,
            physical_id: None,
            zoom_ratio: None,
            output_surfaces: vec![],
            repeat_requests: vec![],
            reuse_session: false,
            first_surface_for_3a: false,
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["cmdName"], "do3A");
        assert_eq!(value["awbLock"], true);
        assert!(value.get("aeLock").is_none());
        assert!(value.get("outputSurfaces").is_none());
        assert_eq!(value["triggers"]["af"], true);
    }

    #[test]
    fn reprocess_format_names() {
        assert_eq!(serde_json::to_value(ReprocessFormat::Yuv).unwrap(), "yuv");
        assert_eq!(
            serde_json::to_value(ReprocessFormat::Private).unwrap(),
            "private"
        );
    }
}
