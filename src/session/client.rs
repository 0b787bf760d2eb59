//! The capture session client: one logical device operation per method.
//!
//! A session owns exactly one transport and issues request/response
//! exchanges synchronously; there is no command pipelining. Simple commands
//! expect a single tagged response; capture commands hand the response
//! stream to the capture multiplexer; the 3A command loops over partial
//! result frames until the terminal marker.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::properties::CameraProperties;
use crate::session::capture::{Capture, PendingCapture, ResolvedSurface, validate_surfaces};
use crate::session::command::{
    CaptureRequest, Command, MeteringRegions, OutputSurfaceSpec, ReprocessFormat, Triggers,
};
use crate::session::error::{ConfigError, ProtocolError, Result};
use crate::session::format::SurfaceFormat;
use crate::session::forward::{AdbForwarder, allocate_local_port};
use crate::session::state::SessionState;
use crate::session::transport::{TcpTransport, Transport, TransportConfig};
use crate::session::wire::{ResponseFrame, encode_command};

const NANOS_PER_SEC: f64 = 1e9;

/// A full-frame weighted metering region.
pub const FULL_FRAME_REGION: [f64; 5] = [0.0, 0.0, 1.0, 1.0, 1.0];

/// Optional behaviors of a capture exchange.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Capture through an intermediate buffer of this format and reprocess.
    pub reprocess_format: Option<ReprocessFormat>,
    /// Warm-up requests run in the background before the capture.
    pub repeat_requests: Vec<CaptureRequest>,
    /// Ask the service to keep using the existing capture session.
    pub reuse_session: bool,
    /// The first surface only feeds 3A and returns no buffers.
    pub first_surface_for_3a: bool,
}

/// Parameters of a 3A convergence cycle.
#[derive(Debug, Clone)]
pub struct ThreeARequest {
    pub regions_ae: Vec<[f64; 5]>,
    pub regions_awb: Vec<[f64; 5]>,
    pub regions_af: Vec<[f64; 5]>,
    /// Trigger AF and wait for it.
    pub do_af: bool,
    /// Wait for AWB convergence (AWB itself always runs).
    pub do_awb: bool,
    pub lock_ae: bool,
    pub lock_awb: bool,
    pub ev_comp: i64,
    pub flash_mode: i64,
    pub auto_flash: bool,
    /// Monochrome cameras report no AWB gains.
    pub mono_camera: bool,
    pub zoom_ratio: Option<f64>,
    pub output_surfaces: Vec<OutputSurfaceSpec>,
    pub repeat_requests: Vec<CaptureRequest>,
    pub first_surface_for_3a: bool,
}

impl Default for ThreeARequest {
    fn default() -> Self {
        Self {
            regions_ae: vec![FULL_FRAME_REGION],
            regions_awb: vec![FULL_FRAME_REGION],
            regions_af: vec![FULL_FRAME_REGION],
            do_af: true,
            do_awb: true,
            lock_ae: false,
            lock_awb: false,
            ev_comp: 0,
            flash_mode: 0,
            auto_flash: false,
            mono_camera: false,
            zoom_ratio: None,
            output_surfaces: Vec::new(),
            repeat_requests: Vec::new(),
            first_surface_for_3a: false,
        }
    }
}

/// Converged 3A values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreeAResult {
    pub ae_sensitivity: Option<i64>,
    pub ae_exposure_ns: Option<i64>,
    pub awb_gains: Option<[f64; 4]>,
    pub awb_transform: Option<[f64; 9]>,
    pub af_focus_distance: Option<f64>,
}

/// Host-side session with one camera on one device.
pub struct CameraSession<T: Transport> {
    transport: T,
    config: TransportConfig,
    camera_id: String,
    hidden_physical_id: Option<String>,
    state: SessionState,
}

impl CameraSession<TcpTransport> {
    /// Negotiate a forwarded port for the device and connect to it.
    pub fn connect(
        device_serial: &str,
        camera_id: &str,
        hidden_physical_id: Option<String>,
        config: TransportConfig,
    ) -> Result<Self> {
        let forwarder = AdbForwarder::new(device_serial);
        let port = allocate_local_port(&forwarder, device_serial, &config)?;
        info!(port, camera_id, "opening capture session");
        let transport = TcpTransport::connect(port, &config)?;
        Ok(Self::with_transport(
            transport,
            camera_id,
            hidden_physical_id,
            config,
        ))
    }
}

impl<T: Transport> CameraSession<T> {
    /// Build a session over an already established transport.
    pub fn with_transport(
        transport: T,
        camera_id: &str,
        hidden_physical_id: Option<String>,
        config: TransportConfig,
    ) -> Self {
        Self {
            transport,
            config,
            camera_id: camera_id.to_owned(),
            hidden_physical_id,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The underlying transport, for inspection.
    pub fn transport_ref(&self) -> &T {
        &self.transport
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// The camera owning buffers that arrive without a physical suffix.
    fn default_camera(&self) -> &str {
        self.hidden_physical_id.as_deref().unwrap_or(&self.camera_id)
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        let frame = encode_command(command)?;
        self.transport.send_frame(&frame)
    }

    fn expect(&mut self, expected: &str) -> Result<ResponseFrame> {
        let frame = self.transport.recv_frame()?;
        if frame.tag() != expected {
            return Err(ProtocolError::UnexpectedTag {
                expected: expected.to_owned(),
                actual: frame.tag().to_owned(),
            }
            .into());
        }
        Ok(frame)
    }

    pub fn open_camera(&mut self) -> Result<()> {
        debug!(camera_id = %self.camera_id, "opening camera");
        self.send(&Command::Open {
            camera_id: self.camera_id.clone(),
        })?;
        self.expect("cameraOpened")?;
        Ok(())
    }

    pub fn close_camera(&mut self) -> Result<()> {
        self.send(&Command::Close)?;
        self.expect("cameraClosed")?;
        Ok(())
    }

    /// All camera ids present on the device.
    pub fn camera_ids(&mut self) -> Result<Vec<String>> {
        self.send(&Command::GetCameraIds)?;
        self.transport
            .set_timeout(self.config.base_timeout + self.config.extra_timeout)?;
        let frame = self.expect("cameraIds");
        self.transport.set_timeout(self.config.base_timeout)?;
        let frame = frame?;
        let ids = frame
            .obj_value()?
            .get("cameraIdArray")
            .and_then(Value::as_array)
            .ok_or(ProtocolError::MissingField {
                tag: "cameraIds".into(),
                field: "cameraIdArray",
            })?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect();
        Ok(ids)
    }

    fn read_properties_response(&mut self) -> Result<CameraProperties> {
        let frame = self.expect("cameraProperties")?;
        let props = frame
            .obj_value()?
            .get("cameraProperties")
            .cloned()
            .ok_or(ProtocolError::MissingField {
                tag: "cameraProperties".into(),
                field: "cameraProperties",
            })?;
        Ok(CameraProperties::from(props))
    }

    /// Fetch and cache the characteristics of the session's camera.
    pub fn camera_properties(&mut self) -> Result<CameraProperties> {
        self.send(&Command::GetCameraProperties)?;
        let props = self.read_properties_response()?;
        self.state.set_properties(props.clone());
        Ok(props)
    }

    /// Characteristics of an arbitrary camera; nothing is cached.
    pub fn camera_properties_by_id(&mut self, camera_id: &str) -> Result<CameraProperties> {
        self.send(&Command::GetCameraPropertiesById {
            camera_id: camera_id.to_owned(),
        })?;
        self.read_properties_response()
    }

    /// Characteristics as configured for a specific session layout.
    pub fn session_properties(
        &mut self,
        output_surfaces: &[OutputSurfaceSpec],
        capture_request: &CaptureRequest,
    ) -> Result<CameraProperties> {
        self.send(&Command::GetCameraSessionProperties {
            output_surfaces: output_surfaces.to_vec(),
            capture_request: capture_request.clone(),
        })?;
        let props = self.read_properties_response()?;
        self.state.set_properties(props.clone());
        Ok(props)
    }

    /// For a hidden physical sub-camera session, verify the linkage and
    /// switch the cached characteristics to the sub-camera's.
    pub fn override_with_hidden_physical_camera_props(&mut self) -> Result<CameraProperties> {
        let Some(physical) = self.hidden_physical_id.clone() else {
            return Ok(self.state.properties()?.clone());
        };
        let props = self.state.properties()?;
        if !props.is_logical_multi_camera() {
            debug!(%physical, "not a logical multi-camera, keeping properties");
            return Ok(props.clone());
        }
        if !props.physical_ids().iter().any(|id| id == &physical) {
            return Err(ConfigError::InvalidSubCamera {
                physical,
                logical: self.camera_id.clone(),
            }
            .into());
        }
        debug!(%physical, "switching to hidden sub-camera properties");
        let sub_props = self.camera_properties_by_id(&physical)?;
        self.state.set_properties(sub_props.clone());
        Ok(sub_props)
    }

    /// Query whether a stream combination is supported by the device.
    pub fn is_stream_combination_supported(
        &mut self,
        output_surfaces: &[OutputSurfaceSpec],
        settings: Option<CaptureRequest>,
    ) -> Result<bool> {
        let surfaces = self.attach_hidden_camera(output_surfaces);
        self.send(&Command::IsStreamCombinationSupported {
            camera_id: self.camera_id.clone(),
            output_surfaces: surfaces,
            settings,
        })?;
        let frame = self.expect("streamCombinationSupport")?;
        Ok(frame.str_value()? == "supportedCombination")
    }

    /// Run a 3A convergence cycle, reading partial results until the
    /// terminal marker.
    pub fn do_3a(&mut self, request: &ThreeARequest) -> Result<ThreeAResult> {
        if let Some(ratio) = request.zoom_ratio {
            let in_range = self
                .state
                .properties()
                .ok()
                .and_then(CameraProperties::zoom_ratio_range)
                .is_none_or(|(lo, hi)| ratio >= lo && ratio <= hi);
            if !in_range {
                return Err(ConfigError::ZoomRatioOutOfRange(ratio).into());
            }
        }

        let flatten = |regions: &[[f64; 5]]| regions.concat();
        let command = Command::Do3A {
            regions: MeteringRegions {
                ae: flatten(&request.regions_ae),
                awb: flatten(&request.regions_awb),
                af: flatten(&request.regions_af),
            },
            triggers: Triggers {
                ae: true,
                af: request.do_af,
            },
            ae_lock: request.lock_ae.then_some(true),
            awb_lock: request.lock_awb.then_some(true),
            ev_comp: (request.ev_comp != 0).then_some(request.ev_comp),
            flash_mode: (request.flash_mode != 0).then_some(request.flash_mode),
            auto_flash: request.auto_flash.then_some(true),
            physical_id: self.hidden_physical_id.clone(),
            zoom_ratio: request.zoom_ratio,
            output_surfaces: request.output_surfaces.clone(),
            repeat_requests: request.repeat_requests.clone(),
            reuse_session: !request.output_surfaces.is_empty(),
            first_surface_for_3a: request.first_surface_for_3a,
        };
        debug!("running 3A convergence on device");
        self.send(&command)?;

        let mut result = ThreeAResult::default();
        let mut converged = false;
        loop {
            let frame = self.transport.recv_frame()?;
            match frame.tag() {
                "aeResult" => {
                    let values = parse_values::<i64>(&frame)?;
                    if let [sensitivity, exposure] = values[..] {
                        result.ae_sensitivity = Some(sensitivity);
                        result.ae_exposure_ns = Some(exposure);
                    }
                }
                "afResult" => {
                    let values = parse_values::<f64>(&frame)?;
                    if let [distance] = values[..] {
                        result.af_focus_distance = Some(distance);
                    }
                }
                "awbResult" => {
                    let values = parse_values::<f64>(&frame)?;
                    if values.len() >= 13 {
                        let mut gains = [0.0; 4];
                        gains.copy_from_slice(&values[..4]);
                        let mut transform = [0.0; 9];
                        transform.copy_from_slice(&values[4..13]);
                        result.awb_gains = Some(gains);
                        result.awb_transform = Some(transform);
                    }
                }
                "3aConverged" => converged = true,
                "3aDone" => break,
                other => {
                    return Err(ProtocolError::UnexpectedTag {
                        expected: "a 3A result".into(),
                        actual: other.to_owned(),
                    }
                    .into());
                }
            }
        }

        if !converged {
            return Err(ProtocolError::ConvergenceFailed(
                "device never signaled convergence".into(),
            )
            .into());
        }
        if result.ae_sensitivity.is_none() {
            return Err(ProtocolError::ConvergenceFailed("AE result missing".into()).into());
        }
        if request.do_awb && !request.mono_camera && result.awb_gains.is_none() {
            return Err(ProtocolError::ConvergenceFailed("AWB result missing".into()).into());
        }
        if request.do_af && result.af_focus_distance.is_none() {
            return Err(ProtocolError::ConvergenceFailed("AF result missing".into()).into());
        }
        info!(
            sensitivity = ?result.ae_sensitivity,
            exposure_ns = ?result.ae_exposure_ns,
            "3A converged"
        );
        Ok(result)
    }

    /// Issue a capture and demultiplex its responses.
    ///
    /// Returns one list of `ncap` captures per requested surface, in
    /// requested-surface order.
    pub fn do_capture(
        &mut self,
        requests: &[CaptureRequest],
        output_surfaces: &[OutputSurfaceSpec],
        options: &CaptureOptions,
    ) -> Result<Vec<Vec<Capture>>> {
        if options.reprocess_format.is_some() && !options.repeat_requests.is_empty() {
            return Err(ConfigError::UnsupportedCombination(
                "repeating requests cannot be combined with reprocessing",
            )
            .into());
        }

        let surfaces = if output_surfaces.is_empty() {
            vec![self.default_yuv_surface()?]
        } else {
            self.attach_hidden_camera(output_surfaces)
        };

        // A 3A-only first surface returns no buffers and is not accounted.
        let mut accounted: Vec<OutputSurfaceSpec> = surfaces.clone();
        if options.first_surface_for_3a && !accounted.is_empty() {
            accounted.remove(0);
        }
        let resolved = self.resolve_surfaces(&accounted)?;
        validate_surfaces(&resolved)?;

        let command = self.build_capture_command(requests, &surfaces, options);
        let ncap = requests.len().max(1);
        info!(
            frames = ncap,
            surfaces = accounted.len(),
            "issuing capture request"
        );

        let extended = self.capture_timeout(requests, options);
        self.transport.set_timeout(extended)?;
        self.send(&command)?;
        let pending = PendingCapture::new(ncap, resolved, self.default_camera().to_owned());
        let outputs = pending.collect(&mut self.transport)?;
        self.transport.set_timeout(self.config.base_timeout)?;
        Ok(outputs)
    }

    /// Convenience wrapper for one frame on one surface.
    pub fn do_single_capture(
        &mut self,
        request: &CaptureRequest,
        surface: &OutputSurfaceSpec,
    ) -> Result<Capture> {
        let mut outputs = self.do_capture(
            std::slice::from_ref(request),
            std::slice::from_ref(surface),
            &CaptureOptions::default(),
        )?;
        let mut first_surface = outputs.swap_remove(0);
        Ok(first_surface.swap_remove(0))
    }

    fn build_capture_command(
        &self,
        requests: &[CaptureRequest],
        surfaces: &[OutputSurfaceSpec],
        options: &CaptureOptions,
    ) -> Command {
        let capture_requests = if requests.is_empty() {
            vec![CaptureRequest::new()]
        } else {
            requests.to_vec()
        };
        match options.reprocess_format {
            Some(format) => Command::DoReprocessCapture {
                capture_requests,
                repeat_requests: options.repeat_requests.clone(),
                output_surfaces: surfaces.to_vec(),
                reprocess_format: format,
                reuse_session: options.reuse_session,
                first_surface_for_3a: options.first_surface_for_3a,
            },
            None => Command::DoCapture {
                capture_requests,
                repeat_requests: options.repeat_requests.clone(),
                output_surfaces: surfaces.to_vec(),
                reuse_session: options.reuse_session,
                first_surface_for_3a: options.first_surface_for_3a,
            },
        }
    }

    /// Timeout for a capture: the base plus the longest declared exposure,
    /// plus warm-up slack when repeat requests ride along.
    fn capture_timeout(&self, requests: &[CaptureRequest], options: &CaptureOptions) -> Duration {
        let longest_exposure_ns = requests
            .iter()
            .filter_map(|r| r.get("android.sensor.exposureTime"))
            .filter_map(Value::as_i64)
            .max()
            .unwrap_or(0)
            .max(0);
        let mut timeout = self.config.base_timeout
            + Duration::from_secs_f64(longest_exposure_ns as f64 / NANOS_PER_SEC);
        if !options.repeat_requests.is_empty() {
            timeout += self.config.extra_timeout;
        }
        timeout
    }

    /// Hidden sub-camera sessions direct every surface at the sub-camera.
    fn attach_hidden_camera(&self, surfaces: &[OutputSurfaceSpec]) -> Vec<OutputSurfaceSpec> {
        let Some(physical) = &self.hidden_physical_id else {
            return surfaces.to_vec();
        };
        surfaces
            .iter()
            .cloned()
            .map(|mut s| {
                s.physical_camera = Some(physical.clone());
                s
            })
            .collect()
    }

    /// The implicit surface when none is given: a full-size YUV frame.
    fn default_yuv_surface(&self) -> Result<OutputSurfaceSpec> {
        let props = self.state.properties()?;
        let size = props
            .max_output_size("yuv")
            .ok_or(ConfigError::MissingProperties)?;
        let mut spec = OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(size.width, size.height);
        spec.physical_camera = self.hidden_physical_id.clone();
        Ok(spec)
    }

    fn resolve_surfaces(&self, surfaces: &[OutputSurfaceSpec]) -> Result<Vec<ResolvedSurface>> {
        surfaces
            .iter()
            .map(|spec| {
                let camera_id = spec
                    .physical_camera
                    .clone()
                    .unwrap_or_else(|| self.camera_id.clone());
                let yuv_bytes = if spec.format == SurfaceFormat::Yuv {
                    Some(self.yuv_buffer_bytes(spec)?)
                } else {
                    None
                };
                Ok(ResolvedSurface {
                    spec: spec.clone(),
                    camera_id,
                    yuv_bytes,
                })
            })
            .collect()
    }

    /// YUV420 buffers hold 1.5 bytes per pixel; an unsized surface defaults
    /// to the largest available YUV output.
    fn yuv_buffer_bytes(&self, spec: &OutputSurfaceSpec) -> Result<usize> {
        let (width, height) = match (spec.width, spec.height) {
            (Some(w), Some(h)) => (w as usize, h as usize),
            _ => {
                let props = self.state.properties()?;
                let size = props
                    .max_output_size("yuv")
                    .ok_or(ConfigError::MissingProperties)?;
                (size.width as usize, size.height as usize)
            }
        };
        Ok(width * height * 3 / 2)
    }
}

fn parse_values<V: std::str::FromStr>(frame: &ResponseFrame) -> Result<Vec<V>> {
    let text = frame.str_value()?;
    text.split_whitespace()
        .map(|token| {
            token.parse::<V>().map_err(|_| {
                ProtocolError::MalformedValues {
                    tag: frame.tag().to_owned(),
                    values: text.to_owned(),
                }
                .into()
            })
        })
        .collect()
}
