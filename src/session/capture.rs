//! Capture response demultiplexing.
//!
//! A multi-format, multi-camera, multi-frame capture answers with an
//! unordered interleaving of tagged image buffer frames plus one capture
//! result frame per requested frame. The multiplexer routes each buffer by
//! its tag's format, the physical camera suffix, and, for YUV only, the
//! payload byte size, and reassembles per-surface frame-ordered outputs.
//! Buffers are assumed to arrive capture-order within one route even though
//! routes interleave arbitrarily on the wire.

use std::collections::{HashMap, VecDeque};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::properties::CaptureMetadata;
use crate::session::command::OutputSurfaceSpec;
use crate::session::error::{ConfigError, ProtocolError, Result};
use crate::session::format::SurfaceFormat;
use crate::session::transport::Transport;
use crate::session::wire::ResponseFrame;

/// One delivered output: a buffer with the metadata of its frame.
#[derive(Debug, Clone)]
pub struct Capture {
    pub format: SurfaceFormat,
    pub width: u32,
    pub height: u32,
    pub metadata: CaptureMetadata,
    pub data: Vec<u8>,
}

/// A surface bound to its owning camera and, for YUV, its byte size.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSurface {
    pub spec: OutputSurfaceSpec,
    pub camera_id: String,
    pub yuv_bytes: Option<usize>,
}

/// Reject surface combinations the response stream cannot disambiguate.
///
/// These are configuration errors and must never reach the device.
pub(crate) fn validate_surfaces(surfaces: &[ResolvedSurface]) -> Result<()> {
    let raw_outputs = surfaces
        .iter()
        .filter(|s| s.spec.format.is_raw_family())
        .count();
    if raw_outputs > 1 {
        return Err(ConfigError::ConflictingRawFormats.into());
    }

    let mut seen_formats = HashMap::new();
    let mut seen_yuv_sizes = HashMap::new();
    for surface in surfaces {
        if surface.spec.format == SurfaceFormat::Yuv {
            let bytes = surface.yuv_bytes.unwrap_or(0);
            if seen_yuv_sizes
                .insert((surface.camera_id.clone(), bytes), ())
                .is_some()
            {
                return Err(ConfigError::AmbiguousYuvSize {
                    bytes,
                    camera: surface.camera_id.clone(),
                }
                .into());
            }
        } else if seen_formats
            .insert((surface.camera_id.clone(), surface.spec.format), ())
            .is_some()
        {
            return Err(ConfigError::DuplicateFormat {
                format: surface.spec.format.to_string(),
                camera: surface.camera_id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Declared geometry of one output in a capture result frame.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OutputDescriptor {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Parsed `captureResults` frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CaptureResultFrame {
    pub capture_result: Value,
    #[serde(default)]
    pub physical_results: Vec<HashMap<String, Value>>,
    pub outputs: Vec<OutputDescriptor>,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct RouteKey {
    camera: String,
    format: SurfaceFormat,
    yuv_bytes: Option<usize>,
}

impl RouteKey {
    fn for_surface(surface: &ResolvedSurface) -> Self {
        Self {
            camera: surface.camera_id.clone(),
            format: surface.spec.format,
            yuv_bytes: surface.yuv_bytes,
        }
    }
}

/// Working state of one in-flight capture.
pub(crate) struct PendingCapture {
    ncap: usize,
    surfaces: Vec<ResolvedSurface>,
    /// Tag suffix-less buffers belong to this camera.
    default_camera: String,
    routes: HashMap<RouteKey, VecDeque<Vec<u8>>>,
    results: Vec<CaptureResultFrame>,
    nbufs: usize,
}

impl PendingCapture {
    pub fn new(ncap: usize, surfaces: Vec<ResolvedSurface>, default_camera: String) -> Self {
        let routes = surfaces
            .iter()
            .map(|s| (RouteKey::for_surface(s), VecDeque::with_capacity(ncap)))
            .collect();
        Self {
            ncap,
            surfaces,
            default_camera,
            routes,
            results: Vec::with_capacity(ncap),
            nbufs: 0,
        }
    }

    fn expected_buffers(&self) -> usize {
        self.ncap * self.surfaces.len()
    }

    fn complete(&self) -> bool {
        self.nbufs >= self.expected_buffers() && self.results.len() >= self.ncap
    }

    /// Drain frames from the transport until all expected image buffers and
    /// capture results have arrived, then assemble per-surface outputs in
    /// requested order.
    pub fn collect<T: Transport>(mut self, transport: &mut T) -> Result<Vec<Vec<Capture>>> {
        debug!(
            frames = self.ncap,
            surfaces = self.surfaces.len(),
            "waiting for capture responses"
        );
        while !self.complete() {
            let frame = transport.recv_frame()?;
            self.accept(frame)?;
        }
        self.finish()
    }

    /// Route one response frame into the pending state.
    pub fn accept(&mut self, frame: ResponseFrame) -> Result<()> {
        let tag = frame.tag().to_owned();
        if tag == "captureResults" {
            let parsed: CaptureResultFrame = serde_json::from_value(frame.obj_value()?.clone())
                .map_err(ProtocolError::MalformedFrame)?;
            self.results.push(parsed);
            return Ok(());
        }

        let Some((format, physical)) = SurfaceFormat::from_image_tag(&tag) else {
            return Err(ProtocolError::UnexpectedTag {
                expected: "an image buffer or captureResults".into(),
                actual: tag,
            }
            .into());
        };
        let payload = frame.payload()?;
        let camera = physical.unwrap_or(&self.default_camera).to_owned();
        let key = RouteKey {
            camera,
            format,
            yuv_bytes: (format == SurfaceFormat::Yuv).then_some(payload.len()),
        };
        let Some(queue) = self.routes.get_mut(&key) else {
            return Err(ProtocolError::UnroutableBuffer { tag }.into());
        };
        if queue.len() >= self.ncap {
            return Err(ProtocolError::ExcessBuffers {
                tag,
                expected: self.ncap,
            }
            .into());
        }
        // Private buffers are opaque to clients; count them but drop the bytes.
        if format == SurfaceFormat::Priv {
            queue.push_back(Vec::new());
        } else {
            queue.push_back(payload.to_vec());
        }
        self.nbufs += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Vec<Capture>>> {
        let first = self
            .results
            .first()
            .ok_or(ProtocolError::MissingField {
                tag: "captureResults".into(),
                field: "outputs",
            })?
            .clone();

        // The device echoes outputs in requested-surface order; a silent
        // size reinterpretation is a hard error.
        for (index, surface) in self.surfaces.iter().enumerate() {
            let output = first.outputs.get(index).ok_or(ProtocolError::MissingField {
                tag: "captureResults".into(),
                field: "outputs",
            })?;
            if let (Some(w), Some(h)) = (surface.spec.width, surface.spec.height) {
                if w != output.width || h != output.height {
                    return Err(ProtocolError::SizeMismatch {
                        index,
                        format: output.format.clone(),
                        requested_width: w,
                        requested_height: h,
                        actual_width: output.width,
                        actual_height: output.height,
                    }
                    .into());
                }
            }
        }

        let mut per_surface = Vec::with_capacity(self.surfaces.len());
        for (index, surface) in self.surfaces.iter().enumerate() {
            let key = RouteKey::for_surface(surface);
            let queue = self.routes.get_mut(&key).ok_or_else(|| {
                ProtocolError::BufferAccounting {
                    tag: surface.spec.format.image_tag(),
                }
            })?;
            let output = &first.outputs[index];

            let mut captures = Vec::with_capacity(self.ncap);
            for result in self.results.iter().take(self.ncap) {
                let metadata = metadata_for_camera(result, &surface.camera_id, &self.default_camera)?;
                let data = queue.pop_front().ok_or_else(|| {
                    ProtocolError::BufferAccounting {
                        tag: surface.spec.format.image_tag(),
                    }
                })?;
                captures.push(Capture {
                    format: surface.spec.format,
                    width: output.width,
                    height: output.height,
                    metadata,
                    data,
                });
            }
            per_surface.push(captures);
        }
        Ok(per_surface)
    }
}

/// Pick the metadata slice belonging to a surface's camera: the top-level
/// result for the session's default camera, else the matching physical
/// sub-result.
fn metadata_for_camera(
    result: &CaptureResultFrame,
    camera_id: &str,
    default_camera: &str,
) -> Result<CaptureMetadata> {
    if camera_id == default_camera {
        return Ok(CaptureMetadata::from(result.capture_result.clone()));
    }
    for sub in &result.physical_results {
        if let Some(value) = sub.get(camera_id) {
            return Ok(CaptureMetadata::from(value.clone()));
        }
    }
    Err(ProtocolError::MissingField {
        tag: "captureResults".into(),
        field: "physicalResults",
    }
    .into())
}
