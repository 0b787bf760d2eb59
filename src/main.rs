use camlink_rs::image_pipeline::{
    ImageWriter, StandardTiffWriter, WriterConfig, capture_to_raw16, capture_to_rgb,
};
use camlink_rs::logger;
use camlink_rs::session::{
    CameraSession, CaptureOptions, CaptureRequest, OutputSurfaceSpec, SurfaceFormat,
    ThreeARequest, TransportConfig,
};

use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    logger::init();

    let mut args = std::env::args().skip(1);
    let serial = args.next().unwrap_or_else(|| "default".to_owned());
    let camera_id = args.next().unwrap_or_else(|| "0".to_owned());

    info!(%serial, %camera_id, "starting capture session");
    let mut cam = CameraSession::connect(&serial, &camera_id, None, TransportConfig::default())?;
    cam.open_camera()?;

    let props = cam.camera_properties()?;
    info!(
        white_level = ?props.white_level(),
        cfa = ?props.color_filter_arrangement(),
        "camera characteristics fetched"
    );

    let three_a = cam.do_3a(&ThreeARequest::default())?;
    info!(?three_a, "3A converged");

    let mut request = CaptureRequest::new();
    if let (Some(sensitivity), Some(exposure)) = (three_a.ae_sensitivity, three_a.ae_exposure_ns) {
        request.insert("android.sensor.sensitivity".into(), sensitivity.into());
        request.insert("android.sensor.exposureTime".into(), exposure.into());
    }

    let surfaces = [
        OutputSurfaceSpec::new(SurfaceFormat::Raw),
        OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(640, 480),
    ];
    let outputs = cam.do_capture(&[request], &surfaces, &CaptureOptions::default())?;

    let writer = StandardTiffWriter;
    let config = WriterConfig::default();
    let raw_capture = &outputs[0][0];
    match capture_to_raw16(raw_capture) {
        Ok(raw) => {
            let mut file = std::fs::File::create("raw.tiff")?;
            writer.write_raw(&raw, &mut file, &config)?;
            info!(width = raw.width, height = raw.height, "wrote raw.tiff");
        }
        Err(e) => error!("raw decode failed: {e}"),
    }
    match capture_to_rgb(raw_capture, &props, true) {
        Ok(rgb) => {
            let mut file = std::fs::File::create("rgb.tiff")?;
            writer.write_rgb(&rgb, &mut file, &config)?;
            info!(width = rgb.width, height = rgb.height, "wrote rgb.tiff");
        }
        Err(e) => error!("RGB conversion failed: {e}"),
    }

    cam.close_camera()?;
    Ok(())
}
