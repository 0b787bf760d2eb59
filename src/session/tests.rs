#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use serde_json::{Value, json};

    use crate::session::client::{CameraSession, CaptureOptions, ThreeARequest};
    use crate::session::command::{CaptureRequest, OutputSurfaceSpec};
    use crate::session::error::{
        ConfigError, ProtocolError, Result, SessionError, TransportError,
    };
    use crate::session::format::SurfaceFormat;
    use crate::session::transport::{Transport, TransportConfig};
    use crate::session::wire::{ResponseFrame, ResponseHeader};

    struct MockTransport {
        script: VecDeque<ResponseFrame>,
        sent: Vec<Vec<u8>>,
        timeout: Duration,
        timeouts_set: Vec<Duration>,
    }

    impl MockTransport {
        fn new(script: Vec<ResponseFrame>) -> Self {
            Self {
                script: script.into(),
                sent: Vec::new(),
                timeout: Duration::from_secs(20),
                timeouts_set: Vec::new(),
            }
        }

        fn sent_commands(&self) -> Vec<Value> {
            self.sent
                .iter()
                .map(|frame| serde_json::from_slice(&frame[..frame.len() - 1]).unwrap())
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
            self.sent.push(frame.to_vec());
            Ok(())
        }

        fn recv_frame(&mut self) -> Result<ResponseFrame> {
            self.script
                .pop_front()
                .ok_or_else(|| TransportError::Timeout.into())
        }

        fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.timeout = timeout;
            self.timeouts_set.push(timeout);
            Ok(())
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }
    }

    fn header(tag: &str) -> ResponseHeader {
        ResponseHeader {
            tag: tag.to_owned(),
            buf_value_size: None,
            str_value: None,
            obj_value: None,
        }
    }

    fn image_frame(tag: &str, payload: Vec<u8>) -> ResponseFrame {
        let mut h = header(tag);
        h.buf_value_size = Some(payload.len());
        ResponseFrame {
            header: h,
            payload: Some(payload),
        }
    }

    fn text_frame(tag: &str, value: &str) -> ResponseFrame {
        let mut h = header(tag);
        h.str_value = Some(value.to_owned());
        ResponseFrame {
            header: h,
            payload: None,
        }
    }

    fn obj_frame(tag: &str, value: Value) -> ResponseFrame {
        let mut h = header(tag);
        h.obj_value = Some(value);
        ResponseFrame {
            header: h,
            payload: None,
        }
    }

    fn results_frame(outputs: Value, metadata: Value, physical: Value) -> ResponseFrame {
        obj_frame(
            "captureResults",
            json!({
                "captureResult": metadata,
                "physicalResults": physical,
                "outputs": outputs,
            }),
        )
    }

    fn session(script: Vec<ResponseFrame>) -> CameraSession<MockTransport> {
        CameraSession::with_transport(
            MockTransport::new(script),
            "0",
            None,
            TransportConfig::default(),
        )
    }

    fn yuv_payload(seq: u8) -> Vec<u8> {
        vec![seq; 12] // 4x2 YUV420
    }

    fn two_surface_outputs() -> Value {
        json!([
            {"format": "yuv", "width": 4, "height": 2},
            {"format": "raw", "width": 8, "height": 6},
        ])
    }

    #[test]
    fn burst_with_two_surfaces_reassembles_in_order() {
        // 3 frames x (yuv + raw), image buffers and results interleaved
        // out of order across formats but FIFO within each format.
        let outputs = two_surface_outputs();
        let script = vec![
            image_frame("rawImage", vec![1; 10]),
            image_frame("yuvImage", yuv_payload(1)),
            results_frame(outputs.clone(), json!({"frame": 0}), json!([])),
            image_frame("yuvImage", yuv_payload(2)),
            image_frame("rawImage", vec![2; 10]),
            image_frame("rawImage", vec![3; 10]),
            results_frame(outputs.clone(), json!({"frame": 1}), json!([])),
            image_frame("yuvImage", yuv_payload(3)),
            results_frame(outputs, json!({"frame": 2}), json!([])),
        ];
        let mut cam = session(script);
        let surfaces = [
            OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(4, 2),
            OutputSurfaceSpec::new(SurfaceFormat::Raw),
        ];
        let requests = vec![CaptureRequest::new(); 3];
        let outputs = cam
            .do_capture(&requests, &surfaces, &CaptureOptions::default())
            .unwrap();

        assert_eq!(outputs.len(), 2, "one collection per requested surface");
        let (yuv, raw) = (&outputs[0], &outputs[1]);
        assert_eq!(yuv.len(), 3);
        assert_eq!(raw.len(), 3);
        for (i, cap) in yuv.iter().enumerate() {
            assert_eq!(cap.format, SurfaceFormat::Yuv);
            assert_eq!((cap.width, cap.height), (4, 2));
            assert_eq!(cap.data, yuv_payload(i as u8 + 1), "yuv frame {i} order");
            assert_eq!(cap.metadata.get("frame").unwrap(), i);
        }
        for (i, cap) in raw.iter().enumerate() {
            assert_eq!(cap.data, vec![i as u8 + 1; 10], "raw frame {i} order");
        }
    }

    #[test]
    fn dropped_buffer_surfaces_as_timeout() {
        let outputs = two_surface_outputs();
        // Only 5 of the 6 expected buffers ever arrive.
        let script = vec![
            image_frame("yuvImage", yuv_payload(1)),
            image_frame("rawImage", vec![1; 10]),
            image_frame("yuvImage", yuv_payload(2)),
            image_frame("rawImage", vec![2; 10]),
            image_frame("yuvImage", yuv_payload(3)),
            results_frame(outputs.clone(), json!({}), json!([])),
            results_frame(outputs.clone(), json!({}), json!([])),
            results_frame(outputs, json!({}), json!([])),
        ];
        let mut cam = session(script);
        let surfaces = [
            OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(4, 2),
            OutputSurfaceSpec::new(SurfaceFormat::Raw),
        ];
        let requests = vec![CaptureRequest::new(); 3];
        let err = cam
            .do_capture(&requests, &surfaces, &CaptureOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Timeout)
        ));
    }

    #[test]
    fn unrequested_format_is_unroutable() {
        let script = vec![image_frame("raw10Image", vec![0; 10])];
        let mut cam = session(script);
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Raw)];
        let err = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::UnroutableBuffer { .. })
        ));
    }

    #[test]
    fn over_delivery_is_a_protocol_error() {
        let script = vec![
            image_frame("rawImage", vec![1; 4]),
            image_frame("rawImage", vec![2; 4]),
        ];
        let mut cam = session(script);
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Raw)];
        let err = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::ExcessBuffers { .. })
        ));
    }

    #[test]
    fn size_mismatch_is_a_hard_error() {
        let outputs = json!([{"format": "yuv", "width": 8, "height": 4}]);
        let script = vec![
            image_frame("yuvImage", yuv_payload(1)),
            results_frame(outputs, json!({}), json!([])),
        ];
        let mut cam = session(script);
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(4, 2)];
        let err = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::SizeMismatch {
                requested_width: 4,
                actual_width: 8,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_yuv_sizes_rejected_before_send() {
        let mut cam = session(vec![]);
        let surfaces = [
            OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(4, 2),
            OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(2, 4),
        ];
        let err = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Config(ConfigError::AmbiguousYuvSize { bytes: 12, .. })
        ));
        assert!(cam.transport_ref().sent.is_empty(), "nothing was sent");
    }

    #[test]
    fn conflicting_raw_formats_rejected_before_send() {
        let mut cam = session(vec![]);
        for pair in [
            [SurfaceFormat::Raw, SurfaceFormat::Dng],
            [SurfaceFormat::Raw, SurfaceFormat::Raw10],
            [SurfaceFormat::Raw10, SurfaceFormat::Dng],
        ] {
            let surfaces = pair.map(OutputSurfaceSpec::new);
            let err = cam
                .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
                .unwrap_err();
            assert!(matches!(
                err,
                SessionError::Config(ConfigError::ConflictingRawFormats)
            ));
        }
        assert!(cam.transport_ref().sent.is_empty());
    }

    #[test]
    fn distinct_yuv_sizes_route_by_payload_size() {
        let outputs = json!([
            {"format": "yuv", "width": 4, "height": 2},
            {"format": "yuv", "width": 2, "height": 2},
        ]);
        // Small surface delivered first even though requested second.
        let script = vec![
            image_frame("yuvImage", vec![9; 6]),
            image_frame("yuvImage", vec![7; 12]),
            results_frame(outputs, json!({}), json!([])),
        ];
        let mut cam = session(script);
        let surfaces = [
            OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(4, 2),
            OutputSurfaceSpec::new(SurfaceFormat::Yuv).with_size(2, 2),
        ];
        let outputs = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap();
        assert_eq!(outputs[0][0].data, vec![7; 12]);
        assert_eq!(outputs[1][0].data, vec![9; 6]);
    }

    #[test]
    fn physical_suffix_routes_to_sub_camera_metadata() {
        let outputs = json!([{"format": "raw", "width": 8, "height": 6}]);
        let script = vec![
            image_frame("rawImage2", vec![5; 10]),
            results_frame(
                outputs,
                json!({"logical": true}),
                json!([{"2": {"physical": true}}]),
            ),
        ];
        let mut cam = session(script);
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Raw).with_physical_camera("2")];
        let outputs = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap();
        let cap = &outputs[0][0];
        assert_eq!(cap.data, vec![5; 10]);
        assert_eq!(cap.metadata.get("physical").unwrap(), &json!(true));
        assert!(cap.metadata.get("logical").is_none());
    }

    #[test]
    fn capture_timeout_extends_with_exposure_and_restores() {
        let outputs = json!([{"format": "raw", "width": 8, "height": 6}]);
        let script = vec![
            image_frame("rawImage", vec![0; 10]),
            results_frame(outputs, json!({}), json!([])),
        ];
        let mut cam = session(script);
        let mut request = CaptureRequest::new();
        request.insert(
            "android.sensor.exposureTime".into(),
            json!(2_000_000_000i64),
        );
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Raw)];
        cam.do_capture(&[request], &surfaces, &CaptureOptions::default())
            .unwrap();
        assert_eq!(
            cam.transport_ref().timeouts_set,
            vec![Duration::from_secs(22), Duration::from_secs(20)]
        );
    }

    #[test]
    fn simple_command_tag_mismatch() {
        let mut cam = session(vec![text_frame("cameraClosed", "")]);
        let err = cam.open_camera().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::UnexpectedTag { expected, actual })
                if expected == "cameraOpened" && actual == "cameraClosed"
        ));
    }

    #[test]
    fn stream_combination_query() {
        let mut cam = session(vec![text_frame(
            "streamCombinationSupport",
            "supportedCombination",
        )]);
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Jpeg)];
        assert!(cam.is_stream_combination_supported(&surfaces, None).unwrap());

        let mut cam = session(vec![text_frame(
            "streamCombinationSupport",
            "unsupportedCombination",
        )]);
        assert!(!cam.is_stream_combination_supported(&surfaces, None).unwrap());
    }

    #[test]
    fn three_a_collects_partial_results() {
        let script = vec![
            text_frame("aeResult", "100 33000000"),
            text_frame("awbResult", "1.5 1.0 1.0 2.0 1 0 0 0 1 0 0 0 1"),
            text_frame("afResult", "1.25"),
            text_frame("3aConverged", ""),
            text_frame("3aDone", ""),
        ];
        let mut cam = session(script);
        let result = cam.do_3a(&ThreeARequest::default()).unwrap();
        assert_eq!(result.ae_sensitivity, Some(100));
        assert_eq!(result.ae_exposure_ns, Some(33_000_000));
        assert_eq!(result.awb_gains, Some([1.5, 1.0, 1.0, 2.0]));
        assert_eq!(
            result.awb_transform,
            Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(result.af_focus_distance, Some(1.25));
    }

    #[test]
    fn three_a_without_convergence_fails() {
        let script = vec![
            text_frame("aeResult", "100 33000000"),
            text_frame("awbResult", "1.5 1.0 1.0 2.0 1 0 0 0 1 0 0 0 1"),
            text_frame("afResult", "1.25"),
            text_frame("3aDone", ""),
        ];
        let mut cam = session(script);
        let err = cam.do_3a(&ThreeARequest::default()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::ConvergenceFailed(_))
        ));
    }

    #[test]
    fn three_a_missing_mandated_component_fails() {
        // AWB mandated for color cameras, but no awbResult arrives.
        let script = vec![
            text_frame("aeResult", "100 33000000"),
            text_frame("afResult", "1.25"),
            text_frame("3aConverged", ""),
            text_frame("3aDone", ""),
        ];
        let mut cam = session(script);
        let err = cam.do_3a(&ThreeARequest::default()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::ConvergenceFailed(_))
        ));

        // A mono camera does not mandate AWB gains.
        let script = vec![
            text_frame("aeResult", "100 33000000"),
            text_frame("afResult", "1.25"),
            text_frame("3aConverged", ""),
            text_frame("3aDone", ""),
        ];
        let mut cam = session(script);
        let request = ThreeARequest {
            mono_camera: true,
            ..ThreeARequest::default()
        };
        assert!(cam.do_3a(&request).is_ok());
    }

    #[test]
    fn do_capture_serializes_expected_command() {
        let outputs = json!([{"format": "jpeg", "width": 640, "height": 480}]);
        let script = vec![
            image_frame("jpegImage", vec![0xff; 8]),
            results_frame(outputs, json!({}), json!([])),
        ];
        let mut cam = session(script);
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Jpeg).with_size(640, 480)];
        cam.do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap();
        let sent = cam.transport_ref().sent_commands();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["cmdName"], "doCapture");
        assert_eq!(sent[0]["outputSurfaces"][0]["format"], "jpeg");
        assert_eq!(sent[0]["captureRequests"], json!([{}]));
    }

    #[test]
    fn hidden_physical_session_targets_sub_camera() {
        let outputs = json!([{"format": "raw", "width": 8, "height": 6}]);
        // The service may tag buffers bare even for hidden sub-cameras.
        let script = vec![
            image_frame("rawImage", vec![3; 10]),
            results_frame(outputs, json!({}), json!([{"3": {"sub": 1}}])),
        ];
        let mut cam = CameraSession::with_transport(
            MockTransport::new(script),
            "0",
            Some("3".into()),
            TransportConfig::default(),
        );
        let surfaces = [OutputSurfaceSpec::new(SurfaceFormat::Raw)];
        let outputs = cam
            .do_capture(&[CaptureRequest::new()], &surfaces, &CaptureOptions::default())
            .unwrap();
        assert_eq!(outputs[0][0].data, vec![3; 10]);
        assert_eq!(outputs[0][0].metadata.get("sub").unwrap(), 1);
        let sent = cam.transport_ref().sent_commands();
        assert_eq!(sent[0]["outputSurfaces"][0]["physicalCamera"], "3");
    }

    #[test]
    fn camera_properties_cached_in_state() {
        let script = vec![obj_frame(
            "cameraProperties",
            json!({"cameraProperties": {"android.sensor.info.whiteLevel": 1023}}),
        )];
        let mut cam = session(script);
        let props = cam.camera_properties().unwrap();
        assert_eq!(props.white_level(), Some(1023.0));
        assert!(cam.state().has_properties());
    }
}
