//! Lifecycle and per-tick pipeline for one physical sensor connection.

use crate::config::SensorConfig;
use crate::prelude::{FrameStatus, ProcessingStage, SensorError, SensorResult, StageInput};
use crate::processing::clutter::ClutterRemovalFilter;
use crate::protocol::buffer::ByteStreamBuffer;
use crate::protocol::frame::DecodedFrame;
use crate::protocol::framer::PacketFramer;
use crate::protocol::tlv::TlvDecoder;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::transport::{SerialTransport, Transport};
use ndarray::Array2;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Instant;

const START_COMMAND: &[u8] = b"sensorStart 0\n";
const STOP_COMMAND: &[u8] = b"sensorStop\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    Disconnected,
    Connected,
    Configured,
    Running,
    Stopped,
}

struct Ports {
    control: Box<dyn Transport>,
    data: Box<dyn Transport>,
}

/// Owns the transports, the stream buffer and both clutter filters of one
/// sensor. Not re-entrant: `process_frame` must be driven by a single caller.
pub struct SensorInterface {
    config: SensorConfig,
    state: SensorState,
    ports: Option<Ports>,
    buffer: ByteStreamBuffer,
    decoder: TlvDecoder,
    rd_filter: ClutterRemovalFilter,
    ra_filter: ClutterRemovalFilter,
    chunk: Vec<u8>,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl SensorInterface {
    pub fn new(config: SensorConfig) -> SensorResult<Self> {
        config.validate()?;
        Ok(Self {
            rd_filter: ClutterRemovalFilter::new(config.rd_signal_clutter_ratio)?,
            ra_filter: ClutterRemovalFilter::new(config.ra_signal_clutter_ratio)?,
            buffer: ByteStreamBuffer::with_capacity(config.buffer_size + config.data_chunk_size),
            chunk: vec![0u8; config.data_chunk_size],
            decoder: TlvDecoder::new(),
            state: SensorState::Disconnected,
            ports: None,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("mmw"),
            config,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.ports.is_some()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Opens the user (control) and data serial ports.
    pub fn connect(&mut self, user_port: &str, data_port: &str) -> SensorResult<()> {
        let timeout = self.config.read_timeout();
        let control = SerialTransport::open(user_port, self.config.user_baud_rate, timeout)?;
        let data = SerialTransport::open(data_port, self.config.data_baud_rate, timeout)?;
        self.connect_with(Box::new(control), Box::new(data))
    }

    /// Adopts already-open transports, clearing anything pending on them.
    pub fn connect_with(
        &mut self,
        mut control: Box<dyn Transport>,
        mut data: Box<dyn Transport>,
    ) -> SensorResult<()> {
        control
            .clear()
            .map_err(|err| SensorError::PortsNotSetUp(format!("control channel: {}", err)))?;
        data.clear()
            .map_err(|err| SensorError::PortsNotSetUp(format!("data channel: {}", err)))?;
        self.ports = Some(Ports { control, data });
        self.buffer.clear();
        self.state = SensorState::Connected;
        self.logger.record("connected to sensor ports");
        Ok(())
    }

    fn control_port(&mut self) -> SensorResult<&mut Box<dyn Transport>> {
        self.ports
            .as_mut()
            .map(|ports| &mut ports.control)
            .ok_or_else(|| SensorError::PortsNotSetUp("connect to the sensor first".into()))
    }

    fn send_command(&mut self, command: &[u8]) -> SensorResult<String> {
        let control = self.control_port()?;
        control.write(command)?;
        control.flush()?;
        control.read_text()
    }

    /// Streams a vendor configuration script to the control channel, one
    /// line at a time, then starts the sensor.
    pub fn send_config<P: AsRef<Path>>(&mut self, path: P) -> SensorResult<()> {
        self.control_port()?;
        let path = path.as_ref();
        let script = fs::read_to_string(path).map_err(|source| SensorError::ConfigScript {
            path: path.to_path_buf(),
            source,
        })?;

        let delay = self.config.config_line_delay();
        let mut response = String::new();
        for line in script.lines() {
            let line = line.trim_end_matches(['\r', '\n']);
            let control = self.control_port()?;
            control.write(format!("{}\n", line).as_bytes())?;
            control.flush()?;
            thread::sleep(delay);
            response.push_str(&control.read_text()?);
        }
        self.logger.record(&format!(
            "sent config {} ({} lines)",
            path.display(),
            script.lines().count()
        ));
        if !response.is_empty() {
            self.logger.detail(&format!("CLI: {}", response.trim_end()));
        }

        self.state = SensorState::Configured;
        self.start()
    }

    /// Tells the sensor to begin emitting frames.
    pub fn start(&mut self) -> SensorResult<()> {
        let response = self.send_command(START_COMMAND)?;
        self.logger
            .record(&format!("sensor started {}", response.trim_end()));
        self.state = SensorState::Running;
        Ok(())
    }

    /// Tells the sensor to stop emitting frames and waits for in-flight
    /// frames to drain. The transports stay open.
    pub fn stop(&mut self) -> SensorResult<()> {
        let response = self.send_command(STOP_COMMAND)?;
        thread::sleep(self.config.stop_settle());
        self.state = SensorState::Stopped;
        match self.metrics.frame_rate() {
            Some(rate) => self.logger.record(&format!(
                "sensor stopped {} (frame rate {:.1} Hz)",
                response.trim_end(),
                rate
            )),
            None => self
                .logger
                .record(&format!("sensor stopped {}", response.trim_end())),
        }
        Ok(())
    }

    /// Stops the sensor and releases both transports.
    pub fn close_connection(&mut self) -> SensorResult<()> {
        if self.ports.is_none() {
            self.state = SensorState::Disconnected;
            return Ok(());
        }
        let stopped = self.stop();
        if let Some(mut ports) = self.ports.take() {
            if let Err(err) = ports.control.clear() {
                self.logger
                    .detail(&format!("clearing control channel on close: {}", err));
            }
            if let Err(err) = ports.data.clear() {
                self.logger
                    .detail(&format!("clearing data channel on close: {}", err));
            }
        }
        self.buffer.clear();
        self.rd_filter.cleanup();
        self.ra_filter.cleanup();
        self.state = SensorState::Disconnected;
        self.logger.record("disconnected from sensor ports");
        stopped
    }

    /// Re-parameterises the range-Doppler filter, discarding its history.
    pub fn set_rd_signal_clutter_ratio(&mut self, ratio: f32) -> SensorResult<()> {
        self.rd_filter.set_ratio(ratio)?;
        self.config.rd_signal_clutter_ratio = ratio;
        Ok(())
    }

    /// Re-parameterises the range-azimuth filter, discarding its history.
    pub fn set_ra_signal_clutter_ratio(&mut self, ratio: f32) -> SensorResult<()> {
        self.ra_filter.set_ratio(ratio)?;
        self.config.ra_signal_clutter_ratio = ratio;
        Ok(())
    }

    /// One scheduler tick: pulls a chunk from the data channel and returns a
    /// frame if a whole packet is now buffered.
    pub fn process_frame(&mut self) -> SensorResult<FrameStatus<DecodedFrame>> {
        let started = Instant::now();
        let ports = self.ports.as_mut().ok_or(SensorError::DataPortNotOpen)?;
        let read = ports.data.read(&mut self.chunk)?;
        self.buffer.append(&self.chunk[..read]);
        self.metrics.record_bytes(read);

        if self.buffer.exceeds(self.config.buffer_size) {
            return Err(self.handle_overflow());
        }

        let Some(framed) = PacketFramer::frame(self.buffer.as_slice()).complete() else {
            self.metrics.record_incomplete();
            return Ok(FrameStatus::Incomplete);
        };

        let packet = match self.decoder.decode(&framed.header, &framed.payload) {
            Ok(FrameStatus::Complete(packet)) => packet,
            Ok(FrameStatus::Incomplete) => {
                // the payload is already bounded by the packet length, so
                // more bytes cannot complete it
                self.logger.warn(&format!(
                    "dropping packet {} ({} bytes): TLV elements overrun the packet",
                    framed.header.frame_number,
                    framed.end - framed.start
                ));
                self.buffer.consume_from(framed.end);
                self.metrics.record_abandoned();
                self.metrics.record_incomplete();
                return Ok(FrameStatus::Incomplete);
            }
            Err(err) => {
                self.metrics.record_decode_error();
                self.logger
                    .error(&format!("{}; closing sensor connection", err));
                if let Err(close_err) = self.close_connection() {
                    self.logger
                        .warn(&format!("close after decode error failed: {}", close_err));
                }
                return Err(err);
            }
        };
        self.buffer.consume_from(framed.end);

        let mut frame = DecodedFrame::from_packet(packet);
        let frame_number = frame.frame_number();
        frame.range_doppler_clean = match frame.range_doppler.as_ref() {
            Some(heatmap) => Some(Self::filter(
                &mut self.rd_filter,
                heatmap.mapv(f32::from),
                frame_number,
            )?),
            None => None,
        };
        frame.range_azimuth_clean = match frame.range_azimuth.as_ref() {
            Some(heatmap) => Some(Self::filter(
                &mut self.ra_filter,
                heatmap.clone(),
                frame_number,
            )?),
            None => None,
        };

        self.metrics.record_frame(started.elapsed());
        Ok(FrameStatus::Complete(frame))
    }

    fn filter(
        stage: &mut ClutterRemovalFilter,
        heatmap: Array2<f32>,
        frame_number: u32,
    ) -> SensorResult<Array2<f32>> {
        let output = stage.execute(StageInput {
            frame: heatmap,
            frame_number: Some(frame_number),
        })?;
        Ok(output.frame)
    }

    /// Overflow is fatal to the session: dump the buffer, stop the sensor and
    /// start over with an empty buffer.
    fn handle_overflow(&mut self) -> SensorError {
        let size = self.buffer.len();
        let limit = self.config.buffer_size;
        self.metrics.record_overflow();
        self.logger.error(&format!(
            "buffer overflow ({} > {} bytes), contents: {}",
            size,
            limit,
            LogManager::hex(self.buffer.as_slice())
        ));
        self.buffer.clear();
        if let Err(err) = self.stop() {
            self.logger
                .warn(&format!("stopping sensor after overflow failed: {}", err));
        }
        SensorError::BufferOverflow { size, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::builder::PacketBuilder;
    use crate::protocol::frame::DetectedPoint;
    use crate::protocol::header::PacketHeader;
    use crate::protocol::tlv::AZIMUTH_ANTENNA_COUNT;
    use crate::transport::MockTransport;
    use byteorder::{ByteOrder, LittleEndian};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn quick_config() -> SensorConfig {
        SensorConfig {
            stop_settle_ms: 0,
            config_line_delay_ms: 0,
            ..Default::default()
        }
    }

    fn connected(config: SensorConfig) -> (SensorInterface, MockTransport, MockTransport) {
        let control = MockTransport::new();
        let data = MockTransport::new();
        let mut sensor = SensorInterface::new(config).unwrap();
        sensor
            .connect_with(Box::new(control.clone()), Box::new(data.clone()))
            .unwrap();
        (sensor, control, data)
    }

    fn drain(sensor: &mut SensorInterface, max_ticks: usize) -> Vec<DecodedFrame> {
        let mut frames = Vec::new();
        for _ in 0..max_ticks {
            if let FrameStatus::Complete(frame) = sensor.process_frame().unwrap() {
                frames.push(frame);
            }
        }
        frames
    }

    fn rd_packet(frame_number: u32, fill: u16) -> Vec<u8> {
        let heatmap = Array2::from_elem((4, 8), fill);
        PacketBuilder::new()
            .frame_number(frame_number)
            .range_profile(&[fill; 4])
            .range_doppler(heatmap.view())
            .padding(32)
            .build()
    }

    #[test]
    fn lifecycle_requires_connection() {
        let mut sensor = SensorInterface::new(quick_config()).unwrap();
        assert_eq!(sensor.state(), SensorState::Disconnected);
        assert!(matches!(sensor.start(), Err(SensorError::PortsNotSetUp(_))));
        assert!(matches!(sensor.stop(), Err(SensorError::PortsNotSetUp(_))));
        assert!(matches!(
            sensor.send_config("missing.cfg"),
            Err(SensorError::PortsNotSetUp(_))
        ));
        assert!(matches!(
            sensor.process_frame(),
            Err(SensorError::DataPortNotOpen)
        ));
    }

    #[test]
    fn send_config_streams_lines_then_starts() {
        let (mut sensor, control, _) = connected(quick_config());
        let mut script = NamedTempFile::new().unwrap();
        script
            .write_all(b"sensorStop\r\nflushCfg\r\nprofileCfg 0 60 7\r\n")
            .unwrap();

        sensor.send_config(script.path()).unwrap();
        assert_eq!(sensor.state(), SensorState::Running);
        assert_eq!(
            control.written_text(),
            "sensorStop\nflushCfg\nprofileCfg 0 60 7\nsensorStart 0\n"
        );
    }

    #[test]
    fn missing_config_script_is_reported() {
        let (mut sensor, _, _) = connected(quick_config());
        assert!(matches!(
            sensor.send_config("/nonexistent/profile.cfg"),
            Err(SensorError::ConfigScript { .. })
        ));
        assert_eq!(sensor.state(), SensorState::Connected);
    }

    #[test]
    fn stop_keeps_transport_and_close_releases_it() {
        let (mut sensor, control, _) = connected(quick_config());
        sensor.start().unwrap();
        sensor.stop().unwrap();
        assert_eq!(sensor.state(), SensorState::Stopped);
        assert!(sensor.is_connected());

        sensor.close_connection().unwrap();
        assert_eq!(sensor.state(), SensorState::Disconnected);
        assert!(!sensor.is_connected());
        assert!(control.written_text().ends_with("sensorStop\nsensorStop\n"));
        assert!(matches!(
            sensor.process_frame(),
            Err(SensorError::DataPortNotOpen)
        ));
    }

    #[test]
    fn chunked_stream_yields_frames_in_order() {
        let (mut sensor, _, data) = connected(quick_config());
        sensor.start().unwrap();
        for n in 0..3 {
            data.inject_read(&rd_packet(n, 10 * (n as u16 + 1)));
        }

        let frames = drain(&mut sensor, 64);
        let numbers: Vec<u32> = frames.iter().map(|f| f.frame_number()).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert_eq!(sensor.buffered_len(), 0);
        assert_eq!(sensor.metrics().frames_decoded, 3);

        // seeded on the first frame, then blended at ratio 0.5
        let first = frames[0].range_doppler_clean.as_ref().unwrap();
        assert!(first.iter().all(|&v| v == 0.0));
        let second = frames[1].range_doppler_clean.as_ref().unwrap();
        assert!(second.iter().all(|&v| (v - 5.0).abs() < 1e-5));
        assert!(frames[0].range_azimuth_clean.is_none());
    }

    #[test]
    fn frame_carries_every_output() {
        let (mut sensor, _, data) = connected(quick_config());
        let row = [(3i16, -1i16); AZIMUTH_ANTENNA_COUNT];
        let packet = PacketBuilder::new()
            .frame_number(9)
            .points(&[DetectedPoint::new(0.1, 0.4, 0.0, 1.2)])
            .range_profile(&[1, 2])
            .range_doppler(Array2::from_elem((2, 4), 7u16).view())
            .azimuth(&[row, row])
            .statistics([0; 6])
            .padding(32)
            .build();
        data.inject_read(&packet);

        let frames = drain(&mut sensor, packet.len() / 32 + 1);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.detected_points.as_ref().map(Vec::len), Some(1));
        assert_eq!(frame.range_profile, Some(vec![1, 2]));
        assert_eq!(frame.range_doppler.as_ref().map(|h| h.dim()), Some((2, 4)));
        assert_eq!(frame.range_azimuth.as_ref().map(|h| h.dim()), Some((2, 64)));
        assert!(frame.range_doppler_clean.is_some());
        assert!(frame.range_azimuth_clean.is_some());
    }

    #[test]
    fn stop_waits_for_settle_time() {
        let config = SensorConfig {
            stop_settle_ms: 30,
            ..quick_config()
        };
        let (mut sensor, _, _) = connected(config);
        sensor.start().unwrap();

        let started = Instant::now();
        sensor.stop().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(sensor.state(), SensorState::Stopped);
    }

    #[test]
    fn overrunning_packet_is_dropped_and_stream_continues() {
        let (mut sensor, _, data) = connected(quick_config());
        let mut corrupt = PacketBuilder::new()
            .frame_number(0)
            .range_profile(&[1; 4])
            .padding(32)
            .build();
        // first TLV claims the whole packet as its value
        let length_at = PacketHeader::parse(&corrupt).unwrap().encoded_len() + 4;
        let claimed = corrupt.len() as u32;
        LittleEndian::write_u32(&mut corrupt[length_at..length_at + 4], claimed);

        data.inject_read(&corrupt);
        for n in 1..4 {
            data.inject_read(&rd_packet(n, 5));
        }

        let frames = drain(&mut sensor, 64);
        let numbers: Vec<u32> = frames.iter().map(|f| f.frame_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(sensor.metrics().abandoned_packets, 1);
        assert_eq!(sensor.buffered_len(), 0);
        assert!(sensor.is_connected());
    }

    #[test]
    fn garbage_before_packet_is_discarded() {
        let (mut sensor, _, data) = connected(quick_config());
        data.inject_read(&[0x55; 45]);
        data.inject_read(&rd_packet(4, 1));
        data.inject_read(&[0x02, 0x01]);

        let frames = drain(&mut sensor, 16);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_number(), 4);
        assert_eq!(sensor.buffered_len(), 2);
    }

    #[test]
    fn overflow_is_raised_once_and_stops_sensor() {
        let config = SensorConfig {
            buffer_size: 256,
            ..quick_config()
        };
        let (mut sensor, control, data) = connected(config);
        sensor.start().unwrap();
        data.inject_read(&[0xAB; 300]);

        let mut overflows = 0;
        let mut frames = 0;
        for _ in 0..20 {
            match sensor.process_frame() {
                Ok(FrameStatus::Complete(_)) => frames += 1,
                Ok(FrameStatus::Incomplete) => {}
                Err(SensorError::BufferOverflow { size, limit }) => {
                    assert!(size > limit);
                    overflows += 1;
                }
                Err(other) => panic!("unexpected error {other}"),
            }
        }
        assert_eq!(overflows, 1);
        assert_eq!(frames, 0);
        assert_eq!(sensor.state(), SensorState::Stopped);
        assert_eq!(sensor.metrics().overflows, 1);
        assert!(control.written_text().ends_with("sensorStop\n"));
    }

    #[test]
    fn shape_desync_closes_connection() {
        let (mut sensor, _, data) = connected(quick_config());
        let packet = PacketBuilder::new()
            .range_profile(&[0; 3])
            .range_doppler(Array2::from_elem((1, 10), 1u16).view())
            .padding(32)
            .build();
        data.inject_read(&packet);

        let mut result = Ok(FrameStatus::Incomplete);
        for _ in 0..packet.len() / 32 {
            result = sensor.process_frame();
        }
        assert!(matches!(result, Err(SensorError::GeneralDecode(_))));
        assert_eq!(sensor.state(), SensorState::Disconnected);
        assert_eq!(sensor.metrics().decode_errors, 1);
    }

    #[test]
    fn ratio_change_resets_only_its_filter() {
        let (mut sensor, _, data) = connected(quick_config());
        data.inject_read(&rd_packet(0, 10));
        data.inject_read(&rd_packet(1, 20));
        let frames = drain(&mut sensor, 16);
        assert_eq!(frames.len(), 2);

        sensor.set_rd_signal_clutter_ratio(0.9).unwrap();
        data.inject_read(&rd_packet(2, 30));
        let frames = drain(&mut sensor, 8);
        let clean = frames[0].range_doppler_clean.as_ref().unwrap();
        assert!(clean.iter().all(|&v| v == 0.0));
        assert_eq!(sensor.config().rd_signal_clutter_ratio, 0.9);
        assert!(sensor.set_ra_signal_clutter_ratio(1.2).is_err());
    }

    #[test]
    fn close_tolerates_dead_data_channel() {
        let (mut sensor, control, data) = connected(quick_config());
        sensor.start().unwrap();
        data.disconnect();

        sensor.close_connection().unwrap();
        assert_eq!(sensor.state(), SensorState::Disconnected);
        assert!(!sensor.is_connected());
        assert!(control.written_text().ends_with("sensorStop\n"));
    }

    #[test]
    fn lost_device_surfaces_io_error() {
        let (mut sensor, _, data) = connected(quick_config());
        data.disconnect();
        assert!(matches!(sensor.process_frame(), Err(SensorError::Io(_))));
    }
}
