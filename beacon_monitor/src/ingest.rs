/*!
Advertisement ingest and decoding.

Scan results arrive as newline-delimited JSON records from stdin, a file or
UDP datagrams. Two threads split the work:
1. Reader thread: input source -> record lines -> bounded channel
2. Decoder thread: lines -> Eddystone frames -> tracker -> JSON events on stdout

Malformed records and undecodable frames are counted and dropped; they never
stop the monitor.
*/

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use eddystone::service_data::parse_service_uuid;
use eddystone::{decode, eddystone_service_data, select_service_data, FrameType};
use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};
use crate::config::MonitorConfig;
use crate::tracker::{BeaconEvent, BeaconTracker, TrackerStats};

/// One scan result as handed over by the scanner
#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisementRecord {
    /// Advertiser device address
    pub address: String,

    /// Received signal strength in dBm
    pub rssi: i16,

    /// Service data as hex, keyed by service UUID (`"FEAA"` or full form)
    #[serde(default)]
    pub service_data: HashMap<String, String>,

    /// Raw advertising data (AD structures) as hex
    #[serde(default)]
    pub adv_data: Option<String>,
}

impl AdvertisementRecord {
    /// Extract the Eddystone service data, preferring the `service_data` map
    /// over raw advertising data
    pub fn eddystone_payload(&self) -> Result<Option<Vec<u8>>> {
        if !self.service_data.is_empty() {
            let mut decoded = HashMap::with_capacity(self.service_data.len());
            for (key, value) in &self.service_data {
                let Some(uuid) = parse_service_uuid(key) else {
                    debug!("Ignoring service data under unparseable UUID {:?}", key);
                    continue;
                };
                let bytes = hex::decode(value.trim())
                    .with_context(|| format!("Invalid service data hex for {}", key))?;
                decoded.insert(uuid, bytes);
            }

            if let Some(data) = select_service_data(&decoded) {
                return Ok(Some(data.to_vec()));
            }
        }

        if let Some(adv_data) = &self.adv_data {
            let adv_data = hex::decode(adv_data.trim()).context("Invalid advertising data hex")?;
            return Ok(eddystone_service_data(&adv_data).map(<[u8]>::to_vec));
        }

        Ok(None)
    }
}

/// Decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: u64,
    pub invalid_records: u64,
    pub without_eddystone_data: u64,
    pub decode_errors: u64,
    pub uid_frames: u64,
    pub eid_frames: u64,
    pub url_frames: u64,
    pub tlm_frames: u64,
    pub empty_frames: u64,
}

impl IngestStats {
    fn count_frame(&mut self, frame_type: FrameType) {
        match frame_type {
            FrameType::Uid => self.uid_frames += 1,
            FrameType::Eid => self.eid_frames += 1,
            FrameType::Url => self.url_frames += 1,
            FrameType::Telemetry => self.tlm_frames += 1,
            FrameType::Empty => self.empty_frames += 1,
            FrameType::Unknown => {}
        }
    }

    pub fn decoded_frames(&self) -> u64 {
        self.uid_frames + self.eid_frames + self.url_frames + self.tlm_frames + self.empty_frames
    }
}

/// Record lines in, tracker events out
pub struct Pipeline {
    tracker: BeaconTracker,
    stats: IngestStats,
}

impl Pipeline {
    pub fn new(expiration: Duration) -> Self {
        Self {
            tracker: BeaconTracker::new(expiration),
            stats: IngestStats::default(),
        }
    }

    /// Decode one record line and feed the frame to the tracker
    pub fn handle_line(&mut self, line: &str, now: Instant) -> Option<BeaconEvent> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.stats.records += 1;

        let record: AdvertisementRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping unparseable record: {}", e);
                self.stats.invalid_records += 1;
                return None;
            }
        };

        let payload = match record.eddystone_payload() {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.stats.without_eddystone_data += 1;
                return None;
            }
            Err(e) => {
                debug!("Skipping record from {}: {:#}", record.address, e);
                self.stats.invalid_records += 1;
                return None;
            }
        };

        match decode(&payload, record.rssi) {
            Ok(frame) => {
                self.stats.count_frame(frame.frame_type());
                self.tracker.process(&record.address, frame, now)
            }
            Err(e) => {
                debug!("Dropping frame from {}: {}", record.address, e);
                self.stats.decode_errors += 1;
                None
            }
        }
    }

    /// Expire beacons that have gone quiet
    pub fn sweep(&mut self, now: Instant) -> Vec<BeaconEvent> {
        self.tracker.expire(now)
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    pub fn tracked_beacons(&self) -> usize {
        self.tracker.len()
    }

    fn log_stats(&self) {
        let stats = self.stats;
        let tracker = self.tracker_stats();
        info!("📊 Records: {} ({} invalid, {} without Eddystone data)",
              stats.records, stats.invalid_records, stats.without_eddystone_data);
        info!("   Frames: {} decoded (UID {}, EID {}, URL {}, TLM {}, empty {}), {} decode errors",
              stats.decoded_frames(), stats.uid_frames, stats.eid_frames, stats.url_frames,
              stats.tlm_frames, stats.empty_frames, stats.decode_errors);
        info!("   Beacons: {} tracked, {} added, {} updates, {} expired",
              self.tracked_beacons(), tracker.beacons_added, tracker.updates,
              tracker.beacons_expired);
        info!("   Unattached: {} orphaned frames, {} empty frames",
              tracker.orphaned_frames, tracker.empty_frames);
    }
}

/// Write one event as a JSON line, stamped with the current time
pub fn write_event<W: Write>(out: &mut W, event: &BeaconEvent) -> Result<()> {
    let mut value = serde_json::to_value(event)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("timestamp".to_string(), Utc::now().to_rfc3339().into());
    }
    writeln!(out, "{}", value)?;
    out.flush()?;
    Ok(())
}

/// Where advertisement records come from
#[derive(Debug, Clone)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
    Udp { bind_addr: String, port: u16 },
}

impl InputSource {
    /// Pick the input source described by a monitor configuration
    pub fn from_config(config: &MonitorConfig) -> Self {
        if config.udp_enabled {
            Self::Udp {
                bind_addr: config.udp_bind_addr.clone(),
                port: config.udp_port,
            }
        } else if let Some(path) = &config.input_path {
            Self::File(PathBuf::from(path))
        } else {
            Self::Stdin
        }
    }
}

/// Reader + decoder thread pair feeding a beacon tracker
pub struct BeaconMonitor {
    source: InputSource,
    config: MonitorConfig,
    running: Arc<AtomicBool>,
}

impl BeaconMonitor {
    pub fn new(source: InputSource, config: MonitorConfig) -> Self {
        Self {
            source,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run until the input ends or the running flag is cleared
    pub fn start(&mut self) -> Result<()> {
        let (line_tx, line_rx) = bounded::<String>(self.config.channel_buffer_size.max(1));

        let running_reader = Arc::clone(&self.running);
        let running_decoder = Arc::clone(&self.running);
        let config = self.config.clone();
        let source = self.source.clone();

        info!("📥 Reading advertisements from {:?}", source);

        let reader_handle = match source.clone() {
            InputSource::Stdin => thread::spawn(move || {
                Self::line_reader_thread(io::stdin().lock(), line_tx, running_reader)
            }),
            InputSource::File(path) => thread::spawn(move || {
                let file = std::fs::File::open(&path)
                    .with_context(|| format!("Failed to open input file: {}", path.display()))?;
                Self::line_reader_thread(BufReader::new(file), line_tx, running_reader)
            }),
            InputSource::Udp { bind_addr, port } => {
                let recv_buffer_bytes = config.udp_recv_buffer_bytes;
                thread::spawn(move || {
                    let rt = Runtime::new().context("Failed to create tokio runtime")?;
                    rt.block_on(Self::udp_receiver(
                        bind_addr,
                        port,
                        recv_buffer_bytes,
                        line_tx,
                        running_reader,
                    ))
                })
            }
        };

        let decoder_handle = thread::spawn(move || {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            Self::decoder_thread(line_rx, running_decoder, &config, &mut out)
        });

        let decoder_result = decoder_handle
            .join()
            .map_err(|_| anyhow!("Decoder thread panicked"))?;

        // A reader blocked on stdin cannot observe the running flag; leave it behind
        if !matches!(source, InputSource::Stdin) || reader_handle.is_finished() {
            let reader_result = reader_handle
                .join()
                .map_err(|_| anyhow!("Reader thread panicked"))?;
            if let Err(e) = &reader_result {
                error!("Reader thread failed: {:#}", e);
            }
            reader_result?;
            info!("Reader thread finished successfully");
        }

        decoder_result
    }

    /// Forward lines from a buffered reader until EOF or shutdown
    fn line_reader_thread<R: BufRead>(
        reader: R,
        line_tx: Sender<String>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut lines = 0u64;

        for line in reader.lines() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let line = line.context("Failed to read input line")?;
            if line_tx.send(line).is_err() {
                debug!("Record channel closed - decoder has stopped");
                break;
            }
            lines += 1;
        }

        info!("📄 Input finished after {} lines", lines);
        Ok(())
    }

    /// UDP receiver - each datagram holds one or more record lines
    async fn udp_receiver(
        bind_addr: String,
        port: u16,
        recv_buffer_bytes: usize,
        line_tx: Sender<String>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let socket_addr = format!("{}:{}", bind_addr, port);
        info!("🔌 Binding UDP socket to {}", socket_addr);

        let socket = UdpSocket::bind(&socket_addr)
            .await
            .with_context(|| format!("Failed to bind UDP socket to {}", socket_addr))?;

        let sock_ref = socket2::SockRef::from(&socket);
        sock_ref.set_recv_buffer_size(recv_buffer_bytes)?;
        info!("✅ UDP socket bound (receive buffer {} bytes)", recv_buffer_bytes);

        let mut buffer = vec![0u8; 4096];
        let mut packet_count = 0u64;
        let mut dropped_lines = 0u64;
        let mut error_count = 0u64;

        while running.load(Ordering::SeqCst) {
            // Time out periodically to check the running flag
            let timeout = Duration::from_millis(100);

            match tokio::time::timeout(timeout, socket.recv(&mut buffer)).await {
                Ok(Ok(bytes_received)) => {
                    packet_count += 1;
                    let text = String::from_utf8_lossy(&buffer[..bytes_received]);
                    for line in text.lines().filter(|l| !l.trim().is_empty()) {
                        if line_tx.try_send(line.to_string()).is_err() {
                            warn!("Record channel full, dropping advertisement");
                            dropped_lines += 1;
                        }
                    }
                }
                Ok(Err(e)) => {
                    error!("UDP receive error: {}", e);
                    error_count += 1;
                }
                Err(_) => continue,
            }
        }

        info!("📈 UDP receiver final stats:");
        info!("   Packets: {}", packet_count);
        info!("   Dropped records: {}", dropped_lines);
        info!("   Errors: {}", error_count);

        Ok(())
    }

    /// Decoder thread - decodes records, tracks beacons and emits events
    fn decoder_thread<W: Write>(
        line_rx: Receiver<String>,
        running: Arc<AtomicBool>,
        config: &MonitorConfig,
        out: &mut W,
    ) -> Result<()> {
        let mut pipeline = Pipeline::new(config.beacon_expiration());
        let sweep_interval = config.expiry_check_interval();
        let stats_interval = Duration::from_secs(config.stats_interval_seconds);
        let mut last_stats = Instant::now();

        info!("🔍 Decoder thread started (beacon expiration {:?})", config.beacon_expiration());

        while running.load(Ordering::SeqCst) || !line_rx.is_empty() {
            match line_rx.recv_timeout(sweep_interval) {
                Ok(line) => {
                    if let Some(event) = pipeline.handle_line(&line, Instant::now()) {
                        write_event(out, &event)?;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    info!("Record channel disconnected - input has ended");
                    break;
                }
            }

            for event in pipeline.sweep(Instant::now()) {
                write_event(out, &event)?;
            }

            if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
                pipeline.log_stats();
                last_stats = Instant::now();
            }
        }

        pipeline.log_stats();
        Ok(())
    }
}
