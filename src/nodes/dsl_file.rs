//! DSL file source
//!
//! Provides `DslFileSource` - a self-threading source node that reads DSLogic .dsl capture
//! files and streams run-length encoded [`Edge`]s per probe.
//!
//! A .dsl file is a zip archive holding a `header` text file and one packed bit block per
//! probe and block index (`L-<probe>/<block>`, LSB first). Each subscriber gets its own
//! reading thread, so a slow consumer on one probe never stalls another. All threads share
//! a single ZipArchive and block cache via `Arc<Mutex<..>>`.

use super::{EdgeOutputs, EdgeSource};
use crate::runtime::{Edge, ProcessNode, Receiver, Sender, WorkError, WorkResult};
use crate::{AnalyzerError, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info};
use zip::ZipArchive;

/// Header information from a DSL file
#[derive(Debug, Clone)]
pub struct DslHeader {
    /// Total number of probes/channels
    pub total_probes: usize,
    /// Sample rate as written in the file (e.g., "50 MHz")
    pub sample_rate: String,
    /// Sample rate in Hz
    pub sample_rate_hz: f64,
    /// Total number of samples captured
    pub total_samples: u64,
    /// Total number of data blocks per probe
    pub total_blocks: u64,
    /// Samples in every block but the last, from the size of `L-0/0`
    pub samples_per_block: u64,
    /// Probe names indexed by probe number
    pub probe_names: Vec<String>,
}

impl DslHeader {
    /// Parse the `header` entry of a capture
    fn parse(content: &str) -> Result<Self> {
        let mut total_probes: Option<usize> = None;
        let mut sample_rate: Option<String> = None;
        let mut total_samples: Option<u64> = None;
        let mut total_blocks: Option<u64> = None;
        let mut names: HashMap<usize, String> = HashMap::new();

        fn number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            value
                .parse()
                .map_err(|e| AnalyzerError::ParseError(format!("{} '{}': {}", field, value, e)))
        }

        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(value) = line.strip_prefix("total probes = ") {
                total_probes = Some(number("total probes", value)?);
            } else if let Some(value) = line.strip_prefix("samplerate = ") {
                sample_rate = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("total samples = ") {
                total_samples = Some(number("total samples", value)?);
            } else if let Some(value) = line.strip_prefix("total blocks = ") {
                total_blocks = Some(number("total blocks", value)?);
            } else if let Some((key, name)) = line.split_once(" = ")
                && let Some(number) = key.strip_prefix("probe")
                && let Ok(probe) = number.parse::<usize>()
            {
                names.insert(probe, name.to_string());
            }
        }

        let total_probes =
            total_probes.ok_or_else(|| AnalyzerError::MissingField("total probes".to_string()))?;
        let sample_rate =
            sample_rate.ok_or_else(|| AnalyzerError::MissingField("samplerate".to_string()))?;
        let total_samples = total_samples
            .ok_or_else(|| AnalyzerError::MissingField("total samples".to_string()))?;
        let total_blocks =
            total_blocks.ok_or_else(|| AnalyzerError::MissingField("total blocks".to_string()))?;
        let sample_rate_hz = parse_sample_rate(&sample_rate).ok_or_else(|| {
            AnalyzerError::ParseHeader(format!("Invalid sample rate: {}", sample_rate))
        })?;

        let probe_names = (0..total_probes)
            .map(|i| names.remove(&i).unwrap_or_else(|| format!("Probe{}", i)))
            .collect();

        Ok(Self {
            total_probes,
            sample_rate,
            sample_rate_hz,
            total_samples,
            total_blocks,
            samples_per_block: 0,
            probe_names,
        })
    }

    /// Sample period in seconds
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate_hz
    }

    /// Capture duration in seconds
    pub fn duration(&self) -> f64 {
        self.total_samples as f64 * self.sample_period()
    }
}

type BlockCache = Arc<Mutex<HashMap<(usize, u64), Arc<[u8]>>>>;
type SharedArchive = Arc<Mutex<ZipArchive<File>>>;

/// Source node that reads a DSLogic .dsl capture and streams one edge channel per subscriber
///
/// ## Threading Model
///
/// This is a **self-threading node** (`is_self_threading() = true`). On the first (and only)
/// call to `work()`, it spawns one reader thread **per subscriber**. The scheduler thread then
/// waits for `should_stop()` to signal completion.
///
/// A probe subscribed twice gets two independent reader threads over the same cached blocks.
///
/// # Example
/// ```no_run
/// use nrf24::nodes::{DslFileSource, EdgeSource};
///
/// let mut source = DslFileSource::open("capture.dsl")?;
/// let clock = source.subscribe(2, Some(4096))?;
/// # Ok::<(), nrf24::AnalyzerError>(())
/// ```
pub struct DslFileSource {
    name: String,
    archive: SharedArchive,
    header: DslHeader,
    blocks: BlockCache,
    max_samples: Option<u64>,
    outputs: EdgeOutputs,

    shutdown: Arc<AtomicBool>,
    threads_completed: Arc<AtomicUsize>,
    thread_handles: Option<Vec<JoinHandle<()>>>,
    threads_spawned: bool,
    num_threads: usize,
}

impl DslFileSource {
    /// Open a capture and read its header
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let mut content = String::new();
        archive
            .by_name("header")
            .map_err(|e| AnalyzerError::ParseHeader(format!("Cannot find header file: {}", e)))?
            .read_to_string(&mut content)?;
        let mut header = DslHeader::parse(&content)?;

        // Blocks are fixed-size except the last
        let mut first_block = Vec::new();
        archive
            .by_name("L-0/0")
            .map_err(|_| AnalyzerError::ParseHeader("Could not read first block".to_string()))?
            .read_to_end(&mut first_block)?;
        header.samples_per_block = (first_block.len() * 8) as u64;
        if header.samples_per_block == 0 {
            return Err(AnalyzerError::ParseHeader("Empty first block".to_string()));
        }

        debug!(
            "File has {} samples across {} blocks ({} samples/block)",
            header.total_samples, header.total_blocks, header.samples_per_block
        );

        Ok(Self {
            name: "dsl_file_source".to_string(),
            archive: Arc::new(Mutex::new(archive)),
            header,
            blocks: Arc::new(Mutex::new(HashMap::new())),
            max_samples: None,
            outputs: EdgeOutputs::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads_completed: Arc::new(AtomicUsize::new(0)),
            thread_handles: None,
            threads_spawned: false,
            num_threads: 0,
        })
    }

    pub fn header(&self) -> &DslHeader {
        &self.header
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.header.sample_rate_hz
    }

    /// Set custom name (builder pattern)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stop streaming after `max_samples` samples
    pub fn with_max_samples(mut self, max_samples: Option<u64>) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Read a single sample of one probe
    pub fn read_bit(&self, probe: usize, position: u64) -> Result<bool> {
        if probe >= self.header.total_probes {
            return Err(AnalyzerError::InvalidProbe(probe));
        }
        if position >= self.header.total_samples {
            return Err(AnalyzerError::OutOfBounds(position));
        }

        let block = position / self.header.samples_per_block;
        if block >= self.header.total_blocks {
            return Err(AnalyzerError::OutOfBounds(position));
        }

        let data = load_block(&self.archive, &self.blocks, probe, block)?;
        let index = (position % self.header.samples_per_block) as usize;
        Ok(get_bit(&data, index))
    }

    /// Reader thread for one subscriber of one probe
    ///
    /// Sends the level at sample 0 and then one edge per transition, each
    /// stamped with the sample index where the new level starts.
    fn probe_reader_thread(config: ProbeReaderConfig) {
        let ProbeReaderConfig {
            archive,
            blocks,
            probe,
            header,
            sender,
            max_samples,
            shutdown,
            completed,
        } = config;
        let total_samples = max_samples
            .unwrap_or(header.total_samples)
            .min(header.total_samples);

        let mut level: Option<bool> = None;
        let mut position: u64 = 0;
        let mut edges_sent: u64 = 0;

        info!(
            "[probe{}] Starting reader thread ({} samples, {} blocks)",
            probe, total_samples, header.total_blocks
        );

        'blocks: for block in 0..header.total_blocks {
            if shutdown.load(Ordering::Relaxed) {
                debug!("[probe{}] Shutdown signal received at block {}", probe, block);
                break;
            }

            let block_start = block * header.samples_per_block;
            if block_start >= total_samples {
                break;
            }

            let data = match load_block(&archive, &blocks, probe, block) {
                Ok(data) => data,
                Err(e) => {
                    debug!("[probe{}] Block {} unavailable, stopping: {}", probe, block, e);
                    break;
                }
            };

            let in_block = ((data.len() * 8) as u64).min(total_samples - block_start);
            for index in 0..in_block as usize {
                let value = get_bit(&data, index);
                if level != Some(value) {
                    let edge = Edge::new(value.into(), position);
                    if sender.send(edge).is_err() {
                        debug!(
                            "[probe{}] All receivers disconnected at sample {}",
                            probe, position
                        );
                        break 'blocks;
                    }
                    edges_sent += 1;
                    level = Some(value);
                }
                position += 1;
            }

            if block > 0 && block % 10 == 0 {
                debug!(
                    "[probe{}] Progress: {:.1}% ({} samples, {} edges sent)",
                    probe,
                    position as f64 / total_samples as f64 * 100.0,
                    position,
                    edges_sent
                );
            }
        }

        sender.close();
        info!(
            "[probe{}] Reader complete: {} samples, {} edges sent",
            probe, position, edges_sent
        );
        completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Fetch a block from the cache, loading it from the archive on a miss
fn load_block(
    archive: &SharedArchive,
    blocks: &BlockCache,
    probe: usize,
    block: u64,
) -> Result<Arc<[u8]>> {
    let key = (probe, block);
    if let Some(data) = blocks
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(data));
    }

    let data = {
        let mut archive = archive.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = archive
            .by_name(&format!("L-{}/{}", probe, block))
            .map_err(|_| AnalyzerError::InvalidBlock(block))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Arc::<[u8]>::from(buf)
    };

    blocks
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, Arc::clone(&data));
    Ok(data)
}

/// Extract one sample from a packed block, LSB first
#[inline]
fn get_bit(data: &[u8], index: usize) -> bool {
    data.get(index / 8)
        .is_some_and(|byte| (byte >> (index % 8)) & 1 == 1)
}

/// Parse a sample rate string (e.g., "50 MHz") into Hz
fn parse_sample_rate(text: &str) -> Option<f64> {
    let mut parts = text.split_whitespace();
    let value = parts.next()?.parse::<f64>().ok()?;
    let multiplier = match parts.next()? {
        "GHz" => 1_000_000_000.0,
        "MHz" => 1_000_000.0,
        "KHz" | "kHz" => 1_000.0,
        "Hz" => 1.0,
        _ => return None,
    };
    Some(value * multiplier)
}

impl EdgeSource for DslFileSource {
    fn subscribe(&mut self, probe: usize, capacity: Option<usize>) -> Result<Receiver<Edge>> {
        if probe >= self.header.total_probes {
            return Err(AnalyzerError::InvalidProbe(probe));
        }
        Ok(self.outputs.subscribe(probe, capacity))
    }
}

impl ProcessNode for DslFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_stop(&self) -> bool {
        self.threads_spawned && self.threads_completed.load(Ordering::Relaxed) >= self.num_threads
    }

    fn is_self_threading(&self) -> bool {
        true
    }

    fn work(&mut self) -> WorkResult<usize> {
        if self.threads_spawned {
            return Err(WorkError::NodeError(
                "work() called multiple times on self-threading node".to_string(),
            ));
        }
        self.threads_spawned = true;

        info!(
            "File source: {} samples at {:.1} MHz for {} subscribers",
            self.header.total_samples,
            self.header.sample_rate_hz / 1_000_000.0,
            self.outputs.num_destinations()
        );

        let mut handles = Vec::new();
        for (probe, dest, sender) in self.outputs.split() {
            let config = ProbeReaderConfig {
                archive: Arc::clone(&self.archive),
                blocks: Arc::clone(&self.blocks),
                probe,
                header: self.header.clone(),
                sender,
                max_samples: self.max_samples,
                shutdown: Arc::clone(&self.shutdown),
                completed: Arc::clone(&self.threads_completed),
            };

            let handle = std::thread::Builder::new()
                .name(format!("dsl_probe{}_dest{}", probe, dest))
                .spawn(move || Self::probe_reader_thread(config))
                .map_err(|e| {
                    WorkError::NodeError(format!("Failed to spawn reader thread: {}", e))
                })?;
            handles.push(handle);
        }

        self.num_threads = handles.len();
        self.thread_handles = Some(handles);
        Ok(0)
    }
}

impl Drop for DslFileSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handles) = self.thread_handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

/// Everything one reader thread owns
struct ProbeReaderConfig {
    archive: SharedArchive,
    blocks: BlockCache,
    probe: usize,
    header: DslHeader,
    sender: Sender<Edge>,
    max_samples: Option<u64>,
    shutdown: Arc<AtomicBool>,
    completed: Arc<AtomicUsize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::decoders::Nrf24Analyzer;
    use crate::nodes::{SimulatedTrace, spi_cursors};
    use crate::results::ResultStore;
    use crate::runtime::{BitState, Scheduler};
    use crate::settings::ChannelMap;
    use std::io::Write;
    use std::path::PathBuf;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nrf24_{}_{}.dsl", tag, std::process::id()))
    }

    /// Dense samples of one line
    fn levels(edges: &[Edge], total: u64) -> Vec<bool> {
        let mut out = Vec::with_capacity(total as usize);
        let mut level = BitState::Low;
        let mut next = edges.iter().peekable();
        for sample in 0..total {
            while let Some(edge) = next.next_if(|e| e.start_sample <= sample) {
                level = edge.level;
            }
            out.push(level.is_high());
        }
        out
    }

    /// Pack probes into a .dsl archive with `block_samples` samples per block
    fn write_dsl(path: &Path, probes: &[Vec<bool>], rate: &str, block_samples: usize) {
        let total = probes[0].len();
        let blocks = total.div_ceil(block_samples);
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();

        let mut header = format!(
            "[header]\nversion = 2\ntotal probes = {}\nsamplerate = {}\ntotal samples = {}\ntotal blocks = {}\n",
            probes.len(),
            rate,
            total,
            blocks
        );
        for i in 0..probes.len() {
            header.push_str(&format!("probe{} = D{}\n", i, i));
        }
        zip.start_file("header", options).unwrap();
        zip.write_all(header.as_bytes()).unwrap();

        for (probe, samples) in probes.iter().enumerate() {
            for (block, chunk) in samples.chunks(block_samples).enumerate() {
                let mut packed = vec![0u8; chunk.len().div_ceil(8)];
                for (i, &bit) in chunk.iter().enumerate() {
                    if bit {
                        packed[i / 8] |= 1 << (i % 8);
                    }
                }
                zip.start_file(format!("L-{}/{}", probe, block), options)
                    .unwrap();
                zip.write_all(&packed).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_parse_sample_rate() {
        assert_eq!(parse_sample_rate("50 MHz"), Some(50_000_000.0));
        assert_eq!(parse_sample_rate("1 GHz"), Some(1_000_000_000.0));
        assert_eq!(parse_sample_rate("100 kHz"), Some(100_000.0));
        assert_eq!(parse_sample_rate("100 KHz"), Some(100_000.0));
        assert_eq!(parse_sample_rate("2.5 MHz"), Some(2_500_000.0));
        assert_eq!(parse_sample_rate("50"), None);
        assert_eq!(parse_sample_rate("50 mhz"), None);
        assert_eq!(parse_sample_rate("abc MHz"), None);
        assert_eq!(parse_sample_rate(""), None);
    }

    #[test]
    fn test_get_bit() {
        let data = [0b1010_1010, 0b1100_1100];
        assert!(!get_bit(&data, 0));
        assert!(get_bit(&data, 1));
        assert!(get_bit(&data, 7));
        assert!(!get_bit(&data, 8));
        assert!(get_bit(&data, 10));
        assert!(!get_bit(&data, 16));
    }

    #[test]
    fn test_parse_header() {
        let header = DslHeader::parse(
            "[header]\ntotal probes = 3\nsamplerate = 10 MHz\ntotal samples = 100\n\
             total blocks = 1\nprobe0 = CSN\nprobe2 = SCK\n",
        )
        .unwrap();
        assert_eq!(header.total_probes, 3);
        assert_eq!(header.sample_rate_hz, 10_000_000.0);
        assert_eq!(header.probe_names, vec!["CSN", "Probe1", "SCK"]);
        assert!((header.duration() - 0.00001).abs() < 1e-12);

        let missing = DslHeader::parse("total probes = 3\nsamplerate = 10 MHz\n");
        assert!(matches!(missing, Err(AnalyzerError::MissingField(_))));

        let bad_rate = DslHeader::parse(
            "total probes = 1\nsamplerate = fast\ntotal samples = 1\ntotal blocks = 1\n",
        );
        assert!(matches!(bad_rate, Err(AnalyzerError::ParseHeader(_))));

        let bad_count = DslHeader::parse("total probes = many\n");
        assert!(matches!(bad_count, Err(AnalyzerError::ParseError(_))));
    }

    #[test]
    fn test_open_and_read_bit() {
        let path = temp_path("read_bit");
        let probe0: Vec<bool> = (0..40).map(|i| i % 3 == 0).collect();
        let probe1: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        write_dsl(&path, &[probe0.clone(), probe1], "1 MHz", 16);

        let source = DslFileSource::open(&path).unwrap();
        let header = source.header();
        assert_eq!(header.total_probes, 2);
        assert_eq!(header.total_blocks, 3);
        assert_eq!(header.samples_per_block, 16);
        assert_eq!(header.probe_names, vec!["D0", "D1"]);

        for (i, &expected) in probe0.iter().enumerate() {
            assert_eq!(source.read_bit(0, i as u64).unwrap(), expected);
        }
        assert!(!source.read_bit(1, 19).unwrap());
        assert!(source.read_bit(1, 39).unwrap());
        assert!(matches!(source.read_bit(2, 0), Err(AnalyzerError::InvalidProbe(2))));
        assert!(matches!(source.read_bit(0, 40), Err(AnalyzerError::OutOfBounds(40))));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            DslFileSource::open(temp_path("does_not_exist")),
            Err(AnalyzerError::Io(_))
        ));
    }

    #[test]
    fn test_streams_edges_across_blocks() {
        let path = temp_path("edges");
        let samples: Vec<bool> = (0..50).map(|i| (10..30).contains(&i)).collect();
        write_dsl(&path, &[samples], "1 MHz", 8);

        let mut source = DslFileSource::open(&path).unwrap();
        let mut rx = source.subscribe(0, Some(1)).unwrap();
        assert!(matches!(
            source.subscribe(1, None),
            Err(AnalyzerError::InvalidProbe(1))
        ));
        source.work().unwrap();

        let mut edges = Vec::new();
        while let Ok(edge) = rx.recv() {
            edges.push(edge);
        }
        assert_eq!(edges, vec![Edge::low(0), Edge::high(10), Edge::low(30)]);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_max_samples_limits_stream() {
        let path = temp_path("max_samples");
        let samples: Vec<bool> = (0..64).map(|i| i % 2 == 1).collect();
        write_dsl(&path, &[samples], "1 MHz", 64);

        let mut source = DslFileSource::open(&path)
            .unwrap()
            .with_max_samples(Some(4));
        let mut rx = source.subscribe(0, None).unwrap();
        source.work().unwrap();

        let mut edges = Vec::new();
        while let Ok(edge) = rx.recv() {
            edges.push(edge);
        }
        assert_eq!(
            edges,
            vec![Edge::low(0), Edge::high(1), Edge::low(2), Edge::high(3)]
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_decodes_demo_capture() {
        let path = temp_path("demo");
        let trace = SimulatedTrace::demo();
        let channels = ChannelMap {
            mosi: 0,
            miso: 1,
            sck: 2,
            csn: 3,
        };
        let total = trace.end_sample;
        let probes = vec![
            levels(&trace.mosi, total),
            levels(&trace.miso, total),
            levels(&trace.sck, total),
            levels(&trace.csn, total),
        ];
        write_dsl(&path, &probes, "20 MHz", 1024);

        let mut source = DslFileSource::open(&path).unwrap();
        let cursors = spi_cursors(&mut source, &channels, Some(256)).unwrap();
        let store = Arc::new(Mutex::new(ResultStore::new()));
        let analyzer = Nrf24Analyzer::new(cursors, channels, Arc::clone(&store));

        let mut scheduler = Scheduler::new();
        scheduler.start_process(Box::new(source));
        scheduler.start_process(Box::new(analyzer));
        scheduler.wait();

        let mut expected = Nrf24Analyzer::new(trace.cursors(), channels, ResultStore::new());
        expected.run();

        let store = store.lock().unwrap();
        assert_eq!(store.committed_transactions(), 14);
        assert_eq!(store.frames(), expected.sink().frames());
        assert_eq!(
            store.transactions().collect::<Vec<_>>(),
            expected.sink().transactions().collect::<Vec<_>>()
        );

        std::fs::remove_file(&path).ok();
    }
}
