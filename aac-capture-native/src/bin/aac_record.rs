//! Record the default (or a named) input device to an ADTS `.aac` file.
//!
//! ```text
//! RUST_LOG=info aac-record --output take.aac --seconds 10
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;

use aac_capture_core::storage::metadata::{metadata_path, write_metadata};
use aac_capture_core::{
    AacPacket, AdtsFileWriter, CaptureError, CapturePipeline, PipelineDelegate, SessionConfiguration,
    StreamMetadata,
};
use aac_capture_native::{CpalInput, FdkEncoderFactory};

#[derive(Parser, Debug)]
#[command(name = "aac-record", about = "Capture live audio to an ADTS AAC file")]
struct Args {
    /// Output file
    #[arg(short, long, default_value = "capture.aac")]
    output: PathBuf,

    /// Recording length in seconds
    #[arg(short, long, default_value_t = 10)]
    seconds: u64,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Channel count (1 or 2)
    #[arg(long)]
    channels: Option<u8>,

    /// AAC bitrate in bits per second
    #[arg(long)]
    bitrate: Option<u32>,

    /// Input device name (default input if omitted)
    #[arg(short, long)]
    device: Option<String>,

    /// JSON session configuration; flags above override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,
}

struct FileDelegate {
    writer: Mutex<Option<AdtsFileWriter>>,
    failures: Mutex<u64>,
}

impl PipelineDelegate for FileDelegate {
    fn on_packet(&self, packet: AacPacket) {
        if let Some(writer) = self.writer.lock().as_mut() {
            if let Err(e) = writer.write_packet(&packet) {
                log::error!("{}", e);
                *self.failures.lock() += 1;
            }
        }
    }

    fn on_error(&self, error: CaptureError) {
        eprintln!("capture error: {}", error);
        *self.failures.lock() += 1;
    }
}

fn session_config(args: &Args) -> Result<SessionConfiguration, CaptureError> {
    let mut config = match args.config {
        Some(ref path) => SessionConfiguration::load(path)?,
        None => SessionConfiguration::default(),
    };
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(channels) = args.channels {
        config.channels = channels;
    }
    if let Some(bitrate) = args.bitrate {
        config.bitrate = bitrate;
    }
    Ok(config)
}

fn run(args: Args) -> Result<(), CaptureError> {
    if args.list_devices {
        for name in CpalInput::input_device_names()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = session_config(&args)?;
    let format = config.audio_format();
    let bitrate = config.bitrate;

    let input = match args.device {
        Some(ref name) => CpalInput::with_device(name.clone()),
        None => CpalInput::default_device(),
    };
    let delegate = Arc::new(FileDelegate {
        writer: Mutex::new(Some(AdtsFileWriter::create(&args.output)?)),
        failures: Mutex::new(0),
    });

    let pipeline = CapturePipeline::new(input, Arc::new(FdkEncoderFactory), config)?;
    pipeline.set_delegate(delegate.clone());

    pipeline.start()?;
    println!(
        "recording {} s at {} Hz, {} ch, {} bps → {}",
        args.seconds,
        format.sample_rate,
        format.channels,
        bitrate,
        args.output.display()
    );
    thread::sleep(Duration::from_secs(args.seconds));
    pipeline.stop()?;
    pipeline.flush_callbacks();

    let diagnostics = pipeline.diagnostics();
    log::info!("{:?}", diagnostics);

    let Some(writer) = delegate.writer.lock().take() else {
        return Err(CaptureError::Storage("output writer already closed".into()));
    };
    let summary = writer.finish()?;
    let metadata = StreamMetadata::new(&args.output, format, bitrate, &summary);
    write_metadata(&metadata, &args.output)?;

    println!(
        "wrote {} packets, {:.2} s, sha256 {}",
        summary.packet_count, summary.duration_secs, summary.checksum
    );
    println!("metadata: {}", metadata_path(&args.output).display());

    let failures = *delegate.failures.lock();
    if failures > 0 {
        eprintln!("{} errors during capture", failures);
    }
    if let Some(error) = pipeline.state().error() {
        return Err(error.clone());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("aac-record: {}", e);
        std::process::exit(1);
    }
}
