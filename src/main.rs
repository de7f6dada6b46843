//! vp8lite CLI
//!
//! Encodes raw RGB24 frames into IVF, decodes IVF back to raw RGB24 and
//! describes IVF files.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vp8lite::codec::{Decoder, Encoder, PlanarImage, VideoFrame, Vp8EncoderConfig};
use vp8lite::format::{IvfHeader, IvfReader, IvfWriter};
use vp8lite::{init, Config, Error, Vp8Decoder, Vp8Encoder};

#[derive(Parser)]
#[command(name = "vp8lite")]
#[command(about = "vp8lite - intra-centric VP8 encoder and decoder", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Threads for color conversion
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode raw RGB24 frames into an IVF file
    Encode {
        /// Raw RGB24 input, frames back to back
        #[arg(short, long)]
        input: PathBuf,

        /// IVF output path
        #[arg(short, long)]
        output: PathBuf,

        /// Frame width
        #[arg(long)]
        width: u32,

        /// Frame height
        #[arg(long)]
        height: u32,

        /// Quantizer index (0-127)
        #[arg(short, long)]
        quant: Option<u8>,

        /// Frames between keyframes (0 = first frame only)
        #[arg(short, long)]
        keyframe_interval: Option<u32>,

        /// Encoder settings as JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Decode an IVF file into raw RGB24 frames
    Decode {
        /// IVF input path
        #[arg(short, long)]
        input: PathBuf,

        /// Raw RGB24 output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the header and frames of an IVF file
    Info {
        /// IVF input path
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config {
        max_threads: cli.threads,
        verbose: cli.verbose,
        debug: cli.debug,
    };

    init(config)?;

    info!("vp8lite v{}", vp8lite::VERSION);

    match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            quant,
            keyframe_interval,
            config,
        } => {
            let mut settings = match config {
                Some(path) => load_encoder_config(&path)?,
                None => Vp8EncoderConfig::default(),
            };
            settings.width = width;
            settings.height = height;
            if let Some(q) = quant {
                settings.quant_index = q;
            }
            if let Some(interval) = keyframe_interval {
                settings.keyframe_interval = interval;
            }

            info!("Encoding {} -> {}", input.display(), output.display());
            cmd_encode(&input, &output, settings)?;
        }
        Commands::Decode { input, output } => {
            info!("Decoding {} -> {}", input.display(), output.display());
            cmd_decode(&input, &output)?;
        }
        Commands::Info { input } => {
            cmd_info(&input)?;
        }
    }

    Ok(())
}

fn load_encoder_config(path: &Path) -> anyhow::Result<Vp8EncoderConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

/// Fill `buf` completely, false on a clean end of input
fn read_frame(reader: &mut impl Read, buf: &mut [u8]) -> anyhow::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => bail!("Input ends inside a frame ({} of {} bytes)", filled, buf.len()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

fn cmd_encode(input: &Path, output: &Path, settings: Vp8EncoderConfig) -> anyhow::Result<()> {
    let (width, height) = (settings.width, settings.height);
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        bail!("{}x{} does not fit an IVF header", width, height);
    }

    let header = IvfHeader::vp8(width as u16, height as u16, settings.timebase);
    let mut encoder = Vp8Encoder::with_config(settings)?;

    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    let sink = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = IvfWriter::new(BufWriter::new(sink), header)?;

    let mut rgb = vec![0u8; width as usize * height as usize * 3];
    let mut total_bytes = 0usize;
    while read_frame(&mut reader, &mut rgb)? {
        let frame = VideoFrame::new(PlanarImage::from_rgb(&rgb, width, height)?);
        encoder.send_frame(&frame)?;
        loop {
            match encoder.receive_packet() {
                Ok(packet) => {
                    total_bytes += packet.size();
                    writer.write_packet(&packet)?;
                }
                Err(Error::TryAgain) => break,
                Err(e) => return Err(e.into()),
            }
        }
    }
    encoder.flush()?;

    let frames = writer.frame_count();
    writer.finish()?;
    println!("Encoded {} frames ({} bytes of VP8 data)", frames, total_bytes);
    Ok(())
}

fn cmd_decode(input: &Path, output: &Path) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let reader = IvfReader::new(BufReader::new(file))?;
    if !reader.header().is_vp8() {
        warn!("Decoding {} stream as VP8", reader.header().fourcc_str());
    }

    let mut out = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );
    let mut decoder = Vp8Decoder::new();
    let mut shown = 0u32;
    let mut size = None;

    for packet in reader {
        let packet = packet?;
        decoder
            .send_packet(&packet)
            .with_context(|| format!("Failed to decode frame at byte {}", packet.position))?;
        loop {
            match decoder.receive_frame() {
                Ok(frame) => {
                    let dims = (frame.width(), frame.height());
                    if size.is_some_and(|s| s != dims) {
                        warn!("Frame size changed to {}x{}", dims.0, dims.1);
                    }
                    size = Some(dims);
                    out.write_all(&frame.image.to_rgb())?;
                    shown += 1;
                }
                Err(Error::TryAgain) => break,
                Err(e) => return Err(e.into()),
            }
        }
    }
    decoder.flush()?;
    out.flush()?;

    match size {
        Some((w, h)) => println!("Decoded {} frames of {}x{} RGB24", shown, w, h),
        None => println!("No frames decoded"),
    }
    Ok(())
}

fn cmd_info(input: &Path) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let reader = IvfReader::new(BufReader::new(file))?;
    let header = *reader.header();

    println!("File: {}", input.display());
    println!("  Codec: {}", header.fourcc_str());
    println!("  Resolution: {}x{}", header.width, header.height);
    println!("  Time Base: {}", header.timebase);
    println!("  Frames (header): {}", header.frame_count);
    println!();

    let mut keyframes = 0;
    let mut total = 0usize;
    for packet in reader {
        let packet = packet?;
        let kind = if packet.is_keyframe() { "key" } else { "inter" };
        let hidden = if packet.flags.hidden { " hidden" } else { "" };
        println!(
            "  #{:<5} pts {:<8} {:>8} bytes  {}{}",
            total,
            packet.pts,
            packet.size(),
            kind,
            hidden
        );
        if packet.is_keyframe() {
            keyframes += 1;
        }
        total += 1;
    }

    println!();
    println!(
        "Frames: {} ({} keyframes), {:.2}s",
        total,
        keyframes,
        total as f64 * header.timebase.to_f64()
    );
    if total != header.frame_count as usize {
        warn!(
            "Header lists {} frames but the file holds {}",
            header.frame_count, total
        );
    }
    Ok(())
}
