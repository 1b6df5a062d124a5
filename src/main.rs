use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use vraw::io_stream::VrawReader;
use vraw::{FileHeader, VrawError};

#[derive(Parser)]
#[command(name = "vraw", version, about = "Inspect VRAW raw video recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file header fields
    Info {
        input: PathBuf,
        /// Print the header as JSON
        #[arg(long)]
        json: bool,
    },
    /// List per-frame metadata
    Frames {
        input: PathBuf,
    },
    /// Walk frame headers from the start of the file, ignoring the index
    Scan {
        input: PathBuf,
    },
    /// Decode every frame and report the ones that fail
    Verify {
        input: PathBuf,
    },
    /// Summarize the audio stream
    Audio {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .try_init();

    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let reader = VrawReader::open(&input)?;
            let h = reader.file_header();
            if json {
                println!("{}", serde_json::to_string_pretty(h)?);
                return Ok(());
            }
            print_header(&input, h, reader.frame_count());
            if let Some(report) = reader.recovery() {
                println!("  Recovered      {}", report.summary());
            }
        }

        // ── Frames ───────────────────────────────────────────────────────────
        Commands::Frames { input } => {
            let mut reader = VrawReader::open(&input)?;
            println!("{:>6} {:>14} {:>10} {:>10} {:>8} {:>8}  {:<17} Black",
                     "Frame", "Timestamp us", "Stored", "Raw", "ISO", "Exp ms", "WB r/g/b");
            for i in 0..reader.frame_count() {
                let f = reader.read_frame_header(i)?;
                println!("{:>6} {:>14} {:>10} {:>10} {:>8.0} {:>8.2}  {:<17} {:?}",
                    f.frame_number, f.timestamp_us, f.payload_size(), f.uncompressed_size,
                    f.iso, f.exposure_time_ms,
                    format!("{:.2}/{:.2}/{:.2}", f.white_balance[0], f.white_balance[1], f.white_balance[2]),
                    f.dynamic_black_level);
            }
        }

        // ── Scan ─────────────────────────────────────────────────────────────
        Commands::Scan { input } => {
            let mut reader = VrawReader::open(&input)?;
            let report = reader.scan()?;
            println!("{}", report.summary());
            println!("  Scan limit     {} B of {} B", report.scan_limit, reader.file_len());
            if report.frames_recovered() != reader.frame_count() {
                println!("  Index lists {} frame(s); scan found {}",
                         reader.frame_count(), report.frames_recovered());
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let mut reader = VrawReader::open(&input)?;
            let expected = reader.file_header().pixel_count();
            let mut bad = 0usize;
            for i in 0..reader.frame_count() {
                match reader.read_frame(i) {
                    Ok(frame) if frame.samples.len() == expected => {}
                    Ok(frame) => {
                        bad += 1;
                        println!("  frame {i}: {} of {expected} samples", frame.samples.len());
                    }
                    Err(e) => {
                        bad += 1;
                        println!("  frame {i}: {e}");
                    }
                }
            }
            println!("{} frame(s) checked, {bad} invalid", reader.frame_count());
            if bad > 0 {
                std::process::exit(1);
            }
        }

        // ── Audio ────────────────────────────────────────────────────────────
        Commands::Audio { input } => {
            let mut reader = VrawReader::open(&input)?;
            match reader.read_audio() {
                Ok(track) => {
                    let a = track.header;
                    println!("  Sample rate    {} Hz", a.sample_rate);
                    println!("  Channels       {}", a.channels);
                    println!("  Bit depth      {}", a.bit_depth);
                    println!("  Samples        {} per channel", a.sample_count);
                    println!("  Duration       {:.3} s", a.duration_secs());
                    println!("  Start          {} us", a.start_time_us);
                }
                Err(VrawError::NoAudio) => println!("No audio stream"),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn print_header(path: &Path, h: &FileHeader, frames: usize) {
    println!("── VRAW recording ───────────────────────────────────────");
    println!("  Path           {}", path.display());
    println!("  Magic          {}{}", String::from_utf8_lossy(&h.magic),
             if h.is_legacy() { " (legacy)" } else { "" });
    println!("  Version        {}", h.version);
    println!("  Frame size     {}x{}", h.width, h.height);
    println!("  Sensor size    {}x{} (binning {}:{})",
             h.native_width, h.native_height, h.binning_num, h.binning_den);
    println!("  Bayer          {:?}", h.bayer_pattern);
    println!("  Encoding       {}", h.encoding.name());
    println!("  Compression    {:?}", h.compression);
    println!("  Black level    {:?}", h.black_level);
    println!("  White level    {}", h.white_level);
    println!("  Orientation    {} deg", h.sensor_orientation);
    println!("  Frames         {frames} (header says {})", h.frame_count);
    println!("  Index offset   {} B", h.index_offset);
    if let Some(tc) = h.timecode {
        println!("  Timecode       {:02}:{:02}:{:02}:{:02} @ {} fps{}",
                 tc.hours, tc.minutes, tc.seconds, tc.frames, tc.fps,
                 if tc.drop_frame { " DF" } else { "" });
    }
    match h.audio {
        Some(a) => println!("  Audio          {} Hz, {} ch, {}-bit at {} B",
                            a.sample_rate, a.channels, a.bit_depth, a.offset),
        None    => println!("  Audio          none"),
    }
}
