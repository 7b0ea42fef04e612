//! busdecode-rs - Command Line Entry Point
//!
//! Decodes a text capture with the decoders of a session file and/or
//! settings strings and prints the events as a table or as JSON.

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use busdecode_rs::{
    capture::CaptureData,
    config::{DecoderConfig, DecoderNamer, SessionFile},
    decoder::Decoder,
    format::{EventFormatter, EventLabel},
    types::{CursorId, DataFormat, Protocol},
};
use serde::Serialize;
use std::fs::File;
use std::io::{stdin, stdout, BufRead, BufReader, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, FromArgs)]
/// Decode I2C, UART and SPI traffic from a logic analyzer capture.
/// The capture is a text file with one row of 0/1 columns per sample;
/// use '-' to read it from standard input.
struct CliArgs {
    /// session file with channels, cursors and decoders
    #[argh(option, short = 's')]
    session: Option<String>,
    /// decoder settings string, may be repeated
    #[argh(option, short = 'd')]
    decoder: Vec<String>,
    /// sample rate in Hz, overrides the session
    #[argh(option, short = 'r')]
    sample_rate: Option<u32>,
    /// display format for all decoders: hex, dec or ascii
    #[argh(option, short = 'f')]
    format: Option<DataFormat>,
    /// print events as JSON
    #[argh(switch)]
    json: bool,
    /// capture file
    #[argh(positional)]
    capture: String,
}

/// Events of one decoder as printed with `--json`
#[derive(Debug, Serialize)]
struct DecoderReport {
    name: String,
    protocol: Protocol,
    events: Vec<EventLabel>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,busdecode_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: CliArgs = argh::from_env();

    let session = match &args.session {
        Some(path) => {
            tracing::info!("Loading session from {}", path);
            SessionFile::load(path)?
        }
        None => SessionFile::default(),
    };

    let Some(sample_rate) = args.sample_rate.or(session.sample_rate) else {
        bail!("no sample rate: pass --sample-rate or set sample_rate in the session");
    };

    let mut capture = read_capture(&args.capture, sample_rate)?;
    session.apply_to(&mut capture);
    tracing::info!(
        "Capture has {} samples on {} channels at {} Hz",
        capture.sample_count(),
        capture.channel_ids().len(),
        sample_rate
    );

    if let Some((channel, condition)) = session.trigger_channel() {
        match capture.find_trigger(channel, condition) {
            Some(position) => {
                tracing::info!(
                    "Trigger on {} ({}) at sample {}",
                    channel,
                    condition.display_name(),
                    position
                );
                capture.set_cursor(CursorId::TRIGGER, Some(position));
            }
            None => tracing::warn!("Trigger condition on {} never met", channel),
        }
    }

    let configs = collect_configs(&session, &args.decoder)?;
    if configs.is_empty() {
        bail!("no decoders: pass --decoder or add decoders to the session");
    }

    let mut reports = Vec::with_capacity(configs.len());
    for config in configs {
        let mut decoder = Decoder::from_config(config);
        let count = decoder.analyze(&capture);
        tracing::info!("{}: {} events", decoder.name(), count);

        let formatter = EventFormatter::new(args.format.unwrap_or(decoder.format()));
        reports.push(DecoderReport {
            name: decoder.name().to_string(),
            protocol: decoder.protocol(),
            events: decoder.labels_with(&formatter),
        });
    }

    let stdout = stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &reports)?;
        writeln!(out)?;
    } else {
        for report in &reports {
            print_report(&mut out, report)?;
        }
    }

    Ok(())
}

fn read_capture(path: &str, sample_rate: u32) -> Result<CaptureData> {
    let reader: Box<dyn BufRead> = if path == "-" {
        Box::new(BufReader::new(stdin()))
    } else {
        let file = File::open(path).with_context(|| format!("cannot open capture {}", path))?;
        Box::new(BufReader::new(file))
    };
    CaptureData::from_reader(sample_rate, reader)
        .with_context(|| format!("cannot read capture {}", path))
}

/// Session decoders first, then the ones from the command line
fn collect_configs(session: &SessionFile, settings: &[String]) -> Result<Vec<DecoderConfig>> {
    let mut namer = DecoderNamer::new();
    let mut configs = session.decoder_configs_with(&mut namer)?;

    for text in settings {
        let mut config = DecoderConfig::from_settings_string(text)
            .with_context(|| format!("bad --decoder '{}'", text))?;
        config.validate()?;
        namer.name_if_empty(&mut config);
        configs.push(config);
    }

    Ok(configs)
}

fn print_report(out: &mut impl Write, report: &DecoderReport) -> Result<()> {
    writeln!(out, "== {} ({}) ==", report.name, report.protocol)?;
    for label in &report.events {
        let stop = label
            .stop
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        let marker = if label.is_error { "!" } else { " " };
        writeln!(
            out,
            "{:>10} {:>10} {}{:<10} {}",
            label.start, stop, marker, label.short_text, label.long_text
        )?;
    }
    writeln!(out)?;
    Ok(())
}
