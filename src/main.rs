// src/main.rs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use blackbox_analysis::axis_names::Axis;
use blackbox_analysis::config::AnalysisConfig;
use blackbox_analysis::data_analysis::calc_step_response::StepResponseResult;
use blackbox_analysis::data_input::csv_reader::read_decoded_csv_file;
use blackbox_analysis::error::AnalysisResult;
use blackbox_analysis::logging::{init_logging, LogConfig};
use blackbox_analysis::session::{AnalysisKind, AnalysisOutput, AnalysisRequest, Workspace};
use blackbox_analysis::signal_table::{self, SignalKey, SignalTable};

/// Summarise a decoded blackbox CSV: schema, sample rate, PSD peaks,
/// spectrogram dimensions, step response, tracking-error spread and
/// throttle noise.
#[derive(Parser, Debug)]
#[command(name = "blackbox-analysis", version, about)]
struct Cli {
    /// Decoded CSV produced by blackbox_decode
    input: PathBuf,

    /// Axes to analyse (roll, pitch, yaw); all when omitted
    #[arg(short, long = "axis", value_name = "AXIS")]
    axes: Vec<Axis>,

    /// Spectrogram window in samples (power of two)
    #[arg(short, long)]
    window: Option<usize>,

    /// JSON file overriding analysis settings
    #[arg(long, value_name = "FILE")]
    json_config: Option<PathBuf>,

    /// Debug-level logging with source locations
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Analysis failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> AnalysisResult<AnalysisConfig> {
    let mut config = match &cli.json_config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };
    if cli.verbose {
        config.logging = LogConfig::verbose();
    }
    if let Some(window) = cli.window {
        config.spectrogram.window_size = window;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> AnalysisResult<()> {
    let config = load_config(cli)?;
    init_logging(&config.logging);

    let axes: Vec<Axis> = if cli.axes.is_empty() { Axis::ALL.to_vec() } else { cli.axes.clone() };

    println!("Reading {}", cli.input.display());
    let (raw_table, raw_header) = read_decoded_csv_file(&cli.input)?;
    let table = signal_table::load(&raw_table, &raw_header)?;
    print_overview(&table);

    let spectrogram_config = config.spectrogram.clone();
    let workspace = Workspace::new(config);
    let handle = workspace.insert(table);
    let table = workspace.table(handle)?;

    let mut requests = Vec::new();
    for &axis in &axes {
        requests.push(AnalysisRequest::new(handle, AnalysisKind::Psd { axis }));
        requests.push(AnalysisRequest::new(
            handle,
            AnalysisKind::Spectrogram { axis, config: spectrogram_config.clone() },
        ));
    }
    requests.push(AnalysisRequest::new(handle, AnalysisKind::StepResponse { axes: axes.clone() }));
    requests.push(AnalysisRequest::new(handle, AnalysisKind::ErrorHistogram { axes: axes.clone() }));
    if table.contains(&SignalKey::Throttle) {
        for &axis in &axes {
            requests.push(AnalysisRequest::new(handle, AnalysisKind::ThrottleNoise { axis }));
        }
    }
    let d_keys: Vec<SignalKey> = axes
        .iter()
        .filter(|&&a| table.contains(&SignalKey::gyro_raw(a)))
        .map(|&a| SignalKey::DTermUnfiltered(a))
        .collect();
    if !d_keys.is_empty() {
        requests.push(AnalysisRequest::new(handle, AnalysisKind::Derived { keys: d_keys }));
    }

    let results = workspace.run_batch(&requests);
    for (request, result) in requests.iter().zip(results) {
        match (&request.kind, result) {
            (AnalysisKind::Psd { axis }, Ok(AnalysisOutput::Psd { full, zoomed })) => {
                println!("\n--- PSD {} ---", axis.name());
                match full.peak() {
                    Some((freq, power)) => println!("  Peak: {:.1} Hz ({:.2} dB)", freq, 10.0 * power.max(1e-12).log10()),
                    None => println!("  No peak found"),
                }
                if let Some((freq, _)) = zoomed.peak() {
                    println!("  Peak below {:.0} Hz: {:.1} Hz", workspace.config().psd.zoom_max_hz, freq);
                }
            }
            (AnalysisKind::Spectrogram { axis, .. }, Ok(AnalysisOutput::Spectrogram(result))) => {
                println!("\n--- Spectrogram {} ---", axis.name());
                println!(
                    "  {} time bins x {} frequency bins (window {}, step {})",
                    result.time_bins, result.frequency_bins, result.window_size, result.step
                );
            }
            (AnalysisKind::StepResponse { .. }, Ok(AnalysisOutput::StepResponse(results))) => {
                for (axis, result) in &results {
                    match result {
                        Ok(result) => print_step_response(result),
                        Err(e) => println!("\n  Skipping step response {}: {}", axis.name(), e),
                    }
                }
            }
            (AnalysisKind::Derived { .. }, Ok(AnalysisOutput::Derived(derived))) => {
                println!("\n--- Unfiltered D-term ---");
                for (key, series) in &derived {
                    let peak = series.series.values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
                    println!("  {}: peak |D| {:.1} ({:?})", key, peak, series.provenance);
                }
            }
            (AnalysisKind::ThrottleNoise { axis }, Ok(AnalysisOutput::ThrottleNoise(noise))) => {
                println!("\n--- Throttle Noise {} ---", axis.name());
                let busiest = noise
                    .throttle_counts
                    .iter()
                    .enumerate()
                    .max_by_key(|&(_, count)| *count)
                    .map_or(0, |(bin, _)| bin);
                println!(
                    "  {} frames of {} samples; most frames at {:.0}% throttle; peak {:.2}",
                    noise.frame_count, noise.frame_len, noise.throttle_edges[busiest], noise.max_value
                );
            }
            (AnalysisKind::ErrorHistogram { .. }, Ok(AnalysisOutput::ErrorHistograms(set))) => {
                println!("\n--- Tracking Error Distribution (range {:.1} .. {:.1} deg/s) ---", set.range.0, set.range.1);
                for (axis, histogram) in &set.histograms {
                    println!(
                        "  {}: mean {:.2}, std {:.2}, {} outliers removed",
                        axis.name(),
                        histogram.samples.mean,
                        histogram.samples.std_dev,
                        histogram.samples.outliers_removed
                    );
                }
            }
            (kind, Err(e)) => println!("\n  Skipping {:?}: {}", kind, e),
            (kind, Ok(_)) => println!("\n  Unexpected output for {:?}", kind),
        }
    }
    Ok(())
}

fn print_overview(table: &SignalTable) {
    println!("\n--- Schema Resolution ---");
    for (key, column) in table.schema().iter() {
        let legacy = if table.schema().used_legacy(key) { " (legacy)" } else { "" };
        println!("  {:<22} <- '{}'{}", key.to_string(), column, legacy);
    }
    println!("Rows: {}  Duration: {:.2} s", table.row_count, table.duration_s);
    match table.sample_interval() {
        Ok(_) => println!("Estimated Sample Rate: {:.2} Hz", table.sample_rate_hz),
        Err(_) => println!("Warning: Could not determine sample rate."),
    }

    let header = table.header();
    println!("Firmware: {:?}", header.firmware_type);
    for axis in Axis::ALL {
        let summary = header.axis(axis).format_summary(header.firmware_type);
        if !summary.is_empty() {
            println!("  {}: {}", axis.name(), summary);
        }
    }
}

fn fmt_opt(value: Option<f64>, scale: f64, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}{}", v * scale, unit))
}

fn print_step_response(result: &StepResponseResult) {
    println!("\n--- Step Response {} ---", result.axis.name());
    println!(
        "  Windows: {} useful of {} detected",
        result.useful_window_count, result.total_window_count
    );
    if result.insufficient_data {
        println!("  Warning: too few useful step windows; statistics are indicative only.");
    }
    println!("  Rise time:     {}", fmt_opt(result.rise_time, 1000.0, " ms"));
    println!("  Delay:         {}", fmt_opt(result.delay_time, 1000.0, " ms"));
    println!("  Overshoot:     {}", fmt_opt(result.overshoot_pct, 1.0, " %"));
    println!("  Settling time: {}", fmt_opt(result.settling_time, 1000.0, " ms"));
    println!("  Peak:          {}", fmt_opt(result.peak_value, 1.0, ""));
}
