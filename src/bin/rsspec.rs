use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use rspectra::{
    Registry, SourceConfig, Spectrogram, linear_time,
    sources::{eovsa, fits::FitsReader},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Spectrogram files, directories or glob patterns to read
    #[arg(value_name = "INPUT", required = true)]
    input: Vec<String>,
    /// JSON source config overriding the EOVSA defaults
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Only keep channels within this frequency range
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    clip_freq: Option<Vec<f64>>,
    /// Subtract the per-channel mean
    #[arg(long)]
    subtract_bg: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let custom;
    let registry: &Registry = match &args.config {
        Some(path) => {
            let config = SourceConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            log::debug!("Using source config {:?}", config);
            custom = Arc::new(eovsa::Eovsa::with_config(Arc::new(FitsReader), config))
                .registry(linear_time::registry());
            &custom
        }
        None => eovsa::registry(),
    };

    let spectrograms = args
        .input
        .iter()
        .map(|input| {
            registry
                .create_from(input.as_str())
                .with_context(|| format!("Failed to read {input}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut spectrogram =
        Spectrogram::join_many(&spectrograms).context("Failed to join spectrograms")?;

    if let Some([min, max]) = args.clip_freq.as_deref() {
        spectrogram = spectrogram
            .clip_freq(*min, *max)
            .context("Failed to clip frequency range")?;
    }
    if args.subtract_bg {
        spectrogram = spectrogram.subtract_bg();
    }

    let summary = spectrogram.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.content);
        println!("  instruments: {:?}", summary.instruments);
        println!("  start:       {}", summary.start);
        println!("  end:         {}", summary.end);
        println!("  t_init:      {} s", summary.t_init);
        println!("  t_delt:      {} s", summary.t_delt);
        println!("  shape:       {} x {}", summary.nfreq, summary.ntime);
        println!(
            "  {}: {} .. {}",
            spectrogram.f_label(),
            summary.freq_range.0,
            summary.freq_range.1
        );
        println!(
            "  intensity:   {} .. {}",
            summary.intensity_bounds.0, summary.intensity_bounds.1
        );
    }

    Ok(())
}
