// Example usage of the RHD reader

use rhd_reader::{Annotated, GroupKind, ReadOptions, RhdReader};
use std::env;
use tracing::{info, Level};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "data/recording.rhd".to_string());
    let options = match env::args().nth(2) {
        Some(config) => ReadOptions::from_json_file(config)?,
        None => ReadOptions::default(),
    };

    let reader = RhdReader::open_with_options(&path, options)?;
    info!("Header: {}", serde_json::to_string_pretty(&reader.header().summary())?);

    // Lazy read: nothing but the digital words is decoded yet
    let block = reader.read_block(true, true)?;
    if let Some(datetime) = block.rec_datetime {
        info!("Recorded at {}", datetime);
    }
    if let Some(note) = block.annotation_str("note1") {
        info!("Note: {}", note);
    }

    for group in &block.channel_groups {
        info!(
            "  [{}] {} channels at {} Hz",
            group.name,
            group.num_channels(),
            group.sampling_rate
        );
    }

    let segment = &block.segments[0];
    if let Some(amp) = segment.signal(GroupKind::Amplifier)? {
        info!(
            "Amplifier: {} channels x {} samples ({:.3} s, {})",
            amp.num_channels(),
            amp.num_samples(),
            amp.duration(),
            amp.units.symbol()
        );
        if let Some(first) = amp.channel(0) {
            let peak = first.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            info!("  Peak on first channel: {:.1} uV", peak);
        }
    }

    for events in segment.event_sets()? {
        info!("{}: {} rising edges", events.channel_name, events.len());
    }

    Ok(())
}
