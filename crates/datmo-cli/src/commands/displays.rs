//! Display preset listing command

use anyhow::Result;
use datmo_display::{DisplayConfig, DisplayFunction, DisplayModel};

pub fn run() -> Result<()> {
    println!("{:<12} {:>10} {:>10} {:>8}", "preset", "black", "peak", "range");
    for name in DisplayConfig::PRESETS {
        let Some(config) = DisplayConfig::preset(name) else {
            continue;
        };
        let display = DisplayModel::from_config(&config)?;
        println!(
            "{:<12} {:>10.3} {:>10.1} {:>8.3}",
            name,
            display.min_luminance(),
            display.max_luminance(),
            display.dynamic_range()
        );
    }
    Ok(())
}
