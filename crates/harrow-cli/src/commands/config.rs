//! Configuration display.

use anyhow::{Context, Result};
use harrow_config::HarrowConfig;

pub fn show_toml(config: &HarrowConfig) -> Result<()> {
    let rendered = config
        .to_toml()
        .context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

pub fn show_text(config: &HarrowConfig) -> Result<()> {
    let schema = config.schema_spec()?;

    println!("harrow Configuration");
    println!("====================\n");

    println!("Run:");
    println!("  Seed: {}", config.run.seed);
    println!("  Max lts: {}", config.run.max_lts);
    println!(
        "  Workers: {}",
        match config.run.workers {
            0 => "auto".to_string(),
            n => n.to_string(),
        }
    );
    println!("  Failure policy: {:?}", config.run.failure_policy);
    println!("  Consistency: {}", config.run.consistency);
    println!();

    println!("Partitions:");
    println!("  Window size: {}", config.partitions.window_size);
    println!(
        "  Slide after repeats: {}",
        config.partitions.slide_after_repeats
    );
    println!();

    println!("Selector:");
    println!(
        "  Max partition size: {}",
        config.selector.max_partition_size
    );
    for (kind, weight) in &config.selector.operation_weights {
        println!("  {kind}: {weight}");
    }
    println!();

    println!("Clock:");
    println!(
        "  Base: {}",
        config
            .clock
            .base
            .map_or("wall clock".to_string(), |b| b.to_string())
    );
    println!();

    println!("Operation log:");
    println!(
        "  Path: {}",
        config
            .log
            .operation_log
            .as_ref()
            .map_or("none".to_string(), |p| p.display().to_string())
    );
    println!();

    println!("Schema:");
    println!("  {schema}");
    println!();

    println!("Validation:");
    println!("  Corrupt: {}", config.validation.corrupt);
    println!("  Corruptor: {:?}", config.validation.corruptor);
    println!("  Partitions: {}", config.validation.partitions);

    Ok(())
}
