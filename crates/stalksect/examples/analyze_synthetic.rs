use std::error::Error;

use stalksect::{
    prepare_bases, run_analysis, synthesize_population, AnalysisConfig, SynthConfig,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let stalks: u32 = match args.get(1) {
        Some(s) => s.parse()?,
        None => 50,
    };

    let mut repo = synthesize_population(&SynthConfig {
        stalks_per_slice: stalks,
        ..Default::default()
    })?;

    let config = AnalysisConfig {
        n_components: Some(3),
        ..Default::default()
    };
    prepare_bases(&mut repo, config.interior)?;
    let report = run_analysis(&repo, &config)?;

    println!(
        "{} samples analyzed, {} components at the deepest level.",
        report.n_samples_used, report.n_components
    );
    for level in &report.summary.levels {
        println!(
            "  {:<14} median {:>7.3}%   |median| {:>6.3}%",
            level.case, level.percentiles[2], level.abs_median
        );
    }
    Ok(())
}
