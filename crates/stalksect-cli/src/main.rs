//! stalksect CLI — command-line interface for stalk cross-section analysis.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use stalksect::{
    fit_boundary, prepare_bases, run_analysis, section_case, synthesize_population,
    AnalysisConfig, AnalysisReport, ApproximationCase, BasisChannel, FitOptions, FitResult,
    InteriorPolicy, MomentConfig, SampleKey, SectionRepo, SectionRow, StiffnessConfig,
    SynthConfig, SynthRanges,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "stalksect")]
#[command(
    about = "Analyze stalk cross-section populations: synthesize, fit, reconstruct, and score stiffness approximations"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a seeded synthetic population store.
    Synth(CliSynthArgs),

    /// Score ellipse-plus-component stiffness approximations over a store.
    Analyze(CliAnalyzeArgs),

    /// Fit boundary parameters to one stored sample's exterior outline.
    Fit(CliFitArgs),

    /// Export one sample as a closed-outline section case.
    Export(CliExportArgs),

    /// Print store statistics.
    StoreInfo {
        /// Path to the population store (JSON).
        #[arg(long)]
        store: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliSynthArgs {
    /// Path to write the population store (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Angular samples per boundary.
    #[arg(long, default_value = "360")]
    n_theta: usize,

    /// Slice positions to populate (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "0")]
    slices: Vec<i32>,

    /// Stalks per slice position.
    #[arg(long, default_value = "50")]
    stalks: u32,

    /// RNG seed; the same seed reproduces the same store.
    #[arg(long, default_value = "7")]
    seed: u64,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the population store (JSON).
    #[arg(long)]
    store: PathBuf,

    /// Component count at the deepest level. Selected by explained variance
    /// when omitted.
    #[arg(long)]
    components: Option<usize>,

    /// Cumulative explained-variance threshold (percent) for automatic
    /// component selection.
    #[arg(long, default_value = "95.0")]
    variance_threshold: f64,

    /// Interior reconstruction policy.
    #[arg(long, value_enum, default_value_t = InteriorArg::Pca)]
    interior: InteriorArg,

    /// Radial integration step, registered units.
    #[arg(long, default_value = "0.01")]
    dr: f64,

    /// Rind-to-pith elastic modulus ratio.
    #[arg(long, default_value = "20.0")]
    modulus_ratio: f64,

    /// Path to write the full report (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write freshly built bases back into the store file.
    #[arg(long)]
    update_store: bool,
}

#[derive(Debug, Clone, Args)]
struct CliFitArgs {
    /// Path to the population store (JSON).
    #[arg(long)]
    store: PathBuf,

    /// Slice position of the sample.
    #[arg(long)]
    slice: i32,

    /// Stalk number of the sample.
    #[arg(long)]
    stalk: u32,

    /// Maximum simplex iterations.
    #[arg(long, default_value = "4000")]
    max_iters: usize,

    /// Relative simplex value-spread tolerance.
    #[arg(long, default_value = "1e-10")]
    tolerance: f64,

    /// Path to write the fit result (JSON).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliExportArgs {
    /// Path to the population store (JSON).
    #[arg(long)]
    store: PathBuf,

    /// Slice position of the sample.
    #[arg(long)]
    slice: i32,

    /// Stalk number of the sample.
    #[arg(long)]
    stalk: u32,

    /// Path to write the section case (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Export the reconstruction at this component count instead of the
    /// registered boundaries. Requires stored bases.
    #[arg(long)]
    components: Option<usize>,

    /// Interior reconstruction policy for reconstructed exports.
    #[arg(long, value_enum, default_value_t = InteriorArg::Pca)]
    interior: InteriorArg,

    /// Rind elastic modulus recorded in the export.
    #[arg(long, default_value = "20.0")]
    rind_modulus: f64,

    /// Pith elastic modulus recorded in the export.
    #[arg(long, default_value = "1.0")]
    pith_modulus: f64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InteriorArg {
    /// Inward offset of the exterior by the sample's mean rind thickness.
    Offset,
    /// Independent component reconstruction of the interior channel.
    Pca,
}

impl InteriorArg {
    fn to_core(self) -> InteriorPolicy {
        match self {
            Self::Offset => InteriorPolicy::NormalizedThickness,
            Self::Pca => InteriorPolicy::Pca,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth(args) => run_synth(&args),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Fit(args) => run_fit(&args),
        Commands::Export(args) => run_export(&args),
        Commands::StoreInfo { store } => run_store_info(&store),
    }
}

// ── synth ──────────────────────────────────────────────────────────────

fn run_synth(args: &CliSynthArgs) -> CliResult<()> {
    let config = SynthConfig {
        n_theta: args.n_theta,
        slices: args.slices.clone(),
        stalks_per_slice: args.stalks,
        seed: args.seed,
        ranges: SynthRanges::default(),
    };
    let repo = synthesize_population(&config)?;
    repo.to_json_file(&args.out)?;
    tracing::info!("Store written to {}", args.out.display());

    println!(
        "synthesized {} samples over {} slice position(s), grid {}",
        repo.n_samples(),
        repo.slices().len(),
        repo.n_theta()
    );
    Ok(())
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let mut repo = SectionRepo::from_json_file(&args.store)?;
    tracing::info!(
        "Loaded {} samples from {}",
        repo.n_samples(),
        args.store.display()
    );

    let policy = args.interior.to_core();
    prepare_bases(&mut repo, policy)?;
    if args.update_store {
        repo.to_json_file(&args.store)?;
        tracing::info!("Bases written back to {}", args.store.display());
    }

    let config = AnalysisConfig {
        n_components: args.components,
        variance_threshold_pct: args.variance_threshold,
        interior: policy,
        moment: MomentConfig { dr: args.dr },
        stiffness: StiffnessConfig {
            modulus_ratio: args.modulus_ratio,
        },
    };
    let report = run_analysis(&repo, &config)?;
    print_report(&report);

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(out, &json)?;
        tracing::info!("Report written to {}", out.display());
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    use stalksect::stiffness::ERROR_PERCENTILES;

    println!(
        "stiffness error summary ({} samples, {} slice position(s))",
        report.n_samples_used, report.summary.n_slices
    );
    if !report.explained_pct.is_empty() {
        let shares: Vec<String> = report
            .explained_pct
            .iter()
            .map(|p| format!("{p:.1}%"))
            .collect();
        println!(
            "components: {} ({} of residual variance)",
            report.n_components,
            shares.join(" + ")
        );
    }
    println!();

    print!("  {:<14}", "case");
    for q in ERROR_PERCENTILES {
        print!("{:>9}", format!("p{}", (q * 100.0).round() as i64));
    }
    println!("{:>10}{:>10}", "|med|", "|mean|");
    for level in &report.summary.levels {
        print!("  {:<14}", level.case);
        for p in level.percentiles {
            print!("{p:>9.3}");
        }
        println!("{:>10.3}{:>10.3}", level.abs_median, level.abs_mean);
    }

    if !report.problems.is_empty() {
        println!();
        println!("{} sample(s) not evaluated:", report.problems.len());
        for key in &report.problems {
            println!("  {key}");
        }
    }
}

// ── fit ────────────────────────────────────────────────────────────────

fn run_fit(args: &CliFitArgs) -> CliResult<()> {
    use stalksect::registration::radii_to_points;

    let repo = SectionRepo::from_json_file(&args.store)?;
    let key = SampleKey {
        slice: args.slice,
        stalk: args.stalk,
    };
    let row = repo
        .get(key)
        .ok_or_else(|| -> CliError { format!("sample {key} not in store").into() })?;

    // fit in input units so the default parameter bounds apply
    let radii: Vec<f64> = row.exterior_radius.iter().map(|r| r * row.scale).collect();
    let outline = radii_to_points(&radii);

    let options = FitOptions {
        max_iters: args.max_iters,
        tolerance: args.tolerance,
        ..Default::default()
    };
    let result = fit_boundary(&outline, &options)?;
    print_fit(key, row.scale, &result);

    if let Some(out) = &args.out {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(out, &json)?;
        tracing::info!("Fit result written to {}", out.display());
    }
    Ok(())
}

fn print_fit(key: SampleKey, scale: f64, result: &FitResult) {
    println!("boundary fit for {key} (input units, scale {scale:.4})");
    println!("  status:          {:?}", result.status);
    println!(
        "  objective:       {:.6} rms (started at {:.6})",
        result.objective, result.objective_at_start
    );
    println!(
        "  iterations:      {} ({} evaluations)",
        result.iterations, result.evaluations
    );
    let p = &result.params;
    println!("  major diameter:  {:>9.4}", p.major_diameter);
    println!("  minor diameter:  {:>9.4}", p.minor_diameter);
    println!("  notch depth:     {:>9.4}", p.notch_depth);
    println!("  notch width:     {:>9.4}", p.notch_width);
    println!("  notch location:  {:>9.4} rad", p.notch_location);
    println!("  rotation:        {:>9.4} rad", p.rotation);
    println!("  center shift:    ({:.4}, {:.4})", p.x_shift, p.y_shift);
    println!(
        "  x asymmetry:     {:.4} at phase {:.4}",
        p.x_asym_amplitude, p.x_asym_phase
    );
    println!(
        "  y asymmetry:     {:.4} at phase {:.4}",
        p.y_asym_amplitude, p.y_asym_phase
    );
}

// ── export ─────────────────────────────────────────────────────────────

fn run_export(args: &CliExportArgs) -> CliResult<()> {
    let repo = SectionRepo::from_json_file(&args.store)?;
    let key = SampleKey {
        slice: args.slice,
        stalk: args.stalk,
    };
    let row = repo
        .get(key)
        .ok_or_else(|| -> CliError { format!("sample {key} not in store").into() })?;

    let (case, exterior, interior) = match args.components {
        None => (
            ApproximationCase::True,
            row.exterior_radius.clone(),
            row.interior_radius.clone(),
        ),
        Some(k) => reconstructed_boundaries(&repo, key, row, k, args.interior.to_core())?,
    };

    let section = section_case(
        key,
        case,
        &exterior,
        &interior,
        row.scale,
        args.rind_modulus,
        args.pith_modulus,
    );
    let json = serde_json::to_string_pretty(&section)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Section case written to {}", args.out.display());

    println!(
        "exported {} as {} ({} outline points)",
        key,
        section.case,
        section.exterior.len()
    );
    Ok(())
}

fn reconstructed_boundaries(
    repo: &SectionRepo,
    key: SampleKey,
    row: &SectionRow,
    k: usize,
    policy: InteriorPolicy,
) -> CliResult<(ApproximationCase, Vec<f64>, Vec<f64>)> {
    use stalksect::reconstruct::{interior_from_offset, radii_at_level};

    let exterior_basis = repo
        .basis(BasisChannel::ExteriorRadius)
        .ok_or_else(|| -> CliError {
            "store has no exterior basis; run `analyze --update-store` first".into()
        })?;
    let sample = repo
        .flat_index(key)
        .ok_or_else(|| -> CliError { format!("sample {key} not in store").into() })?;

    let k = k.min(exterior_basis.n_components());
    let exterior = radii_at_level(&row.exterior_ellipse, exterior_basis, sample, k);
    let interior = match policy {
        InteriorPolicy::NormalizedThickness => {
            interior_from_offset(&exterior, row.avg_rind_thickness)
        }
        InteriorPolicy::Pca => {
            let basis = repo
                .basis(BasisChannel::InteriorRadius)
                .ok_or_else(|| -> CliError {
                    "store has no interior basis; run `analyze --interior pca --update-store` first"
                        .into()
                })?;
            radii_at_level(&row.interior_ellipse, basis, sample, k)
        }
    };
    Ok((
        ApproximationCase::Elliptical { n_components: k },
        exterior,
        interior,
    ))
}

// ── store-info ─────────────────────────────────────────────────────────

fn run_store_info(store: &Path) -> CliResult<()> {
    let repo = SectionRepo::from_json_file(store)?;

    println!("population store {}", store.display());
    println!("  angular grid:   {}", repo.n_theta());
    println!("  samples:        {}", repo.n_samples());
    println!("  slice blocks:   {}", repo.slices().len());
    for block in repo.slices() {
        println!("    slice {:>5}:  {} stalk(s)", block.slice, block.rows.len());
    }

    let channels = [
        BasisChannel::ExteriorRadius,
        BasisChannel::InteriorRadius,
        BasisChannel::X,
        BasisChannel::Y,
    ];
    for channel in channels {
        if let Some(basis) = repo.basis(channel) {
            let leading = basis.explained_pct.first().copied().unwrap_or(0.0);
            println!(
                "  {} basis:  {} components, leading {:.1}%",
                channel,
                basis.n_components(),
                leading
            );
        }
    }
    Ok(())
}
