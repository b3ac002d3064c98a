use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use synth_panel::{
    analysis::{self, report::SynthReport, synth::NestedSimplexSolver},
    config::Config,
    data::{self, interpolate::missing_series, loader::WorkbookLoader, panel::Panel},
    types::Indicator,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "synth_panel")]
#[command(about = "Prepare a European indicator panel and estimate a synthetic control")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, default_value = "config/synth_germany.yaml")]
    config: PathBuf,
    /// Workbook (.xlsx/.ods) or directory of per-sheet CSV files; overrides the config
    #[arg(long)]
    input: Option<PathBuf>,
    /// Write the actual-vs-synthetic path to this CSV file
    #[arg(long)]
    path_csv: Option<PathBuf>,
    /// Write the full report as JSON
    #[arg(long)]
    report_json: Option<PathBuf>,
    /// Print every panel row after interpolation
    #[arg(long)]
    show_panel: bool,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    info!(treated = %config.scm.treated, outcome = %config.scm.outcome, "loaded configuration");

    let input = cli
        .input
        .clone()
        .or_else(|| config.input.clone())
        .context("no input workbook given (use --input or set `input` in the config)")?;

    let workbook = WorkbookLoader::load(&input)
        .with_context(|| format!("loading workbook {}", input.display()))?;
    for indicator in Indicator::ALL {
        let table = workbook.table(indicator)?;
        println!(
            "{:<12} {:>3} countries × {:>3} years",
            indicator.sheet_name(),
            table.rows.len(),
            table.years.len()
        );
    }

    let panel = data::prepare_panel(&workbook, &config.excluded_countries)?;
    print_panel_summary(&panel, cli.show_panel);

    let solver = NestedSimplexSolver::new(config.solver.clone());
    let result = analysis::estimate(&panel, &config.to_spec(), &solver)
        .context("estimating synthetic control")?;

    let report = SynthReport::from_result(&result);
    report.print();

    if let Some(path) = &cli.path_csv {
        report
            .write_path_csv(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &cli.report_json {
        report
            .write_json(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}

fn print_panel_summary(panel: &Panel, show_rows: bool) {
    let years = panel.years();
    println!("\n=== Panel ===");
    println!(
        "{} rows, {} countries, years {}",
        panel.rows.len(),
        panel.countries().len(),
        match (years.first(), years.last()) {
            (Some(first), Some(last)) => format!("{first}-{last}"),
            _ => "none".to_string(),
        }
    );
    println!(
        "Countries: {}",
        panel.countries().into_iter().collect::<Vec<_>>().join(", ")
    );

    let gaps = missing_series(panel);
    if !gaps.is_empty() {
        println!("Series without any data:");
        for gap in &gaps {
            println!("  {} / {}", gap.country, gap.indicator);
        }
    }

    if show_rows {
        println!(
            "\n{:<16} {:<6} {:>10} {:>10} {:>12} {:>10} {:>12}",
            "Country", "Year", "Inflation", "Imports", "Public Debt", "Deficit", "Expenditure"
        );
        println!("{:-<82}", "");
        let cell = |value: Option<f64>| value.map_or_else(|| "NA".to_string(), |v| format!("{v:.2}"));
        for row in &panel.rows {
            println!(
                "{:<16} {:<6} {:>10} {:>10} {:>12} {:>10} {:>12}",
                row.country,
                row.year,
                cell(row.inflation),
                cell(row.imports),
                cell(row.public_debt),
                cell(row.deficit),
                cell(row.expenditure)
            );
        }
    }
}
