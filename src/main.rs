//! TCNN command-line interface
//!
//! Usage:
//!     tcnn init-config --output tcnn.toml
//!     tcnn summary --config tcnn.toml
//!     tcnn predict --config tcnn.toml --data 01013500.csv --basin 01013500 --target "QObs(mm/d)"
//!     tcnn predict --config tcnn.toml --data 01013500.csv --basin 01013500 --scaler train_scaler.json

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ndarray::{Array2, Axis};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hydro_tcnn::prelude::*;

#[derive(Parser)]
#[command(name = "tcnn")]
#[command(about = "Temporal convolutional network for hydrological time series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    InitConfig {
        /// Output file path
        #[arg(short, long, default_value = "tcnn.toml")]
        output: PathBuf,
    },

    /// Build the model and print its architecture
    Summary {
        /// Model configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run the forward pass over every window of a basin record
    Predict(PredictArgs),
}

#[derive(Args)]
struct PredictArgs {
    /// Model configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Basin time series (CSV with one column per dynamic input)
    #[arg(short, long)]
    data: PathBuf,

    /// Basin id used for attributes and the one-hot encoding
    #[arg(short, long)]
    basin: String,

    /// Catchment attribute table (CSV)
    #[arg(long)]
    attributes: Option<PathBuf>,

    /// Id column of the attribute table
    #[arg(long, default_value = "gauge_id")]
    id_column: String,

    /// Basin list defining the one-hot encoding order
    #[arg(long)]
    basins: Option<PathBuf>,

    /// Observed target column, enables NSE/KGE reporting
    #[arg(short, long)]
    target: Option<String>,

    /// Date column copied to the output
    #[arg(long)]
    date_column: Option<String>,

    /// Windows per forward pass
    #[arg(long, default_value_t = 256)]
    batch_size: usize,

    /// Scaler fitted on the training period (JSON), fitted on `--data` when absent
    #[arg(long, conflicts_with = "save_scaler")]
    scaler: Option<PathBuf>,

    /// Where to store the input scaler fitted on `--data` (JSON)
    #[arg(long)]
    save_scaler: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "predictions.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::InitConfig { output } => {
            TcnnConfig::default()
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            info!("Wrote default configuration to {}", output.display());
        }
        Commands::Summary { config } => {
            let config = load_config(&config)?;
            let tcnn = Tcnn::new(config)?;
            println!("{}", tcnn.summary());
        }
        Commands::Predict(args) => predict(args)?,
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<TcnnConfig> {
    TcnnConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn predict(args: PredictArgs) -> Result<()> {
    if args.batch_size == 0 {
        bail!("--batch-size must be positive");
    }

    let config = load_config(&args.config)?;
    let tcnn = Tcnn::new(config.clone())?;
    info!(
        "Built TCNN with {} parameters, receptive field {}",
        tcnn.num_parameters(),
        tcnn.receptive_field()
    );

    // Forcings plus the optional observed target
    let mut columns = config.dynamic_inputs.clone();
    if let Some(target) = &args.target {
        columns.push(target.clone());
    }
    let series = TimeSeries::from_csv(&args.data, &columns, args.date_column.as_deref())
        .with_context(|| format!("reading {}", args.data.display()))?;
    info!("Loaded {} time steps from {}", series.len(), args.data.display());

    let forcings = series.select(&config.dynamic_inputs)?;
    let (scaler, scaled) = scale_forcings(&forcings.values, args.scaler.as_deref())?;
    if let Some(path) = &args.save_scaler {
        scaler.save_json(path)?;
        info!("Saved input scaler to {}", path.display());
    }

    let windows = sliding_windows(&scaled, config.seq_length, 1)?;
    if windows.is_empty() {
        bail!(
            "no complete window of {} steps in {}",
            config.seq_length,
            args.data.display()
        );
    }
    info!("Prepared {} input windows", windows.len());

    let attributes = if config.static_size() > 0 {
        let path = args
            .attributes
            .as_ref()
            .context("the configuration lists static attributes, pass --attributes")?;
        let names: Vec<String> = config
            .static_inputs
            .iter()
            .chain(&config.camels_attributes)
            .cloned()
            .collect();
        let mut table = AttributeTable::from_csv(path, &args.id_column, &names)?;
        table.standardize()?;
        Some(table)
    } else {
        None
    };

    let encoder = if config.use_basin_id_encoding {
        let path = args
            .basins
            .as_ref()
            .context("basin id encoding is enabled, pass --basins")?;
        let encoder = BasinEncoder::load(path)?;
        if encoder.len() != config.number_of_basins {
            bail!(
                "basin list has {} entries but number_of_basins is {}",
                encoder.len(),
                config.number_of_basins
            );
        }
        Some(encoder)
    } else {
        None
    };

    let mut predictions = Vec::with_capacity(windows.len());
    for start in (0..windows.len()).step_by(args.batch_size) {
        let x_d = windows.batch(start, start + args.batch_size);
        let batch = x_d.len_of(Axis(0));

        let mut inputs = ModelInputs::new(x_d);
        if let Some(table) = &attributes {
            inputs = inputs.with_static(table.batch(&args.basin, batch)?);
        }
        if let Some(encoder) = &encoder {
            inputs = inputs.with_one_hot(encoder.encode_batch(&args.basin, batch)?);
        }

        let y_hat = tcnn.predict(&inputs)?;
        predictions.extend(y_hat.column(0).iter().copied());
    }

    let observed: Option<Vec<f64>> = args.target.as_ref().and_then(|target| {
        series
            .column(target)
            .map(|col| windows.end_index.iter().map(|&i| col[i]).collect())
    });

    write_predictions(&args.output, &series, &windows, &predictions, observed.as_deref())?;
    info!("Wrote {} predictions to {}", predictions.len(), args.output.display());

    if let Some(observed) = &observed {
        match (nse(observed, &predictions), kge(observed, &predictions)) {
            (Some(nse), Some(kge)) => info!("NSE: {:.4}  KGE: {:.4}", nse, kge),
            (Some(nse), None) => info!("NSE: {:.4}  KGE: undefined", nse),
            _ => warn!("Not enough observed values to evaluate predictions"),
        }
    }

    Ok(())
}

/// Normalise forcings with a saved scaler, or fit a z-score scaler on them
fn scale_forcings(values: &Array2<f64>, saved: Option<&Path>) -> Result<(FeatureScaler, Array2<f64>)> {
    match saved {
        Some(path) => {
            let scaler = FeatureScaler::load_json(path)
                .with_context(|| format!("loading scaler {}", path.display()))?;
            let scaled = scaler
                .transform(values)
                .with_context(|| format!("applying scaler {}", path.display()))?;
            info!("Normalised inputs with scaler from {}", path.display());
            Ok((scaler, scaled))
        }
        None => {
            let mut scaler = FeatureScaler::zscore();
            let scaled = scaler.fit_transform(values)?;
            Ok((scaler, scaled))
        }
    }
}

fn write_predictions(
    path: &Path,
    series: &TimeSeries,
    windows: &Windows,
    predictions: &[f64],
    observed: Option<&[f64]>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["step", "prediction"];
    if !series.index.is_empty() {
        header.insert(1, "date");
    }
    if observed.is_some() {
        header.push("observed");
    }
    writer.write_record(&header)?;

    for (i, (&step, prediction)) in windows.end_index.iter().zip(predictions).enumerate() {
        let mut record = vec![step.to_string()];
        if let Some(date) = series.index.get(step) {
            record.push(date.clone());
        }
        record.push(prediction.to_string());
        if let Some(observed) = observed {
            record.push(observed[i].to_string());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
