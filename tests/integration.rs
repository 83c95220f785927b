//! Integration tests for Hydro TCNN

use hydro_tcnn::prelude::*;
use ndarray::{Array2, Axis};
use std::io::Write;
use tempfile::NamedTempFile;

const RUN_CONFIG: &str = r#"
dynamic_inputs = ["prcp(mm/day)", "tmax(C)", "tmin(C)"]
camels_attributes = ["area_gages2", "elev_mean"]
use_basin_id_encoding = true
number_of_basins = 2
kernal_size = 3
num_levels = 2
num_channels = 6
output_dropout = 0.4
output_window = 10
hidden_size = 12
seq_length = 60
seed = 2024
"#;

/// Synthetic daily record with a seasonal temperature cycle and rain pulses
fn basin_csv(days: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,prcp(mm/day),tmax(C),tmin(C),QObs(mm/d)").unwrap();
    for day in 0..days {
        let season = (day as f64 / 365.0 * std::f64::consts::TAU).sin();
        let prcp = if day % 7 == 0 { 12.0 } else { 0.5 };
        let tmax = 15.0 + 10.0 * season;
        let tmin = tmax - 8.0;
        let q = 1.0 + 0.1 * prcp + 0.02 * tmax;
        writeln!(file, "day{day},{prcp},{tmax},{tmin},{q}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn attribute_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "gauge_id,area_gages2,elev_mean\n\
         01013500,2252.7,250.3\n\
         01022500,573.6,92.7\n"
    )
    .unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_config_from_run_file() {
    let config = TcnnConfig::from_toml_str(RUN_CONFIG).unwrap();
    assert_eq!(config.kernel_size, 3);
    assert_eq!(config.input_size(), 3 + 2 + 2);
    assert_eq!(config.block_dropout, 0.4);
}

#[test]
fn test_end_to_end_forward() {
    let config = TcnnConfig::from_toml_str(RUN_CONFIG).unwrap();
    let tcnn = Tcnn::new(config.clone()).unwrap();

    let data = basin_csv(120);
    let series = TimeSeries::from_csv(data.path(), &config.dynamic_inputs, Some("date")).unwrap();
    let scaled = FeatureScaler::zscore().fit_transform(&series.values).unwrap();
    let windows = sliding_windows(&scaled, config.seq_length, 5).unwrap();
    assert_eq!(windows.len(), 13);

    let mut table = AttributeTable::from_csv(
        attribute_csv().path(),
        "gauge_id",
        &config.camels_attributes,
    )
    .unwrap();
    table.standardize().unwrap();
    let encoder = BasinEncoder::new(vec!["01013500".into(), "01022500".into()]);

    let x_d = windows.batch(0, 8);
    let batch = x_d.len_of(Axis(0));
    let inputs = ModelInputs::new(x_d)
        .with_static(table.batch("01022500", batch).unwrap())
        .with_one_hot(encoder.encode_batch("01022500", batch).unwrap());

    let output = tcnn.forward(&inputs).unwrap();
    assert_eq!(output.y_hat.dim(), (8, 1, 1));
    assert_eq!(output.tcnn_out.dim(), (8, 6, 10));
    assert_eq!(output.x_d.dim(), (8, 7, 60));
    assert!(output.y_hat.iter().all(|v| v.is_finite()));
    assert!(output.tcnn_out.iter().all(|v| *v >= 0.0));

    // Basin encoding occupies the last two features at every step
    let last = output.x_d.index_axis(Axis(1), 6);
    assert!(last.iter().all(|v| *v == 1.0));
}

#[test]
fn test_basin_identity_changes_prediction() {
    let config = TcnnConfig::from_toml_str(RUN_CONFIG).unwrap();
    let tcnn = Tcnn::new(config.clone()).unwrap();
    let encoder = BasinEncoder::new(vec!["a".into(), "b".into()]);

    let x_d = ndarray::Array3::from_shape_fn((2, 60, 3), |(_, t, f)| ((t + f) as f64 * 0.1).cos());
    let attrs = Array2::zeros((2, 2));

    let predict = |basin: &str| {
        let inputs = ModelInputs::new(x_d.clone())
            .with_static(attrs.clone())
            .with_one_hot(encoder.encode_batch(basin, 2).unwrap());
        tcnn.predict(&inputs).unwrap()
    };
    assert_ne!(predict("a"), predict("b"));
}

#[test]
fn test_metrics_on_model_output() {
    let config = TcnnConfig {
        seed: Some(1),
        seq_length: 30,
        output_window: 10,
        ..Default::default()
    };
    let tcnn = Tcnn::new(config).unwrap();
    let x_d = ndarray::Array3::from_shape_fn((16, 30, 5), |(b, t, f)| ((b * t + f) as f64).sin());
    let predictions = tcnn.predict(&ModelInputs::new(x_d)).unwrap();

    let simulated: Vec<f64> = predictions.column(0).to_vec();
    assert_eq!(simulated.len(), 16);
    let score = nse(&simulated, &simulated).unwrap();
    assert!((score - 1.0).abs() < 1e-12);
    assert!(rmse(&simulated, &simulated).unwrap() < 1e-12);
}

#[test]
fn test_config_errors_surface() {
    let broken = RUN_CONFIG.replace("number_of_basins = 2", "number_of_basins = 0");
    assert!(matches!(
        TcnnConfig::from_toml_str(&broken),
        Err(TcnnError::InvalidConfig(_))
    ));
}
