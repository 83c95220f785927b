//! Hydrological Performance Metrics
//!
//! All metrics take paired observed and simulated series. Pairs where either
//! value is missing (NaN) are dropped before evaluation; `None` is returned
//! when the metric is undefined for what remains.

fn paired(observed: &[f64], simulated: &[f64]) -> Vec<(f64, f64)> {
    observed
        .iter()
        .zip(simulated)
        .filter(|(o, s)| !o.is_nan() && !s.is_nan())
        .map(|(&o, &s)| (o, s))
        .collect()
}

fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    values.sum::<f64>() / n as f64
}

/// Nash-Sutcliffe Efficiency
///
/// `1 - sum((sim - obs)^2) / sum((obs - mean(obs))^2)`, 1 is a perfect fit
pub fn nse(observed: &[f64], simulated: &[f64]) -> Option<f64> {
    let pairs = paired(observed, simulated);
    if pairs.is_empty() {
        return None;
    }

    let obs_mean = mean(pairs.iter().map(|p| p.0));
    let denominator: f64 = pairs.iter().map(|(o, _)| (o - obs_mean).powi(2)).sum();
    if denominator == 0.0 {
        return None;
    }
    let numerator: f64 = pairs.iter().map(|(o, s)| (s - o).powi(2)).sum();

    Some(1.0 - numerator / denominator)
}

/// Root mean squared error
pub fn rmse(observed: &[f64], simulated: &[f64]) -> Option<f64> {
    let pairs = paired(observed, simulated);
    if pairs.is_empty() {
        return None;
    }
    Some(mean(pairs.iter().map(|(o, s)| (s - o).powi(2))).sqrt())
}

/// Mean absolute error
pub fn mae(observed: &[f64], simulated: &[f64]) -> Option<f64> {
    let pairs = paired(observed, simulated);
    if pairs.is_empty() {
        return None;
    }
    Some(mean(pairs.iter().map(|(o, s)| (s - o).abs())))
}

/// Pearson correlation coefficient
pub fn pearson_r(observed: &[f64], simulated: &[f64]) -> Option<f64> {
    let pairs = paired(observed, simulated);
    if pairs.len() < 2 {
        return None;
    }

    let obs_mean = mean(pairs.iter().map(|p| p.0));
    let sim_mean = mean(pairs.iter().map(|p| p.1));

    let cov: f64 = pairs.iter().map(|(o, s)| (o - obs_mean) * (s - sim_mean)).sum();
    let var_o: f64 = pairs.iter().map(|(o, _)| (o - obs_mean).powi(2)).sum();
    let var_s: f64 = pairs.iter().map(|(_, s)| (s - sim_mean).powi(2)).sum();

    if var_o == 0.0 || var_s == 0.0 {
        return None;
    }
    Some(cov / (var_o.sqrt() * var_s.sqrt()))
}

/// Kling-Gupta Efficiency
///
/// `1 - sqrt((r - 1)^2 + (alpha - 1)^2 + (beta - 1)^2)` with `alpha` the
/// ratio of standard deviations and `beta` the ratio of means
pub fn kge(observed: &[f64], simulated: &[f64]) -> Option<f64> {
    let r = pearson_r(observed, simulated)?;
    let pairs = paired(observed, simulated);

    let obs_mean = mean(pairs.iter().map(|p| p.0));
    let sim_mean = mean(pairs.iter().map(|p| p.1));
    if obs_mean == 0.0 {
        return None;
    }

    let obs_std = mean(pairs.iter().map(|(o, _)| (o - obs_mean).powi(2))).sqrt();
    let sim_std = mean(pairs.iter().map(|(_, s)| (s - sim_mean).powi(2))).sqrt();

    let alpha = sim_std / obs_std;
    let beta = sim_mean / obs_mean;

    Some(1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt())
}
