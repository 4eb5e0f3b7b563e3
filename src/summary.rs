/*!
# Posterior Summarization

Pure read-side reporting over a [`Trace`](crate::sampler::Trace): pooled
means, standard deviations, medians, equal-tailed and
highest-posterior-density (HPD) intervals per parameter, plus change-point
locations mapped back into the series' timestamp domain. Derived contrasts
per regime boundary (mean difference, percent change of the mean, volatility
difference) are computed sample-wise and summarized like any other
parameter, so their intervals carry the joint uncertainty instead of being
differences of point estimates. Summarization never mutates the trace;
calling it twice yields identical output.

The HPD interval at level `p` is the narrowest contiguous window containing a
fraction `p` of the pooled sorted draws. For a discrete change point a wide
interval is the honest answer when the data do not pin the break down.
*/

use crate::diagnostics::diagnose;
use crate::error::{Error, Result};
use crate::sampler::Trace;
use crate::series::Series;

/// Pooled posterior summary of one scalar quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    pub median: f64,
    /// Central interval holding `level` mass, equal tails outside.
    pub equal_tailed: (f64, f64),
    /// Narrowest interval holding `level` posterior mass.
    pub hpd: (f64, f64),
}

/// Posterior location of one change point, in both index and timestamp
/// domains.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePointSummary {
    pub name: String,
    /// Most frequent sampled index.
    pub mode_index: usize,
    /// Posterior mass at the mode.
    pub mode_probability: f64,
    pub mode_timestamp: i64,
    pub hpd_indices: (usize, usize),
    pub hpd_timestamps: (i64, i64),
}

/// Full posterior report for one fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorSummary {
    pub model: String,
    pub level: f64,
    /// Pooled draw count across healthy chains.
    pub n_draws: usize,
    pub params: Vec<ParamSummary>,
    /// Sample-wise contrasts per regime boundary: `mu[i+1]-mu[i]`, the
    /// percent change `(mu[i+1]-mu[i])/mu[i]`, and `sigma[i+1]-sigma[i]`.
    pub contrasts: Vec<ParamSummary>,
    pub change_points: Vec<ChangePointSummary>,
    /// True when convergence checks failed or could not be computed; the
    /// summary is still produced, annotated rather than withheld.
    pub low_confidence: bool,
}

/// Summarizes the pooled healthy chains of `trace` at credible `level`.
///
/// # Errors
///
/// - `level` outside `(0, 1)` → [`Error::InvalidLevel`]
/// - `series` length differs from the fitted one → [`Error::SeriesMismatch`]
/// - no healthy draws → [`Error::EmptyTrace`]
pub fn summarize(trace: &Trace, series: &Series, level: f64) -> Result<PosteriorSummary> {
    if !(level > 0.0 && level < 1.0) {
        return Err(Error::InvalidLevel(level));
    }
    if series.len() != trace.series_len {
        return Err(Error::SeriesMismatch(trace.series_len, series.len()));
    }

    let n_draws: usize = trace.healthy_chains().iter().map(|c| c.n_draws()).sum();
    if n_draws == 0 {
        return Err(Error::EmptyTrace);
    }

    let mut params = Vec::with_capacity(trace.n_params());
    for (p, name) in trace.param_names.iter().enumerate() {
        params.push(summarize_draws(name.clone(), trace.pooled(p), level));
    }

    let n_regimes = trace.n_change_points + 1;

    // Contrasts are computed per draw, then summarized like any other
    // parameter; pooled columns share the chain/draw order.
    let mut contrasts = Vec::with_capacity(3 * trace.n_change_points);
    for i in 0..trace.n_change_points {
        let mu_hi = trace.pooled(i + 1);
        let mu_lo = trace.pooled(i);
        let sigma_hi = trace.pooled(n_regimes + i + 1);
        let sigma_lo = trace.pooled(n_regimes + i);

        let dmu: Vec<f64> = mu_hi.iter().zip(&mu_lo).map(|(a, b)| a - b).collect();
        contrasts.push(summarize_draws(
            format!("mu[{}]-mu[{}]", i + 2, i + 1),
            dmu,
            level,
        ));

        let pct: Vec<f64> = mu_hi.iter().zip(&mu_lo).map(|(a, b)| (a - b) / b).collect();
        contrasts.push(summarize_draws(
            format!("(mu[{}]-mu[{}])/mu[{}]", i + 2, i + 1, i + 1),
            pct,
            level,
        ));

        let dsigma: Vec<f64> = sigma_hi.iter().zip(&sigma_lo).map(|(a, b)| a - b).collect();
        contrasts.push(summarize_draws(
            format!("sigma[{}]-sigma[{}]", i + 2, i + 1),
            dsigma,
            level,
        ));
    }
    let timestamps = series.timestamps();
    let mut change_points = Vec::with_capacity(trace.n_change_points);
    for j in 0..trace.n_change_points {
        let col = 2 * n_regimes + j;
        let draws = trace.pooled(col);

        let mut counts = vec![0usize; trace.series_len];
        for &d in &draws {
            counts[d as usize] += 1;
        }
        let (mode_index, &mode_count) = counts
            .iter()
            .enumerate()
            .max_by_key(|&(_, &c)| c)
            .unwrap_or((0, &0));

        let mut sorted = draws.clone();
        sorted.sort_by(f64::total_cmp);
        let (lo, hi) = hpd_interval(&sorted, level);
        let lo = lo as usize;
        let hi = hi as usize;

        change_points.push(ChangePointSummary {
            name: trace.param_names[col].clone(),
            mode_index,
            mode_probability: mode_count as f64 / draws.len() as f64,
            mode_timestamp: timestamps[mode_index],
            hpd_indices: (lo, hi),
            hpd_timestamps: (timestamps[lo], timestamps[hi]),
        });
    }

    // Non-convergence annotates rather than fails; fewer than two healthy
    // chains also means the numbers cannot be trusted on their own.
    let low_confidence = match diagnose(trace) {
        Ok(report) => !report.converged,
        Err(_) => true,
    };

    Ok(PosteriorSummary {
        model: trace.model.clone(),
        level,
        n_draws,
        params,
        contrasts,
        change_points,
        low_confidence,
    })
}

fn summarize_draws(name: String, mut draws: Vec<f64>, level: f64) -> ParamSummary {
    draws.sort_by(f64::total_cmp);
    ParamSummary {
        name,
        mean: mean(&draws),
        sd: sample_sd(&draws),
        median: median_sorted(&draws),
        equal_tailed: equal_tailed_interval(&draws, level),
        hpd: hpd_interval(&draws, level),
    }
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sample_sd(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let ss: f64 = xs.iter().map(|&x| (x - m) * (x - m)).sum();
    (ss / (xs.len() - 1) as f64).sqrt()
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Central interval with `(1 − level)/2` mass outside each tail.
fn equal_tailed_interval(sorted: &[f64], level: f64) -> (f64, f64) {
    let alpha = 0.5 * (1.0 - level);
    (quantile_sorted(sorted, alpha), quantile_sorted(sorted, 1.0 - alpha))
}

/// Linear-interpolation quantile over sorted draws.
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Narrowest contiguous window of `⌈level · n⌉` sorted draws.
fn hpd_interval(sorted: &[f64], level: f64) -> (f64, f64) {
    let n = sorted.len();
    let window = ((level * n as f64).ceil() as usize).clamp(1, n);
    let mut best = (sorted[0], sorted[window - 1]);
    let mut best_width = best.1 - best.0;
    for i in 1..=n - window {
        let width = sorted[i + window - 1] - sorted[i];
        if width < best_width {
            best_width = width;
            best = (sorted[i], sorted[i + window - 1]);
        }
    }
    best
}
