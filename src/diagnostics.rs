/*!
# Convergence Diagnostics

Split R-hat and effective sample size (ESS) per tracked parameter, computed
over the healthy chains of a [`Trace`](crate::sampler::Trace).

Each chain is split in half before the between/within variance comparison, so
a single chain that drifts between its own halves is caught even when whole
chains happen to agree. ESS follows the same split-chain layout, estimating
the autocorrelation time with Geyer's initial-positive-sequence truncation.

Convergence problems are reported as data in the [`DiagnosticReport`], never
as errors: a poorly mixed trace is still a trace. The only failure modes are
structural (fewer than two usable chains, or no retained draws at all).
Incomplete and degenerate chains are excluded by default;
[`diagnose_with_flagged`] opts them back in when a partial run is all there
is.
*/

use crate::error::{Error, Result};
use crate::sampler::Trace;

/// R-hat above this threshold flags the parameter as not converged.
pub const RHAT_THRESHOLD: f64 = 1.01;
/// Pooled ESS below this threshold flags the parameter as under-sampled.
pub const ESS_THRESHOLD: f64 = 400.0;

/// Diagnostics for one tracked parameter.
#[derive(Debug, Clone)]
pub struct ParamDiagnostic {
    pub name: String,
    pub rhat: f64,
    pub ess: f64,
}

/// Per-parameter convergence diagnostics with human-readable warnings.
#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub model: String,
    /// One entry per tracked parameter, in trace column order.
    pub params: Vec<ParamDiagnostic>,
    /// Healthy chains the diagnostics were computed over.
    pub n_chains: usize,
    /// Draws per chain used (the minimum across healthy chains).
    pub n_draws: usize,
    pub warnings: Vec<String>,
    /// True when no parameter breached either threshold.
    pub converged: bool,
}

/// Computes split R-hat and ESS for every parameter of `trace`, over its
/// healthy chains only.
///
/// # Errors
///
/// - no retained draws at all → [`Error::EmptyTrace`]
/// - fewer than two healthy chains → [`Error::DiagnosticsUnavailable`]
pub fn diagnose(trace: &Trace) -> Result<DiagnosticReport> {
    diagnose_chains(trace, false)
}

/// Like [`diagnose`], but opts incomplete and degenerate chains into the
/// computation (any chain holding at least one draw counts). Useful when a
/// cancelled or flagged run is all the caller has; the report notes the
/// inclusion in its warnings.
pub fn diagnose_with_flagged(trace: &Trace) -> Result<DiagnosticReport> {
    diagnose_chains(trace, true)
}

fn diagnose_chains(trace: &Trace, include_flagged: bool) -> Result<DiagnosticReport> {
    let total_draws: usize = trace.chains.iter().map(|c| c.n_draws()).sum();
    if total_draws == 0 {
        return Err(Error::EmptyTrace);
    }
    let chains = trace.usable_chains(include_flagged);
    if chains.len() < 2 {
        return Err(Error::DiagnosticsUnavailable {
            healthy: chains.len(),
        });
    }
    let n_draws = chains.iter().map(|c| c.n_draws()).min().unwrap_or(0);

    let mut params = Vec::with_capacity(trace.n_params());
    let mut warnings = Vec::new();
    for (p, name) in trace.param_names.iter().enumerate() {
        let columns: Vec<Vec<f64>> = chains
            .iter()
            .map(|c| c.samples.column(p).iter().take(n_draws).copied().collect())
            .collect();
        let halves = split_chains(&columns);
        let rhat = split_rhat(&halves);
        let ess = effective_sample_size(&halves);
        if rhat > RHAT_THRESHOLD {
            warnings.push(format!(
                "{name}: split R-hat {rhat:.3} exceeds {RHAT_THRESHOLD}; chains disagree"
            ));
        }
        if ess < ESS_THRESHOLD {
            warnings.push(format!(
                "{name}: effective sample size {ess:.0} below {ESS_THRESHOLD}; consider more draws"
            ));
        }
        params.push(ParamDiagnostic {
            name: name.clone(),
            rhat,
            ess,
        });
    }

    let flagged = trace.chains.len() - trace.healthy_chains().len();
    if flagged > 0 {
        warnings.push(if include_flagged {
            format!("{flagged} incomplete or degenerate chain(s) included at the caller's request")
        } else {
            format!("{flagged} chain(s) excluded as incomplete or degenerate")
        });
    }

    let converged = params
        .iter()
        .all(|p| p.rhat <= RHAT_THRESHOLD && p.ess >= ESS_THRESHOLD);
    Ok(DiagnosticReport {
        model: trace.model.clone(),
        params,
        n_chains: chains.len(),
        n_draws,
        warnings,
        converged,
    })
}

/// Diagnoses several traces at once, e.g. one per candidate model.
pub fn diagnose_all(traces: &[Trace]) -> Result<Vec<DiagnosticReport>> {
    traces.iter().map(diagnose).collect()
}

/// Splits every chain into two halves, dropping the middle draw of
/// odd-length chains.
fn split_chains(chains: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut out = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        let half = chain.len() / 2;
        out.push(chain[..half].to_vec());
        out.push(chain[chain.len() - half..].to_vec());
    }
    out
}

/// Potential scale reduction over (already split) chains of equal length.
///
/// `R̂ = sqrt(var⁺ / W)` with `var⁺ = (n−1)/n · W + B/n`, where `W` is the
/// mean within-chain variance and `B` the between-chain variance. A constant
/// parameter (zero variance everywhere) reports 1.0 rather than NaN.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let m = chains.len();
    let n = chains.iter().map(Vec::len).min().unwrap_or(0);
    if m < 2 || n < 2 {
        return f64::NAN;
    }
    let nf = n as f64;

    let means: Vec<f64> = chains
        .iter()
        .map(|c| c[..n].iter().sum::<f64>() / nf)
        .collect();
    let w = chains
        .iter()
        .zip(&means)
        .map(|(c, &mean)| c[..n].iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / (nf - 1.0))
        .sum::<f64>()
        / m as f64;
    let grand = means.iter().sum::<f64>() / m as f64;
    let b = nf / (m as f64 - 1.0)
        * means.iter().map(|&mu| (mu - grand) * (mu - grand)).sum::<f64>();

    if w <= f64::EPSILON * grand.abs().max(1.0) {
        // All chains constant; agree iff the between term vanishes too.
        return if b <= f64::EPSILON { 1.0 } else { f64::INFINITY };
    }
    let var_plus = (nf - 1.0) / nf * w + b / nf;
    (var_plus / w).sqrt()
}

/// Multi-chain effective sample size over (already split) chains.
///
/// Lag autocorrelations are combined across chains through
/// `ρ_t = 1 − (W − mean acov_t) / var⁺` and summed in Geyer pairs until the
/// first negative pair. The estimate is capped at the total draw count.
pub fn effective_sample_size(chains: &[Vec<f64>]) -> f64 {
    let m = chains.len();
    let n = chains.iter().map(Vec::len).min().unwrap_or(0);
    if m == 0 || n < 4 {
        return f64::NAN;
    }
    let nf = n as f64;
    let total = (m * n) as f64;

    let means: Vec<f64> = chains
        .iter()
        .map(|c| c[..n].iter().sum::<f64>() / nf)
        .collect();
    let variances: Vec<f64> = chains
        .iter()
        .zip(&means)
        .map(|(c, &mean)| c[..n].iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / (nf - 1.0))
        .collect();
    let w = variances.iter().sum::<f64>() / m as f64;
    let grand = means.iter().sum::<f64>() / m as f64;
    let b = if m > 1 {
        nf / (m as f64 - 1.0)
            * means.iter().map(|&mu| (mu - grand) * (mu - grand)).sum::<f64>()
    } else {
        0.0
    };
    let var_plus = (nf - 1.0) / nf * w + b / nf;
    if var_plus <= f64::EPSILON {
        // Constant parameter: every draw is as good as independent.
        return total;
    }

    let rho = |t: usize| -> f64 {
        if t == 0 {
            return 1.0;
        }
        let mean_acov = chains
            .iter()
            .zip(&means)
            .map(|(c, &mean)| autocovariance(&c[..n], t, mean))
            .sum::<f64>()
            / m as f64;
        1.0 - (w - mean_acov) / var_plus
    };

    // Geyer initial positive sequence: sum rho in pairs until a pair
    // goes negative.
    let mut pair_sum = 0.0;
    let mut t = 0;
    while t + 1 < n {
        let pair = rho(t) + rho(t + 1);
        if t > 0 && pair < 0.0 {
            break;
        }
        pair_sum += pair;
        t += 2;
    }
    let tau = (2.0 * pair_sum - 1.0).max(1.0);
    (total / tau).min(total)
}

/// Lag-`t` autocovariance with a `1/n` normalization.
fn autocovariance(x: &[f64], lag: usize, mean: f64) -> f64 {
    if lag >= x.len() {
        return 0.0;
    }
    let n = x.len();
    (0..n - lag)
        .map(|i| (x[i] - mean) * (x[i + lag] - mean))
        .sum::<f64>()
        / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Likelihood, ModelSpec};
    use crate::sampler::{fit, SamplerConfig};
    use crate::series::Series;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::StandardNormal;

    fn noise_chain(seed: u64, n: usize) -> Vec<f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..n).map(|_| rng.sample(StandardNormal)).collect()
    }

    #[test]
    fn split_rhat_matches_hand_computation() {
        // Two identical chains [1,2,3,4] split into [1,2],[3,4] twice:
        // W = 0.5, B = 8/3, var+ = 19/12, R-hat = sqrt(19/6).
        let chains = vec![vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0, 3.0, 4.0]];
        let halves = split_chains(&chains);
        assert_eq!(halves.len(), 4);
        assert_abs_diff_eq!(
            split_rhat(&halves),
            (19.0_f64 / 6.0).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn rhat_near_one_for_matching_chains() {
        let halves = split_chains(&[
            noise_chain(1, 2000),
            noise_chain(2, 2000),
            noise_chain(3, 2000),
            noise_chain(4, 2000),
        ]);
        let rhat = split_rhat(&halves);
        assert!(rhat < 1.02, "expected R-hat near 1, got {rhat}");
    }

    #[test]
    fn rhat_large_for_disjoint_chains() {
        let shifted: Vec<f64> = noise_chain(5, 1000).iter().map(|x| x + 50.0).collect();
        let halves = split_chains(&[noise_chain(6, 1000), shifted]);
        assert!(split_rhat(&halves) > 2.0);
    }

    #[test]
    fn rhat_of_constant_chains_is_one() {
        let halves = split_chains(&[vec![3.0; 100], vec![3.0; 100]]);
        assert_abs_diff_eq!(split_rhat(&halves), 1.0);
        assert_eq!(effective_sample_size(&halves), 200.0);
    }

    #[test]
    fn ess_high_for_white_noise_low_for_trends() {
        let white = split_chains(&[noise_chain(7, 1000), noise_chain(8, 1000)]);
        let ess = effective_sample_size(&white);
        assert!(ess > 1000.0 && ess <= 2000.0, "white noise ess {ess}");

        let trend: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let trending = split_chains(&[trend.clone(), trend]);
        let ess = effective_sample_size(&trending);
        assert!(ess < 200.0, "trending ess {ess}");
    }

    #[test]
    fn diagnose_reports_per_parameter_results() {
        let values: Vec<f64> = (0..60).map(|t| if t < 30 { 0.0 } else { 8.0 }).collect();
        let series = Series::from_values(values).unwrap();
        let spec = ModelSpec::new(1, Likelihood::Gaussian);
        let config = SamplerConfig {
            n_chains: 4,
            n_collect: 300,
            n_tune: 100,
            ..SamplerConfig::default()
        };
        let result = fit(&series, &spec, &config).unwrap();
        let report = diagnose(&result.trace).unwrap();
        assert_eq!(report.model, "gaussian-k1");
        assert_eq!(report.params.len(), 5);
        assert_eq!(report.n_chains, 4);
        for p in &report.params {
            assert!(p.rhat.is_finite(), "{}: rhat {}", p.name, p.rhat);
            assert!(p.ess > 0.0);
        }
    }

    #[test]
    fn flagged_chains_are_excluded_unless_opted_in() {
        let values: Vec<f64> = (0..50).map(|t| if t < 25 { 1.0 } else { 6.0 }).collect();
        let series = Series::from_values(values).unwrap();
        let spec = ModelSpec::new(1, Likelihood::Gaussian);
        let config = SamplerConfig {
            n_chains: 3,
            n_collect: 150,
            n_tune: 75,
            ..SamplerConfig::default()
        };
        let mut trace = fit(&series, &spec, &config).unwrap().trace;
        trace.chains[2].degenerate = true;

        // The flag never drops the chain from the trace.
        assert_eq!(trace.chains.len(), 3);
        assert_eq!(trace.healthy_chains().len(), 2);

        let strict = diagnose(&trace).unwrap();
        assert_eq!(strict.n_chains, 2);
        assert!(
            strict.warnings.iter().any(|w| w.contains("excluded")),
            "warnings: {:?}",
            strict.warnings
        );

        let lenient = diagnose_with_flagged(&trace).unwrap();
        assert_eq!(lenient.n_chains, 3);
        assert!(
            lenient.warnings.iter().any(|w| w.contains("included")),
            "warnings: {:?}",
            lenient.warnings
        );
    }

    #[test]
    fn opt_in_rescues_a_trace_with_one_flagged_chain() {
        let values: Vec<f64> = (0..40).map(|t| if t < 20 { 2.0 } else { 7.0 }).collect();
        let series = Series::from_values(values).unwrap();
        let spec = ModelSpec::new(1, Likelihood::Gaussian);
        let config = SamplerConfig {
            n_chains: 2,
            n_collect: 100,
            n_tune: 50,
            ..SamplerConfig::default()
        };
        let mut trace = fit(&series, &spec, &config).unwrap().trace;
        trace.chains[1].degenerate = true;

        assert!(matches!(
            diagnose(&trace).unwrap_err(),
            Error::DiagnosticsUnavailable { healthy: 1 }
        ));
        let report = diagnose_with_flagged(&trace).unwrap();
        assert_eq!(report.n_chains, 2);
        assert_eq!(report.n_draws, 100);
    }

    #[test]
    fn diagnose_requires_two_usable_chains() {
        let values: Vec<f64> = (0..40).map(|t| t as f64 * 0.1).collect();
        let series = Series::from_values(values).unwrap();
        let spec = ModelSpec::new(0, Likelihood::Gaussian);
        let config = SamplerConfig {
            n_chains: 1,
            n_collect: 50,
            n_tune: 20,
            ..SamplerConfig::default()
        };
        let result = fit(&series, &spec, &config).unwrap();
        assert!(matches!(
            diagnose(&result.trace).unwrap_err(),
            Error::DiagnosticsUnavailable { healthy: 1 }
        ));
    }
}
