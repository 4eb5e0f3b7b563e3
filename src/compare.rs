/*!
# Model Comparison

Scores candidate models fit to the same series by predictive accuracy:
WAIC (widely applicable information criterion) on the deviance scale, plus a
truncated-importance-sampling LOO (leave-one-out) cross-check. Both are
computed from the per-draw pointwise log-likelihoods stored in the trace, so
comparison never re-runs a model.

Lower WAIC is better. The standard error of each pairwise difference is
computed from the paired pointwise contributions; when the best model's
margin over a rival is within one standard error the two are flagged as
indistinguishable, so "more change points fits better" never wins by noise.
*/

use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::sampler::Trace;

/// Predictive score of one candidate model.
#[derive(Debug, Clone)]
pub struct ModelScore {
    pub model: String,
    /// WAIC on the deviance scale (lower is better).
    pub waic: f64,
    pub waic_se: f64,
    /// Effective number of parameters (the WAIC penalty).
    pub p_waic: f64,
    /// Truncated-importance-sampling LOO, deviance scale.
    pub loo: f64,
    pub loo_se: f64,
    /// WAIC gap to the best model (0 for the best).
    pub delta_waic: f64,
    /// Standard error of that gap from the paired pointwise differences.
    pub delta_se: f64,
    /// True when the gap to the best model is within one standard error.
    pub indistinguishable: bool,
}

/// Candidate models ranked best-first by WAIC.
#[derive(Debug, Clone)]
pub struct ComparisonTable {
    pub scores: Vec<ModelScore>,
}

impl ComparisonTable {
    pub fn best(&self) -> &ModelScore {
        // `compare` guarantees at least one score.
        &self.scores[0]
    }

    /// Plain-text ranking table.
    pub fn render(&self) -> String {
        let mut out = String::from(
            "model                 waic      se    p_waic       loo    d_waic    d_se\n",
        );
        for s in &self.scores {
            let tie = if s.indistinguishable && s.delta_waic > 0.0 {
                " ~"
            } else {
                ""
            };
            out.push_str(&format!(
                "{:<18} {:>9.2} {:>7.2} {:>9.2} {:>9.2} {:>9.2} {:>7.2}{}\n",
                s.model, s.waic, s.waic_se, s.p_waic, s.loo, s.delta_waic, s.delta_se, tie
            ));
        }
        out
    }
}

/// Pointwise expected log predictive densities for one trace.
struct PointwiseScores {
    model: String,
    /// elpd contribution per observation, WAIC flavor.
    elpd_waic: Vec<f64>,
    elpd_loo: Vec<f64>,
    p_waic: f64,
}

/// Ranks `traces` (all fit to the same series) by WAIC.
///
/// # Errors
///
/// - empty candidate list or a trace without healthy draws →
///   [`Error::EmptyTrace`]
/// - traces fit to different series lengths → [`Error::SeriesMismatch`]
pub fn compare(traces: &[Trace]) -> Result<ComparisonTable> {
    let first = traces.first().ok_or(Error::EmptyTrace)?;
    for trace in traces {
        if trace.series_len != first.series_len {
            return Err(Error::SeriesMismatch(first.series_len, trace.series_len));
        }
    }

    let pointwise: Vec<PointwiseScores> = traces.iter().map(score_trace).collect::<Result<_>>()?;

    let best_idx = (0..pointwise.len())
        .min_by(|&a, &b| {
            deviance(&pointwise[a].elpd_waic).total_cmp(&deviance(&pointwise[b].elpd_waic))
        })
        .unwrap_or(0);
    let best = &pointwise[best_idx];

    let mut scores: Vec<ModelScore> = pointwise
        .iter()
        .map(|s| {
            let waic = deviance(&s.elpd_waic);
            let delta_waic = waic - deviance(&best.elpd_waic);
            // Paired SE: variance of the pointwise elpd differences.
            let diffs: Vec<f64> = s
                .elpd_waic
                .iter()
                .zip(&best.elpd_waic)
                .map(|(a, b)| a - b)
                .collect();
            let delta_se = 2.0 * scaled_sd(&diffs);
            ModelScore {
                model: s.model.clone(),
                waic,
                waic_se: 2.0 * scaled_sd(&s.elpd_waic),
                p_waic: s.p_waic,
                loo: deviance(&s.elpd_loo),
                loo_se: 2.0 * scaled_sd(&s.elpd_loo),
                delta_waic,
                delta_se,
                indistinguishable: delta_waic > 0.0 && delta_waic <= delta_se,
            }
        })
        .collect();
    scores.sort_by(|a, b| a.waic.total_cmp(&b.waic));
    Ok(ComparisonTable { scores })
}

/// Computes the pointwise WAIC and TIS-LOO contributions of one trace from
/// its stored log-likelihood matrix (pooled healthy chains, S draws × T).
fn score_trace(trace: &Trace) -> Result<PointwiseScores> {
    let chains = trace.healthy_chains();
    let s_total: usize = chains.iter().map(|c| c.n_draws()).sum();
    if s_total == 0 {
        return Err(Error::EmptyTrace);
    }
    let t_len = trace.series_len;
    let mut log_lik = Array2::<f64>::zeros((s_total, t_len));
    let mut row = 0;
    for chain in &chains {
        for draw in chain.pointwise_log_lik.rows() {
            log_lik.row_mut(row).assign(&draw);
            row += 1;
        }
    }

    let s_f = s_total as f64;
    let trunc = s_f.sqrt();
    let mut elpd_waic = Vec::with_capacity(t_len);
    let mut elpd_loo = Vec::with_capacity(t_len);
    let mut p_waic = 0.0;
    for i in 0..t_len {
        let col = log_lik.column(i);

        // lppd_i = log mean_s exp(ll_si), via log-sum-exp.
        let max_ll = col.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let sum_exp: f64 = col.iter().map(|&ll| (ll - max_ll).exp()).sum();
        let lppd = max_ll + (sum_exp / s_f).ln();

        // Penalty: posterior variance of the pointwise log-likelihood.
        let mean_ll = col.sum() / s_f;
        let var_ll = col.iter().map(|&ll| (ll - mean_ll) * (ll - mean_ll)).sum::<f64>()
            / (s_f - 1.0).max(1.0);
        p_waic += var_ll;
        elpd_waic.push(lppd - var_ll);

        // TIS-LOO: raw importance weight exp(-ll), truncated at mean · √S.
        let max_lw = -col.fold(f64::INFINITY, |a, &b| a.min(b));
        let mut weights: Vec<f64> = col.iter().map(|&ll| (-ll - max_lw).exp()).collect();
        let mean_w = weights.iter().sum::<f64>() / s_f;
        let cap = mean_w * trunc;
        for w in &mut weights {
            if *w > cap {
                *w = cap;
            }
        }
        let num: f64 = weights.iter().zip(col.iter()).map(|(w, &ll)| w * ll.exp()).sum();
        let den: f64 = weights.iter().sum();
        elpd_loo.push((num / den).ln());
    }

    Ok(PointwiseScores {
        model: trace.model.clone(),
        elpd_waic,
        elpd_loo,
        p_waic,
    })
}

/// `−2 Σ elpd_i`, the deviance-scale criterion.
fn deviance(elpd: &[f64]) -> f64 {
    -2.0 * elpd.iter().sum::<f64>()
}

/// `2 √(T · var(pointwise))`: deviance-scale standard error.
fn scaled_sd(pointwise: &[f64]) -> f64 {
    let t = pointwise.len() as f64;
    if t < 2.0 {
        return 0.0;
    }
    let mean = pointwise.iter().sum::<f64>() / t;
    let var = pointwise.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / (t - 1.0);
    (t * var).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Likelihood, ModelSpec};
    use crate::sampler::{fit, ChainRun, SamplerConfig};
    use crate::series::Series;
    use approx::assert_abs_diff_eq;

    fn constant_trace(model: &str, ll: f64, s: usize, t: usize) -> Trace {
        let chain = ChainRun {
            samples: Array2::zeros((s, 2)),
            pointwise_log_lik: Array2::from_elem((s, t), ll),
            seed: 0,
            complete: true,
            degenerate: false,
            accept_rate: 1.0,
        };
        Trace {
            model: model.into(),
            n_change_points: 0,
            series_len: t,
            param_names: vec!["mu[1]".into(), "sigma[1]".into()],
            chains: vec![chain],
        }
    }

    #[test]
    fn waic_of_a_constant_likelihood_has_zero_penalty() {
        // Every draw gives the same pointwise log-likelihood, so lppd_i = ll,
        // the variance penalty vanishes and waic = -2 · T · ll.
        let trace = constant_trace("flat", -1.5, 20, 10);
        let table = compare(&[trace]).unwrap();
        let score = table.best();
        assert_abs_diff_eq!(score.p_waic, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(score.waic, -2.0 * 10.0 * -1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(score.loo, score.waic, epsilon = 1e-9);
        assert_abs_diff_eq!(score.waic_se, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn better_constant_likelihood_ranks_first() {
        let good = constant_trace("good", -1.0, 20, 10);
        let bad = constant_trace("bad", -3.0, 20, 10);
        let table = compare(&[bad, good]).unwrap();
        assert_eq!(table.best().model, "good");
        assert_abs_diff_eq!(table.best().delta_waic, 0.0);
        assert_abs_diff_eq!(table.scores[1].delta_waic, 40.0, epsilon = 1e-9);
        // Constant pointwise differences have zero variance, so the gap is
        // not flagged as a tie.
        assert!(!table.scores[1].indistinguishable);
    }

    #[test]
    fn identical_models_are_indistinguishable() {
        let values: Vec<f64> = (0..40).map(|t| if t < 20 { 1.0 } else { 6.0 }).collect();
        let series = Series::from_values(values).unwrap();
        let spec = ModelSpec::new(1, Likelihood::Gaussian);
        let config = SamplerConfig {
            n_chains: 2,
            n_collect: 150,
            n_tune: 75,
            ..SamplerConfig::default()
        };
        let a = fit(&series, &spec, &config).unwrap().trace;
        let b = fit(
            &series,
            &spec,
            &SamplerConfig {
                seed: 99,
                ..config
            },
        )
        .unwrap()
        .trace;
        let table = compare(&[a, b]).unwrap();
        assert!(table.scores[1].indistinguishable);
        assert!(table.scores[1].delta_waic.abs() < 5.0);
    }

    #[test]
    fn change_point_model_wins_on_broken_data() {
        let values: Vec<f64> = (0..60).map(|t| if t < 30 { 0.0 } else { 10.0 }).collect();
        let series = Series::from_values(values).unwrap();
        let config = SamplerConfig {
            n_chains: 2,
            n_collect: 200,
            n_tune: 100,
            ..SamplerConfig::default()
        };
        let with_break = fit(&series, &ModelSpec::new(1, Likelihood::Gaussian), &config)
            .unwrap()
            .trace;
        let without = fit(&series, &ModelSpec::new(0, Likelihood::Gaussian), &config)
            .unwrap()
            .trace;
        let table = compare(&[without, with_break]).unwrap();
        assert_eq!(table.best().model, "gaussian-k1");
        let runner_up = &table.scores[1];
        assert!(
            runner_up.delta_waic > runner_up.delta_se,
            "gap {} within se {}",
            runner_up.delta_waic,
            runner_up.delta_se
        );
        assert!(!runner_up.indistinguishable);
    }

    #[test]
    fn rejects_mismatched_series_lengths() {
        let a = constant_trace("a", -1.0, 10, 8);
        let b = constant_trace("b", -1.0, 10, 9);
        assert!(matches!(
            compare(&[a, b]).unwrap_err(),
            Error::SeriesMismatch(8, 9)
        ));
        assert!(matches!(compare(&[]).unwrap_err(), Error::EmptyTrace));
    }
}
