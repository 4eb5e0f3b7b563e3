/*!
# MCMC Sampler

Gibbs-within-Metropolis sampler for the piecewise-regime change-point model.
Each requested chain runs independently over the same immutable
[`Series`](crate::series::Series) and [`ModelSpec`](crate::model::ModelSpec),
owning its private state (parameter history, RNG, adaptive step sizes), so
chains run in parallel via `rayon` with no shared mutable state. Chain `i` is
seeded `config.seed + i`; identical seed + config + data produce an identical
trace.

Per sweep:

- **Change points**: each `τ_j` is redrawn by full categorical enumeration of
  its conditional posterior over the range bounded by the neighboring change
  points — exact Gibbs for the discrete parameter, and the ordering constraint
  holds by construction.
- **Regime parameters**: under the Gaussian likelihood the Normal/Inverse-Gamma
  priors are conjugate, so `μ_i` and `σ_i²` are drawn from their closed-form
  conditionals restricted to the regime's observations (empty regimes draw
  from the prior). Under the Student-t likelihood each parameter takes a
  univariate random-walk Metropolis step (`σ²` on the log scale), with step
  sizes adapted toward a 0.44 acceptance rate during tuning only.

The first `n_tune` sweeps adapt proposal scales and are discarded; thinning
keeps every `thin`-th post-tuning sweep until `n_collect` draws are retained.
Every retained draw stores the per-observation log-likelihood so model
comparison never re-runs the model.

## Example

```rust
use changepoint_mcmc::model::{Likelihood, ModelSpec};
use changepoint_mcmc::sampler::{fit, SamplerConfig};
use changepoint_mcmc::series::Series;

let values: Vec<f64> = (0..60).map(|t| if t < 30 { 1.0 } else { 5.0 }).collect();
let series = Series::from_values(values).unwrap();
let spec = ModelSpec::new(1, Likelihood::Gaussian);
let config = SamplerConfig {
    n_chains: 2,
    n_collect: 100,
    n_tune: 50,
    ..SamplerConfig::default()
};

let result = fit(&series, &spec, &config).unwrap();
assert_eq!(result.trace.chains.len(), 2);
assert_eq!(result.trace.chains[0].samples.nrows(), 100);
```
*/

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use ndarray::prelude::*;
use rand::prelude::*;
use rand_distr::{Gamma, StandardNormal};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{inv_gamma_log_density, Likelihood, ModelSpec, ParameterVector};
use crate::series::Series;

/// Attempted jittered starting points before a chain reports an
/// initialization error.
const INIT_ATTEMPTS: usize = 10;
/// Tuning iterations per step-size adaptation batch.
const TUNE_BATCH: usize = 50;
/// Target acceptance rate for univariate random-walk updates.
const TARGET_ACCEPT: f64 = 0.44;
/// Lower bound on regime volatility to keep densities evaluable.
const SIGMA_FLOOR: f64 = 1e-8;

/// Cooperative cancellation flag checked between sampler iterations.
///
/// Cancelling never discards work: chains stop at the next iteration boundary
/// and their partial output is kept, marked `complete = false`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Sampler settings. The caller supplies a maximum iteration count; there is
/// no wall-clock deadline enforced internally.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of independent chains.
    pub n_chains: usize,
    /// Retained posterior draws per chain (after tuning and thinning).
    pub n_collect: usize,
    /// Tuning sweeps, used to adapt proposal scales and then discarded.
    pub n_tune: usize,
    /// Keep every `thin`-th post-tuning sweep (1 = keep all).
    pub thin: usize,
    /// Global seed; chain `i` uses `seed + i`.
    pub seed: u64,
    /// Worker threads for running chains; `None` uses the global rayon pool.
    pub workers: Option<usize>,
    /// Show per-chain progress bars.
    pub progress: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_chains: 4,
            n_collect: 1000,
            n_tune: 500,
            thin: 1,
            seed: 42,
            workers: None,
            progress: false,
        }
    }
}

impl SamplerConfig {
    fn validate(&self) -> Result<()> {
        if self.n_chains == 0 {
            return Err(Error::SamplerConfig("n_chains must be at least 1".into()));
        }
        if self.n_collect == 0 {
            return Err(Error::SamplerConfig("n_collect must be at least 1".into()));
        }
        if self.thin == 0 {
            return Err(Error::SamplerConfig("thin must be at least 1".into()));
        }
        if self.workers == Some(0) {
            return Err(Error::SamplerConfig("workers must be at least 1".into()));
        }
        Ok(())
    }
}

/// Output of one chain: retained draws plus health flags.
#[derive(Debug, Clone)]
pub struct ChainRun {
    /// Retained draws, one row per draw, columns in
    /// [`ModelSpec::param_names`] order.
    pub samples: Array2<f64>,
    /// Per-draw, per-observation log-likelihood (draws × T).
    pub pointwise_log_lik: Array2<f64>,
    /// The seed this chain ran with.
    pub seed: u64,
    /// False when the chain was cancelled before collecting every draw.
    pub complete: bool,
    /// True when numerical overflow or persistent rejection was observed.
    /// Degenerate chains are flagged, never discarded.
    pub degenerate: bool,
    /// Post-tuning acceptance rate of the Metropolis updates
    /// (1.0 for the fully conjugate Gaussian path).
    pub accept_rate: f64,
}

impl ChainRun {
    pub fn n_draws(&self) -> usize {
        self.samples.nrows()
    }

    /// Complete and not degenerate.
    pub fn is_healthy(&self) -> bool {
        self.complete && !self.degenerate
    }
}

/// The posterior samples produced for one model specification fit.
/// Read-only after `fit`; diagnostics and summaries are derived views.
#[derive(Debug, Clone)]
pub struct Trace {
    /// Model identifier, e.g. `"gaussian-k1"`.
    pub model: String,
    pub n_change_points: usize,
    pub series_len: usize,
    /// Column names for [`ChainRun::samples`].
    pub param_names: Vec<String>,
    pub chains: Vec<ChainRun>,
}

impl Trace {
    pub fn n_params(&self) -> usize {
        self.param_names.len()
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|n| n == name)
    }

    /// Chains that completed without degeneracy and hold at least one draw.
    pub fn healthy_chains(&self) -> Vec<&ChainRun> {
        self.usable_chains(false)
    }

    pub(crate) fn usable_chains(&self, include_flagged: bool) -> Vec<&ChainRun> {
        self.chains
            .iter()
            .filter(|c| c.n_draws() > 0 && (include_flagged || c.is_healthy()))
            .collect()
    }

    /// Pools one parameter column across all healthy chains.
    pub fn pooled(&self, param: usize) -> Vec<f64> {
        let mut out = Vec::new();
        for chain in self.healthy_chains() {
            out.extend(chain.samples.column(param).iter().copied());
        }
        out
    }
}

/// A chain that failed before producing any draws; reported alongside the
/// trace so one bad chain never aborts the healthy ones.
#[derive(Debug, Clone)]
pub struct ChainFailure {
    pub chain: usize,
    pub message: String,
}

/// Everything `fit` produces: the trace plus isolated per-chain failures.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub trace: Trace,
    pub failures: Vec<ChainFailure>,
}

/// Fits `spec` to `series`, producing one chain per requested run.
///
/// Configuration and data errors abort before any sampling starts; per-chain
/// initialization failures are isolated into [`FitResult::failures`].
pub fn fit(series: &Series, spec: &ModelSpec, config: &SamplerConfig) -> Result<FitResult> {
    ChangePointSampler::new(series, spec, config)?.run()
}

/// Like [`fit`], with a cancellation point checked between iterations.
pub fn fit_cancellable(
    series: &Series,
    spec: &ModelSpec,
    config: &SamplerConfig,
    token: &CancelToken,
) -> Result<FitResult> {
    ChangePointSampler::new(series, spec, config)?.run_cancellable(token)
}

/// The sampler owning immutable inputs; chains borrow them and mutate only
/// their private state.
#[derive(Debug, Clone)]
pub struct ChangePointSampler {
    spec: ModelSpec,
    series: Series,
    config: SamplerConfig,
}

impl ChangePointSampler {
    /// Validates the model against the series and the sampler configuration.
    pub fn new(series: &Series, spec: &ModelSpec, config: &SamplerConfig) -> Result<Self> {
        spec.validate(series)?;
        config.validate()?;
        Ok(Self {
            spec: spec.clone(),
            series: series.clone(),
            config: config.clone(),
        })
    }

    pub fn run(&self) -> Result<FitResult> {
        self.run_cancellable(&CancelToken::new())
    }

    pub fn run_cancellable(&self, token: &CancelToken) -> Result<FitResult> {
        match self.config.workers {
            Some(workers) => rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?
                .install(|| self.run_chains(token)),
            None => self.run_chains(token),
        }
    }

    fn run_chains(&self, token: &CancelToken) -> Result<FitResult> {
        let multi = self.config.progress.then(MultiProgress::new);
        let pb_style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("Expected progress bar template to parse")
            .progress_chars("##-");
        let total_sweeps = self.config.n_tune + self.config.n_collect * self.config.thin;

        let results: Vec<Result<ChainRun>> = (0..self.config.n_chains)
            .into_par_iter()
            .map(|i| {
                let pb = multi.as_ref().map(|m| {
                    let pb = m.add(ProgressBar::new(total_sweeps as u64));
                    pb.set_prefix(format!("Chain {i}"));
                    pb.set_style(pb_style.clone());
                    pb
                });
                let seed = self.config.seed + i as u64;
                let run = Chain::initialize(&self.spec, &self.series, i, seed)
                    .map(|chain| chain.run(&self.config, token, pb.as_ref()));
                if let Some(pb) = &pb {
                    match &run {
                        Ok(c) if c.complete => pb.finish_with_message("Done!"),
                        Ok(_) => pb.finish_with_message("Cancelled"),
                        Err(_) => pb.finish_with_message("Failed to initialize"),
                    }
                }
                run
            })
            .collect();

        let mut chains = Vec::with_capacity(self.config.n_chains);
        let mut failures = Vec::new();
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(chain) => chains.push(chain),
                Err(e) => failures.push(ChainFailure {
                    chain: i,
                    message: e.to_string(),
                }),
            }
        }
        if chains.is_empty() {
            return Err(Error::AllChainsFailed(self.config.n_chains));
        }

        Ok(FitResult {
            trace: Trace {
                model: self.spec.label(),
                n_change_points: self.spec.n_change_points,
                series_len: self.series.len(),
                param_names: self.spec.param_names(),
                chains,
            },
            failures,
        })
    }
}

/// One Markov chain with its private RNG and adaptive proposal state.
struct Chain<'a> {
    spec: &'a ModelSpec,
    series: &'a Series,
    state: ParameterVector,
    rng: SmallRng,
    seed: u64,
    /// Random-walk step per regime mean (Student-t path only).
    step_mu: Vec<f64>,
    /// Random-walk step per regime log-variance (Student-t path only).
    step_sigma: Vec<f64>,
    acc_mu: Vec<usize>,
    acc_sigma: Vec<usize>,
    tune_batches: usize,
    overflow_events: usize,
    post_proposals: usize,
    post_accepts: usize,
}

impl<'a> Chain<'a> {
    /// Builds the starting state from evenly spaced change points and
    /// segment moments, jittering on retry until the posterior density is
    /// finite.
    fn initialize(
        spec: &'a ModelSpec,
        series: &'a Series,
        chain_idx: usize,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let k = spec.n_change_points;
        let t_len = series.len();
        let n_regimes = spec.n_regimes();

        let taus: Vec<usize> = (0..k).map(|j| (j + 1) * t_len / (k + 1)).collect();
        let (base_mus, base_sigmas) = segment_moments(series.values(), &taus, n_regimes);

        for attempt in 0..INIT_ATTEMPTS {
            let mut state = ParameterVector {
                taus: taus.clone(),
                mus: base_mus.clone(),
                sigmas: base_sigmas.clone(),
            };
            if attempt > 0 {
                for i in 0..n_regimes {
                    let z: f64 = rng.sample(StandardNormal);
                    state.mus[i] += z * base_sigmas[i];
                    let z: f64 = rng.sample(StandardNormal);
                    state.sigmas[i] = (state.sigmas[i] * (0.5 * z).exp()).max(SIGMA_FLOOR);
                }
            }
            let lp = spec.log_prior(&state) + spec.log_likelihood(&state, series);
            if lp.is_finite() {
                let step_mu = base_sigmas.iter().map(|s| s.max(0.1)).collect();
                return Ok(Self {
                    spec,
                    series,
                    state,
                    rng,
                    seed,
                    step_mu,
                    step_sigma: vec![0.5; n_regimes],
                    acc_mu: vec![0; n_regimes],
                    acc_sigma: vec![0; n_regimes],
                    tune_batches: 0,
                    overflow_events: 0,
                    post_proposals: 0,
                    post_accepts: 0,
                });
            }
        }
        Err(Error::Initialization {
            chain: chain_idx,
            attempts: INIT_ATTEMPTS,
        })
    }

    fn run(
        mut self,
        config: &SamplerConfig,
        token: &CancelToken,
        pb: Option<&ProgressBar>,
    ) -> ChainRun {
        let t_len = self.series.len();
        let n_params = self.spec.n_params();
        let n_keep = config.n_collect;
        let total_post = n_keep * config.thin;

        let mut cancelled = false;
        for _ in 0..config.n_tune {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }
            self.sweep(true);
            if let Some(pb) = pb {
                pb.inc(1);
            }
        }

        let mut samples = Array2::<f64>::zeros((n_keep, n_params));
        let mut pointwise = Array2::<f64>::zeros((n_keep, t_len));
        let mut filled = 0usize;
        if !cancelled {
            for i in 0..total_post {
                if token.is_cancelled() {
                    break;
                }
                self.sweep(false);
                if (i + 1) % config.thin == 0 {
                    self.state.flatten_into(
                        samples
                            .row_mut(filled)
                            .as_slice_mut()
                            .expect("Expected sample row to be contiguous"),
                    );
                    self.spec.pointwise_log_likelihood(
                        &self.state,
                        self.series,
                        pointwise
                            .row_mut(filled)
                            .as_slice_mut()
                            .expect("Expected pointwise row to be contiguous"),
                    );
                    filled += 1;
                }
                if let Some(pb) = pb {
                    pb.inc(1);
                }
            }
        }

        let complete = filled == n_keep;
        if !complete {
            samples = samples.slice(s![..filled, ..]).to_owned();
            pointwise = pointwise.slice(s![..filled, ..]).to_owned();
        }

        let accept_rate = if self.post_proposals == 0 {
            1.0
        } else {
            self.post_accepts as f64 / self.post_proposals as f64
        };
        let overflow_budget = (config.n_tune + total_post) / 20 + 5;
        let persistent_rejection = self.post_proposals > 0 && filled > 0 && accept_rate < 0.01;
        let degenerate = self.overflow_events > overflow_budget || persistent_rejection;

        ChainRun {
            samples,
            pointwise_log_lik: pointwise,
            seed: self.seed,
            complete,
            degenerate,
            accept_rate,
        }
    }

    fn sweep(&mut self, tuning: bool) {
        self.update_change_points();
        match self.spec.likelihood {
            Likelihood::Gaussian => self.update_regimes_conjugate(),
            Likelihood::StudentT { .. } => self.update_regimes_metropolis(tuning),
        }
    }

    /// Exact Gibbs update for each change point: enumerate the conditional
    /// posterior over the range bounded by the neighbors, using prefix/suffix
    /// sums of the two adjacent regimes' log-densities so each candidate
    /// costs O(1) after one O(range) pass.
    fn update_change_points(&mut self) {
        let k = self.state.taus.len();
        if k == 0 {
            return;
        }
        let xs = self.series.values();
        let t_len = xs.len();

        for j in 0..k {
            let lo = if j == 0 { 0 } else { self.state.taus[j - 1] + 1 };
            let hi = if j + 1 == k {
                t_len - 1
            } else {
                self.state.taus[j + 1] - 1
            };
            if lo > hi {
                continue;
            }
            let span = hi - lo + 1;
            let (mu_l, sigma_l) = (self.state.mus[j], self.state.sigmas[j]);
            let (mu_r, sigma_r) = (self.state.mus[j + 1], self.state.sigmas[j + 1]);

            // Candidate c = lo + i assigns t in [lo, c) to the left regime
            // and t in [c, hi] to the right regime.
            let mut left_cum = vec![0.0; span + 1];
            for i in 1..=span {
                left_cum[i] =
                    left_cum[i - 1] + self.spec.obs_log_density(xs[lo + i - 1], mu_l, sigma_l);
            }
            let mut right_cum = vec![0.0; span + 1];
            for i in (0..span).rev() {
                right_cum[i] =
                    right_cum[i + 1] + self.spec.obs_log_density(xs[lo + i], mu_r, sigma_r);
            }

            let mut max_lw = f64::NEG_INFINITY;
            let log_weights: Vec<f64> = (0..span)
                .map(|i| {
                    let lw = left_cum[i] + right_cum[i];
                    if lw > max_lw {
                        max_lw = lw;
                    }
                    lw
                })
                .collect();
            if !max_lw.is_finite() {
                // Every candidate underflowed; keep the current location.
                self.overflow_events += 1;
                continue;
            }

            let weights: Vec<f64> = log_weights.iter().map(|lw| (lw - max_lw).exp()).collect();
            let total: f64 = weights.iter().sum();
            let mut u = self.rng.gen::<f64>() * total;
            let mut chosen = span - 1;
            for (i, w) in weights.iter().enumerate() {
                u -= w;
                if u <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            self.state.taus[j] = lo + chosen;
        }
    }

    /// Closed-form conditional draws for the Gaussian likelihood:
    /// `μ_i | σ_i², data` is Normal, `σ_i² | μ_i, data` is Inverse-Gamma,
    /// each restricted to the regime's current observations.
    fn update_regimes_conjugate(&mut self) {
        let xs = self.series.values();
        let t_len = xs.len();
        let k = self.state.taus.len();
        let prior_mu = self.spec.mu_prior;
        let prior_sigma = self.spec.sigma_prior;

        for i in 0..=k {
            let start = if i == 0 { 0 } else { self.state.taus[i - 1] };
            let end = if i == k { t_len } else { self.state.taus[i] };
            let seg = &xs[start..end];
            let n = seg.len() as f64;

            let var = self.state.sigmas[i] * self.state.sigmas[i];
            let z: f64 = self.rng.sample(StandardNormal);
            self.state.mus[i] = if seg.is_empty() {
                prior_mu.mean + prior_mu.std * z
            } else {
                let seg_mean = seg.iter().sum::<f64>() / n;
                let precision = 1.0 / (prior_mu.std * prior_mu.std) + n / var;
                let post_var = 1.0 / precision;
                let post_mean =
                    post_var * (prior_mu.mean / (prior_mu.std * prior_mu.std) + n * seg_mean / var);
                post_mean + post_var.sqrt() * z
            };

            let mu = self.state.mus[i];
            let sse: f64 = seg.iter().map(|&x| (x - mu) * (x - mu)).sum();
            let shape = prior_sigma.shape + 0.5 * n;
            let scale = prior_sigma.scale + 0.5 * sse;
            let gamma = Gamma::new(shape, 1.0 / scale)
                .expect("Expected creation of gamma distribution to succeed");
            let precision_draw: f64 = gamma.sample(&mut self.rng);
            self.state.sigmas[i] = (1.0 / precision_draw).sqrt().max(SIGMA_FLOOR);
        }
    }

    /// Adaptive random-walk Metropolis for the non-conjugate (Student-t)
    /// likelihood: one univariate update per regime mean and one per regime
    /// log-variance, with the Jacobian term for the log parameterization.
    fn update_regimes_metropolis(&mut self, tuning: bool) {
        let spec = self.spec;
        let xs = self.series.values();
        let t_len = xs.len();
        let k = self.state.taus.len();
        let prior_mu = spec.mu_prior;
        let prior_sigma = spec.sigma_prior;

        for i in 0..=k {
            let start = if i == 0 { 0 } else { self.state.taus[i - 1] };
            let end = if i == k { t_len } else { self.state.taus[i] };
            let seg = &xs[start..end];

            // μ update.
            let sigma = self.state.sigmas[i];
            let mu_target = move |mu: f64| {
                let z = (mu - prior_mu.mean) / prior_mu.std;
                -0.5 * z * z + segment_log_lik(spec, seg, mu, sigma)
            };
            let current = self.state.mus[i];
            let (next, mu_accepted) = self.mh_step(current, self.step_mu[i], &mu_target);
            self.state.mus[i] = next;
            if mu_accepted {
                self.acc_mu[i] += 1;
            }

            // σ² update on θ = ln σ²; the extra θ is the Jacobian.
            let mu = self.state.mus[i];
            let sigma_target = move |theta: f64| {
                let v = theta.exp();
                inv_gamma_log_density(v, prior_sigma)
                    + theta
                    + segment_log_lik(spec, seg, mu, v.sqrt().max(SIGMA_FLOOR))
            };
            let current = (self.state.sigmas[i] * self.state.sigmas[i]).ln();
            let (next, sigma_accepted) = self.mh_step(current, self.step_sigma[i], &sigma_target);
            self.state.sigmas[i] = (0.5 * next).exp().max(SIGMA_FLOOR);
            if sigma_accepted {
                self.acc_sigma[i] += 1;
            }

            if !tuning {
                self.post_proposals += 2;
                self.post_accepts += mu_accepted as usize + sigma_accepted as usize;
            }
        }

        if tuning {
            self.adapt_steps();
        }
    }

    /// One Metropolis accept/reject on a scalar. A non-finite proposal
    /// density (numerical overflow) is retried once with half the step; a
    /// second failure counts toward the degeneracy budget and rejects.
    fn mh_step(&mut self, current: f64, step: f64, log_target: &dyn Fn(f64) -> f64) -> (f64, bool) {
        let current_lp = log_target(current);
        let mut step = step;
        for retry in 0..2 {
            let z: f64 = self.rng.sample(StandardNormal);
            let proposed = current + step * z;
            let proposed_lp = log_target(proposed);
            if proposed_lp.is_nan() {
                if retry == 0 {
                    step *= 0.5;
                    continue;
                }
                self.overflow_events += 1;
                return (current, false);
            }
            let log_accept_ratio = proposed_lp - current_lp;
            let u: f64 = self.rng.gen();
            return if log_accept_ratio > u.ln() {
                (proposed, true)
            } else {
                (current, false)
            };
        }
        (current, false)
    }

    /// Batched step-size adaptation during tuning, nudging each scale toward
    /// the target acceptance rate with a vanishing adaptation factor.
    fn adapt_steps(&mut self) {
        self.tune_batches += 1;
        if self.tune_batches % TUNE_BATCH != 0 {
            return;
        }
        let batch = (self.tune_batches / TUNE_BATCH) as f64;
        let delta = (1.0 / batch.sqrt()).min(0.1);
        for i in 0..self.step_mu.len() {
            let rate = self.acc_mu[i] as f64 / TUNE_BATCH as f64;
            self.step_mu[i] *= if rate > TARGET_ACCEPT {
                delta.exp()
            } else {
                (-delta).exp()
            };
            self.acc_mu[i] = 0;

            let rate = self.acc_sigma[i] as f64 / TUNE_BATCH as f64;
            self.step_sigma[i] *= if rate > TARGET_ACCEPT {
                delta.exp()
            } else {
                (-delta).exp()
            };
            self.acc_sigma[i] = 0;
        }
    }
}

fn segment_log_lik(spec: &ModelSpec, seg: &[f64], mu: f64, sigma: f64) -> f64 {
    seg.iter().map(|&x| spec.obs_log_density(x, mu, sigma)).sum()
}

/// Sample mean and standard deviation per regime segment, floored so that
/// constant segments still yield a usable starting volatility.
fn segment_moments(xs: &[f64], taus: &[usize], n_regimes: usize) -> (Vec<f64>, Vec<f64>) {
    let t_len = xs.len();
    let mut mus = Vec::with_capacity(n_regimes);
    let mut sigmas = Vec::with_capacity(n_regimes);
    for i in 0..n_regimes {
        let start = if i == 0 { 0 } else { taus[i - 1] };
        let end = if i + 1 == n_regimes { t_len } else { taus[i] };
        let seg = &xs[start..end];
        if seg.is_empty() {
            mus.push(0.0);
            sigmas.push(1.0);
            continue;
        }
        let n = seg.len() as f64;
        let mean = seg.iter().sum::<f64>() / n;
        let var = seg.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / n;
        mus.push(mean);
        sigmas.push(var.sqrt().max(1e-3));
    }
    (mus, sigmas)
}
