/*!
Bayesian change-point inference over univariate time series via MCMC.

Fit a piecewise-regime model with a configurable number of change points,
check convergence with split R-hat and effective sample size, summarize the
posterior with HPD intervals, and rank candidate models by WAIC.

```rust
use changepoint_mcmc::compare::compare;
use changepoint_mcmc::diagnostics::diagnose;
use changepoint_mcmc::model::{Likelihood, ModelSpec};
use changepoint_mcmc::sampler::{fit, SamplerConfig};
use changepoint_mcmc::series::Series;
use changepoint_mcmc::summary::summarize;

let values: Vec<f64> = (0..80).map(|t| if t < 40 { 1.0 } else { 6.0 }).collect();
let series = Series::from_values(values)?;
let config = SamplerConfig { n_collect: 200, n_tune: 100, ..SamplerConfig::default() };

let with_break = fit(&series, &ModelSpec::new(1, Likelihood::Gaussian), &config)?;
let without = fit(&series, &ModelSpec::new(0, Likelihood::Gaussian), &config)?;

let report = diagnose(&with_break.trace)?;
println!("converged: {}", report.converged);

let summary = summarize(&with_break.trace, &series, 0.95)?;
println!("break near t = {}", summary.change_points[0].mode_index);

let table = compare(&[with_break.trace, without.trace])?;
println!("{}", table.render());
# Ok::<(), changepoint_mcmc::error::Error>(())
```
*/

pub mod compare;
pub mod diagnostics;
pub mod error;
pub mod io;
pub mod model;
pub mod sampler;
pub mod series;
pub mod summary;
