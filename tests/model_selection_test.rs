use changepoint_mcmc::compare::compare;
use changepoint_mcmc::model::{Likelihood, ModelSpec};
use changepoint_mcmc::sampler::{fit, SamplerConfig};
use changepoint_mcmc::series::Series;
use rand::prelude::*;
use rand_distr::StandardNormal;

fn config(seed: u64) -> SamplerConfig {
    SamplerConfig {
        n_chains: 2,
        n_collect: 400,
        n_tune: 200,
        seed,
        ..SamplerConfig::default()
    }
}

#[test]
fn break_model_beats_flat_model_by_more_than_one_se() {
    let mut rng = SmallRng::seed_from_u64(17);
    let values: Vec<f64> = (0..100)
        .map(|t| {
            let base = if t < 50 { 0.0 } else { 3.0 };
            let z: f64 = rng.sample(StandardNormal);
            base + z
        })
        .collect();
    let series = Series::from_values(values).unwrap();

    let k1 = fit(&series, &ModelSpec::new(1, Likelihood::Gaussian), &config(1))
        .unwrap()
        .trace;
    let k0 = fit(&series, &ModelSpec::new(0, Likelihood::Gaussian), &config(2))
        .unwrap()
        .trace;

    let table = compare(&[k0, k1]).unwrap();
    assert_eq!(table.best().model, "gaussian-k1");
    let flat = &table.scores[1];
    assert!(
        flat.delta_waic > flat.delta_se,
        "WAIC gap {:.2} not beyond its standard error {:.2}",
        flat.delta_waic,
        flat.delta_se
    );
    assert!(!flat.indistinguishable);
    // WAIC and TIS-LOO should agree on the ranking here.
    assert!(table.best().loo < flat.loo);
}

#[test]
fn heavy_tailed_likelihood_wins_under_outliers() {
    let mut rng = SmallRng::seed_from_u64(29);
    let values: Vec<f64> = (0..120)
        .map(|t| {
            let base = if t < 60 { 0.0 } else { 4.0 };
            let z: f64 = rng.sample(StandardNormal);
            // A handful of gross outliers the Gaussian must absorb by
            // inflating sigma.
            let spike = if t % 20 == 7 { 15.0 } else { 0.0 };
            base + 0.5 * z + spike
        })
        .collect();
    let series = Series::from_values(values).unwrap();

    let gaussian = fit(&series, &ModelSpec::new(1, Likelihood::Gaussian), &config(3))
        .unwrap()
        .trace;
    let student = fit(
        &series,
        &ModelSpec::new(1, Likelihood::StudentT { df: 4.0 }),
        &config(4),
    )
    .unwrap()
    .trace;

    let table = compare(&[gaussian, student]).unwrap();
    assert_eq!(table.best().model, "student-t4-k1");
}

#[test]
fn ranking_table_renders_every_candidate() {
    let values: Vec<f64> = (0..60).map(|t| if t < 30 { 1.0 } else { 5.0 }).collect();
    let series = Series::from_values(values).unwrap();
    let k1 = fit(&series, &ModelSpec::new(1, Likelihood::Gaussian), &config(5))
        .unwrap()
        .trace;
    let k2 = fit(&series, &ModelSpec::new(2, Likelihood::Gaussian), &config(6))
        .unwrap()
        .trace;

    let table = compare(&[k1, k2]).unwrap();
    let rendered = table.render();
    assert!(rendered.contains("gaussian-k1"));
    assert!(rendered.contains("gaussian-k2"));
    assert!(rendered.lines().count() >= 3);
}
