/*!
# Saving Traces to CSV

Writes a posterior [`Trace`](crate::sampler::Trace) to a long-format CSV
file. Enable via the `csv` feature.
*/

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::error::Result;
use crate::sampler::Trace;

/**
Saves every retained draw of a trace as a CSV file.

The resulting file has a header row containing `"chain"`, `"draw"`, and one
column per tracked parameter (e.g. `mu[1]`, `sigma[1]`, `tau[1]`). Each
subsequent row holds one retained draw of one chain; incomplete and
degenerate chains are written too, so a cancelled run still exports whatever
it collected.

# Examples

```rust
use changepoint_mcmc::io::csv::save_trace_csv;
use changepoint_mcmc::model::{Likelihood, ModelSpec};
use changepoint_mcmc::sampler::{fit, SamplerConfig};
use changepoint_mcmc::series::Series;

let series = Series::from_values((0..20).map(f64::from).collect())?;
let spec = ModelSpec::new(0, Likelihood::Gaussian);
let config = SamplerConfig { n_chains: 1, n_collect: 10, n_tune: 10, ..SamplerConfig::default() };
let result = fit(&series, &spec, &config)?;
save_trace_csv(&result.trace, "/tmp/trace.csv")?;
# Ok::<(), changepoint_mcmc::error::Error>(())
```
*/
pub fn save_trace_csv<P: AsRef<Path>>(trace: &Trace, path: P) -> Result<()> {
    let mut wtr = Writer::from_writer(File::create(path)?);

    let mut header: Vec<String> = vec!["chain".to_string(), "draw".to_string()];
    header.extend(trace.param_names.iter().cloned());
    wtr.write_record(&header)?;

    for (chain_idx, chain) in trace.chains.iter().enumerate() {
        for (draw_idx, draw) in chain.samples.rows().into_iter().enumerate() {
            let mut row = vec![chain_idx.to_string(), draw_idx.to_string()];
            row.extend(draw.iter().map(|v| v.to_string()));
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::ChainRun;
    use csv::Reader;
    use ndarray::arr2;
    use ndarray::Array2;
    use std::fs;
    use tempfile::NamedTempFile;

    fn tiny_trace() -> Trace {
        let chain = ChainRun {
            samples: arr2(&[[1.0, 0.5, 3.0], [1.1, 0.6, 3.0]]),
            pointwise_log_lik: Array2::zeros((2, 4)),
            seed: 0,
            complete: true,
            degenerate: false,
            accept_rate: 1.0,
        };
        Trace {
            model: "gaussian-k1".into(),
            n_change_points: 1,
            series_len: 4,
            param_names: vec!["mu[1]".into(), "sigma[1]".into(), "tau[1]".into()],
            chains: vec![chain.clone(), chain],
        }
    }

    #[test]
    fn writes_header_and_one_row_per_draw() {
        let file = NamedTempFile::new().expect("Could not create temp file");
        save_trace_csv(&tiny_trace(), file.path()).unwrap();

        let contents = fs::read_to_string(file.path()).unwrap();
        let mut rdr = Reader::from_reader(contents.as_bytes());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "chain");
        assert_eq!(&headers[1], "draw");
        assert_eq!(&headers[2], "mu[1]");
        assert_eq!(&headers[4], "tau[1]");

        let records: Vec<csv::StringRecord> =
            rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 4);
        assert_eq!(&records[0][0], "0");
        assert_eq!(&records[3][0], "1");
        assert_eq!(&records[3][1], "1");
        assert_eq!(&records[1][2], "1.1");
    }

    #[test]
    fn empty_chains_write_header_only() {
        let mut trace = tiny_trace();
        for chain in &mut trace.chains {
            chain.samples = Array2::zeros((0, 3));
            chain.complete = false;
        }
        let file = NamedTempFile::new().expect("Could not create temp file");
        save_trace_csv(&trace, file.path()).unwrap();
        let contents = fs::read_to_string(file.path()).unwrap();
        assert_eq!(contents.trim(), "chain,draw,mu[1],sigma[1],tau[1]");
    }
}
