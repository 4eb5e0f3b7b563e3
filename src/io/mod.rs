/*!
# I/O Utilities

Optional export of posterior traces to CSV. Enable via the `csv` feature.
*/

#[cfg(feature = "csv")]
pub mod csv;
