// ============================================================
// Layer 6: Metrics
// ============================================================
// Two sinks:
//
//   metrics.csv             one row per logging step
//                             step,epoch,loss,learning_rate
//                             500,0.400000,2.184512,0.000048
//
//   {split}_results.json    final metrics of a phase
//   all_results.json        every phase merged, keys sorted
//
// The CSV is appended to, so a resumed run continues the same
// learning curve.

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::Metrics;
use crate::infra::json;

pub const CSV_FILE:         &str = "metrics.csv";
pub const ALL_RESULTS_FILE: &str = "all_results.json";

/// One logged optimiser step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetrics {
    pub step:          usize,
    pub epoch:         f64,
    /// Mean training loss since the previous row
    pub loss:          f64,
    pub learning_rate: f64,
}

impl StepMetrics {
    /// The same values as a `log_history` entry.
    pub fn to_metrics(&self) -> Metrics {
        Metrics::from([
            ("step".to_string(), self.step as f64),
            ("epoch".to_string(), self.epoch),
            ("loss".to_string(), self.loss),
            ("learning_rate".to_string(), self.learning_rate),
        ])
    }
}

/// Appends step metrics to `metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join(CSV_FILE);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "step,epoch,loss,learning_rate")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &StepMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{:.6},{:.6},{:.6e}", m.step, m.epoch, m.loss, m.learning_rate)?;

        tracing::info!(
            "step {} | epoch {:.2} | loss {:.4} | lr {:.3e}",
            m.step, m.epoch, m.loss, m.learning_rate,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Phase results ────────────────────────────────────────────────────────────
/// Write `{split}_results.json` and merge into `all_results.json`.
pub fn save_metrics(dir: &Path, split: &str, metrics: &Metrics) -> Result<()> {
    json::write_pretty(&dir.join(format!("{split}_results.json")), metrics)?;

    let all_path = dir.join(ALL_RESULTS_FILE);
    let mut all: Metrics = if all_path.exists() { json::read(&all_path)? } else { Metrics::new() };
    all.extend(metrics.iter().map(|(k, v)| (k.clone(), *v)));
    json::write_pretty(&all_path, &all)
}

/// Print a phase's metrics to the log, one per line.
pub fn log_metrics(split: &str, metrics: &Metrics) {
    tracing::info!("***** {} metrics *****", split);
    let width = metrics.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in metrics {
        tracing::info!("  {:<width$} = {}", key, value, width = width);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_and_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&StepMetrics { step: 2, epoch: 0.5, loss: 1.25, learning_rate: 5e-5 }).unwrap();

        // a second logger on the same directory appends
        let again = MetricsLogger::new(tmp.path()).unwrap();
        again.log(&StepMetrics { step: 4, epoch: 1.0, loss: 1.0, learning_rate: 0.0 }).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "step,epoch,loss,learning_rate");
        assert!(lines[1].starts_with("2,0.500000,1.250000,"));
        assert!(lines[2].starts_with("4,1.000000,"));
    }

    #[test]
    fn test_results_merge_across_phases() {
        let tmp = tempfile::tempdir().unwrap();
        save_metrics(tmp.path(), "train", &Metrics::from([("train_loss".into(), 1.5)])).unwrap();
        save_metrics(tmp.path(), "eval", &Metrics::from([("eval_loss".into(), 2.0)])).unwrap();

        let train: Metrics = json::read(&tmp.path().join("train_results.json")).unwrap();
        assert_eq!(train.len(), 1);

        let all = fs::read_to_string(tmp.path().join(ALL_RESULTS_FILE)).unwrap();
        assert_eq!(all, "{\n    \"eval_loss\": 2.0,\n    \"train_loss\": 1.5\n}\n");
    }

    #[test]
    fn test_step_metrics_as_history_entry() {
        let m = StepMetrics { step: 3, epoch: 1.5, loss: 0.5, learning_rate: 1e-4 }.to_metrics();
        assert_eq!(m["step"], 3.0);
        assert_eq!(m.len(), 4);
    }
}
