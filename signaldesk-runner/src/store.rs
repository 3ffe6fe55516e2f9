//! Result store — JSON artifact (and optional CSV sidecar) for ranked results.
//!
//! The artifact is an array of `{symbol, status, sqn, earnings}` objects in rank
//! order. Numbers keep full precision; the two-decimal rounding only applies
//! to the rendered report. Existing artifacts are replaced, never truncated
//! in place.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use signaldesk_core::{BacktestResult, RankedResults};
use tempfile::NamedTempFile;

use crate::error::PersistenceError;

// ─── Paths ──────────────────────────────────────────────────────────

/// `backtest_results_<strategy>.json` under `output_dir`.
pub fn artifact_path(output_dir: &Path, strategy: &str) -> PathBuf {
    output_dir.join(format!("backtest_results_{strategy}.json"))
}

/// `backtest_results_<strategy>.csv` under `output_dir`.
pub fn csv_path(output_dir: &Path, strategy: &str) -> PathBuf {
    output_dir.join(format!("backtest_results_{strategy}.csv"))
}

/// Strategy name encoded in an artifact file name, if it follows the naming scheme.
pub fn strategy_from_artifact(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("backtest_results_")
        .filter(|s| !s.is_empty())
        .map(String::from)
}

// ─── JSON ───────────────────────────────────────────────────────────

/// Serialize results to pretty JSON with four-space indentation.
pub fn export_json(results: &[BacktestResult]) -> Result<String, PersistenceError> {
    let mut buf = Vec::with_capacity(results.len() * 96 + 2);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    results
        .serialize(&mut ser)
        .map_err(|e| PersistenceError::Serialize(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| PersistenceError::Serialize(e.to_string()))
}

/// Parse a JSON artifact. `origin` is used in error messages only.
pub fn import_json(json: &str, origin: &Path) -> Result<Vec<BacktestResult>, PersistenceError> {
    serde_json::from_str(json).map_err(|e| PersistenceError::Parse {
        path: origin.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write the ranked results to `path`, replacing any previous artifact.
///
/// The previous artifact stays intact until the new one is fully written.
pub fn save_results(ranked: &RankedResults, path: &Path) -> Result<(), PersistenceError> {
    let mut batch = ArtifactBatch::new();
    batch.stage_results(ranked, path)?;
    batch.commit()?;
    Ok(())
}

/// Load an artifact written by [`save_results`]. Order is preserved.
pub fn load_results(path: &Path) -> Result<Vec<BacktestResult>, PersistenceError> {
    let json = std::fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    import_json(&json, path)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Export ranked results as CSV.
///
/// Columns: rank, symbol, status, sqn, earnings. Ranks are 1-based.
pub fn export_csv(results: &[BacktestResult]) -> Result<String, PersistenceError> {
    let csv_err = |e: csv::Error| PersistenceError::Serialize(e.to_string());
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["rank", "symbol", "status", "sqn", "earnings"])
        .map_err(csv_err)?;
    for (i, r) in results.iter().enumerate() {
        wtr.write_record([
            &(i + 1).to_string(),
            &r.symbol,
            r.status.name(),
            &r.sqn.to_string(),
            &r.earnings.to_string(),
        ])
        .map_err(csv_err)?;
    }

    let data = wtr
        .into_inner()
        .map_err(|e| PersistenceError::Serialize(e.to_string()))?;
    String::from_utf8(data).map_err(|e| PersistenceError::Serialize(e.to_string()))
}

/// Write the CSV sidecar to `path`.
pub fn save_csv(ranked: &RankedResults, path: &Path) -> Result<(), PersistenceError> {
    let mut batch = ArtifactBatch::new();
    batch.stage_csv(ranked, path)?;
    batch.commit()?;
    Ok(())
}

// ─── Staged writes ──────────────────────────────────────────────────

/// A set of artifacts written together.
///
/// Each staged artifact goes to a temporary file next to its target. Nothing
/// is replaced until [`ArtifactBatch::commit`] renames them into place, and a
/// batch dropped without committing removes its temporary files, so a failure
/// while writing leaves the previous artifacts untouched.
#[derive(Debug, Default)]
pub struct ArtifactBatch {
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl ArtifactBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn stage_results(
        &mut self,
        ranked: &RankedResults,
        path: &Path,
    ) -> Result<(), PersistenceError> {
        let json = export_json(ranked.as_slice())?;
        self.stage(path, json.as_bytes())
    }

    pub fn stage_csv(
        &mut self,
        ranked: &RankedResults,
        path: &Path,
    ) -> Result<(), PersistenceError> {
        let csv = export_csv(ranked.as_slice())?;
        self.stage(path, csv.as_bytes())
    }

    /// Write `contents` to a temporary file in `path`'s directory.
    pub fn stage(&mut self, path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        };

        // a directory in the way would only fail at rename time
        if path.is_dir() {
            return Err(write_err(io::Error::new(
                io::ErrorKind::Other,
                "target is a directory",
            )));
        }

        let dir = ensure_parent(path)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".backtest_results")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(write_err)?;
        tmp.write_all(contents).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    /// Move every staged file into place, in staging order.
    pub fn commit(self) -> Result<Vec<PathBuf>, PersistenceError> {
        let mut committed = Vec::with_capacity(self.staged.len());
        for (tmp, path) in self.staged {
            tmp.persist(&path).map_err(|e| PersistenceError::Write {
                path: path.clone(),
                source: e.error,
            })?;
            tracing::info!(path = %path.display(), "saved artifact");
            committed.push(path);
        }
        Ok(committed)
    }
}

/// Create `path`'s directory if needed and return it.
fn ensure_parent(path: &Path) -> Result<PathBuf, PersistenceError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| PersistenceError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
            Ok(parent.to_path_buf())
        }
        _ => Ok(PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signaldesk_core::{rank, Status};

    fn sample() -> RankedResults {
        rank(vec![
            BacktestResult::new("MSFT", "HOLD", 0.9, -30.0),
            BacktestResult::new("AAPL", "BUY", 1.5, 120.0),
            BacktestResult::new("GOOG", "SELL", 2.1, 75.0),
        ])
    }

    #[test]
    fn json_uses_status_names_and_field_order() {
        let json = export_json(sample().as_slice()).unwrap();
        let expected_first = "[\n    {\n        \"symbol\": \"AAPL\",\n        \"status\": \"BUY\",\n        \"sqn\": 1.5,\n        \"earnings\": 120.0\n    },";
        assert!(json.starts_with(expected_first), "got:\n{json}");
    }

    #[test]
    fn json_keeps_full_precision() {
        let ranked = rank(vec![BacktestResult::new(
            "PREC",
            "BUY",
            1.234_567_890_123_456_7,
            -0.000_123_456_789,
        )]);
        let json = export_json(ranked.as_slice()).unwrap();
        let back = import_json(&json, Path::new("mem")).unwrap();
        assert_eq!(back[0].sqn, 1.234_567_890_123_456_7);
        assert_eq!(back[0].earnings, -0.000_123_456_789);
    }

    #[test]
    fn non_finite_values_round_trip_as_nan() {
        let ranked = rank(vec![BacktestResult::new("X", "HOLD", f64::NAN, f64::INFINITY)]);
        let json = export_json(ranked.as_slice()).unwrap();
        assert!(json.contains("null"));
        let back = import_json(&json, Path::new("mem")).unwrap();
        assert!(back[0].sqn.is_nan());
        assert!(back[0].earnings.is_nan());
    }

    #[test]
    fn save_overwrites_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), "RSIStrategy");
        std::fs::write(&path, "stale").unwrap();

        save_results(&sample(), &path).unwrap();

        let loaded = load_results(&path).unwrap();
        assert_eq!(loaded, sample().into_vec());
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(&dir.path().join("nested/out"), "UltimateStrategy");
        save_results(&sample(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_to_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should go
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(
            save_results(&sample(), &path),
            Err(PersistenceError::Write { .. })
        ));
    }

    #[test]
    fn load_rejects_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"symbol\": 1}").unwrap();
        assert!(matches!(
            load_results(&path),
            Err(PersistenceError::Parse { .. })
        ));
    }

    #[test]
    fn csv_has_rank_column_and_full_precision() {
        let ranked = rank(vec![
            BacktestResult::new("B", "SELL", 0.333, 1.0 / 3.0),
            BacktestResult::new("A", "BUY", 2.0, 10.5),
        ]);
        let csv = export_csv(ranked.as_slice()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "rank,symbol,status,sqn,earnings");
        assert_eq!(lines[1], "1,A,BUY,2,10.5");
        assert_eq!(lines[2], format!("2,B,SELL,0.333,{}", 1.0_f64 / 3.0));
    }

    #[test]
    fn unknown_status_survives_round_trip() {
        let ranked = rank(vec![BacktestResult::new("Q", "UNKNOWN", 0.0, 0.0)]);
        let json = export_json(ranked.as_slice()).unwrap();
        let back = import_json(&json, Path::new("mem")).unwrap();
        assert_eq!(back[0].status, Status::Other("UNKNOWN".into()));
    }

    #[test]
    fn artifact_names_follow_strategy() {
        assert_eq!(
            artifact_path(Path::new("out"), "RSIStrategy"),
            Path::new("out/backtest_results_RSIStrategy.json")
        );
        assert_eq!(
            csv_path(Path::new("out"), "RSIStrategy"),
            Path::new("out/backtest_results_RSIStrategy.csv")
        );
    }

    #[test]
    fn strategy_is_recovered_from_artifact_name() {
        let path = artifact_path(Path::new("out"), "UltimateStrategy");
        assert_eq!(strategy_from_artifact(&path).as_deref(), Some("UltimateStrategy"));
        assert_eq!(strategy_from_artifact(Path::new("results.json")), None);
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn dropped_batch_leaves_previous_artifacts_and_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = artifact_path(dir.path(), "UltimateStrategy");
        std::fs::write(&first, "previous").unwrap();

        let mut batch = ArtifactBatch::new();
        batch.stage_results(&sample(), &first).unwrap();
        batch
            .stage_csv(&sample(), &csv_path(dir.path(), "UltimateStrategy"))
            .unwrap();
        assert_eq!(batch.len(), 2);
        drop(batch);

        assert_eq!(std::fs::read_to_string(&first).unwrap(), "previous");
        assert_eq!(dir_entries(dir.path()), vec!["backtest_results_UltimateStrategy.json"]);
    }

    #[test]
    fn staging_onto_a_directory_fails_before_anything_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let first = artifact_path(dir.path(), "UltimateStrategy");
        let second = artifact_path(dir.path(), "RSIStrategy");
        std::fs::create_dir(&second).unwrap();

        let mut batch = ArtifactBatch::new();
        batch.stage_results(&sample(), &first).unwrap();
        let err = batch.stage_results(&sample(), &second).unwrap_err();
        drop(batch);

        assert!(matches!(err, PersistenceError::Write { .. }));
        assert!(!first.exists());
    }

    #[test]
    fn commit_moves_every_staged_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let json = artifact_path(dir.path(), "RSIStrategy");
        let csv = csv_path(dir.path(), "RSIStrategy");

        let mut batch = ArtifactBatch::new();
        batch.stage_results(&sample(), &json).unwrap();
        batch.stage_csv(&sample(), &csv).unwrap();
        let committed = batch.commit().unwrap();

        assert_eq!(committed, vec![json.clone(), csv]);
        assert_eq!(load_results(&json).unwrap(), sample().into_vec());
        assert_eq!(
            dir_entries(dir.path()),
            vec!["backtest_results_RSIStrategy.csv", "backtest_results_RSIStrategy.json"]
        );
    }
}
