// Writes `predictions.json`: arxiv_id → generated label, one
// entry per test record, in dataset order.

use anyhow::{ensure, Result};
use serde_json::{Map, Value};
use std::path::Path;

use crate::infra::json;

pub const PREDICTIONS_FILE: &str = "predictions.json";

/// `ids` and `texts` are row-aligned. A repeated id keeps its
/// first position and the last prediction.
pub fn write_predictions(dir: &Path, ids: &[String], texts: &[String]) -> Result<()> {
    ensure!(
        ids.len() == texts.len(),
        "{} ids but {} predictions", ids.len(), texts.len()
    );

    let mut object = Map::new();
    for (id, text) in ids.iter().zip(texts) {
        object.insert(id.clone(), Value::String(text.clone()));
    }

    let path = dir.join(PREDICTIONS_FILE);
    json::write_pretty(&path, &object)?;
    tracing::info!("Wrote {} predictions to '{}'", object.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_exact_file_content() {
        let tmp = tempfile::tempdir().unwrap();
        write_predictions(
            tmp.path(),
            &["1".into(), "2".into()],
            &["cv, image classification".into(), "nlp, text summarization".into()],
        )
        .unwrap();

        let text = fs::read_to_string(tmp.path().join(PREDICTIONS_FILE)).unwrap();
        assert_eq!(
            text,
            "{\n    \"1\": \"cv, image classification\",\n    \"2\": \"nlp, text summarization\"\n}\n"
        );
    }

    #[test]
    fn test_keeps_dataset_order_and_unicode() {
        let tmp = tempfile::tempdir().unwrap();
        write_predictions(
            tmp.path(),
            &["b".into(), "a".into()],
            &["vision, détection".into(), "nlp, qa".into()],
        )
        .unwrap();

        let text = fs::read_to_string(tmp.path().join(PREDICTIONS_FILE)).unwrap();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
        assert!(text.contains("détection"));
    }

    #[test]
    fn test_misaligned_inputs_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(write_predictions(tmp.path(), &["1".into()], &[]).is_err());
    }
}
