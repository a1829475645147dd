use crate::analysis::prompt::{self, NOT_FOUND_TOKEN};
use crate::config::SettingsProvider;
use crate::errors::ModelError;
use crate::llm::LanguageModel;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a file should go, decided once from the model's free-form answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Destination(PathBuf),
    NoDestination,
}

impl Classification {
    /// Accept the answer only if, once trimmed, it is verbatim one of the configured folders
    pub fn parse(answer: &str, folders: &BTreeMap<PathBuf, String>) -> Self {
        let answer = answer.trim();
        if answer.is_empty() || answer == NOT_FOUND_TOKEN {
            return Self::NoDestination;
        }

        match folders
            .keys()
            .find(|path| path.as_os_str().to_string_lossy() == answer)
        {
            Some(path) => Self::Destination(path.clone()),
            None => {
                warn!(answer, "classifier answered with an unknown folder, ignoring");
                Self::NoDestination
            }
        }
    }

    pub fn destination(&self) -> Option<&PathBuf> {
        match self {
            Self::Destination(path) => Some(path),
            Self::NoDestination => None,
        }
    }
}

/// Picks a destination folder among the configured associations
pub struct Classifier {
    model: Arc<dyn LanguageModel>,
    settings: Arc<dyn SettingsProvider>,
}

impl Classifier {
    pub fn new(model: Arc<dyn LanguageModel>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { model, settings }
    }

    /// Choose a destination folder, or `NoDestination` when none fits.
    /// A returned destination exists as a directory at the time of the call.
    pub async fn classify(
        &self,
        file_name: &str,
        summary: &str,
    ) -> Result<Classification, ModelError> {
        let folders = self.settings.folder_associations().await;
        if folders.is_empty() {
            debug!(file_name, "no destination folders configured");
            return Ok(Classification::NoDestination);
        }

        let prompt = prompt::build_classification_prompt(summary, file_name, &folders);
        let answer = self.model.call(&prompt).await?;

        let classification = Classification::parse(&answer, &folders);
        if let Classification::Destination(path) = &classification {
            let is_dir = tokio::fs::metadata(path)
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if !is_dir {
                warn!(path = %path.display(), "destination folder does not exist, ignoring");
                return Ok(Classification::NoDestination);
            }
        }

        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSettings;
    use crate::testing::ScriptedModel;
    use tempfile::TempDir;

    fn folders(paths: &[&std::path::Path]) -> BTreeMap<PathBuf, String> {
        paths
            .iter()
            .map(|p| (p.to_path_buf(), "some description".to_string()))
            .collect()
    }

    fn classifier(answer: &str, folders: BTreeMap<PathBuf, String>) -> (Classifier, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(vec![Ok(answer.to_string())]));
        let settings = Arc::new(StaticSettings::new(Vec::new(), folders));
        (Classifier::new(model.clone(), settings), model)
    }

    #[test]
    fn test_parse_not_found_token() {
        let map = folders(&[std::path::Path::new("/docs")]);
        assert_eq!(Classification::parse("PATH_NOT_FOUND\n", &map), Classification::NoDestination);
    }

    #[test]
    fn test_parse_requires_verbatim_match() {
        let map = folders(&[std::path::Path::new("/docs/reports")]);
        assert_eq!(
            Classification::parse(" /docs/reports \n", &map),
            Classification::Destination(PathBuf::from("/docs/reports"))
        );
        assert_eq!(Classification::parse("/docs/reports/q3", &map), Classification::NoDestination);
        assert_eq!(Classification::parse("The answer is /docs/reports", &map), Classification::NoDestination);
    }

    #[tokio::test]
    async fn test_classify_existing_folder() {
        let temp_dir = TempDir::new().unwrap();
        let reports = temp_dir.path().join("reports");
        std::fs::create_dir(&reports).unwrap();

        let (classifier, model) = classifier(&format!("{}\n", reports.display()), folders(&[&reports]));
        let result = classifier.classify("report.pdf", "A Q3 report").await.unwrap();

        assert_eq!(result, Classification::Destination(reports.clone()));
        let prompts = model.prompts();
        assert!(prompts[0].contains(&format!("{}: some description", reports.display())));
        assert!(prompts[0].contains("Filename: report.pdf"));
    }

    #[tokio::test]
    async fn test_classify_missing_folder_is_no_destination() {
        let temp_dir = TempDir::new().unwrap();
        let gone = temp_dir.path().join("gone");

        let (classifier, _) = classifier(&gone.display().to_string(), folders(&[&gone]));
        let result = classifier.classify("report.pdf", "A Q3 report").await.unwrap();
        assert_eq!(result, Classification::NoDestination);
    }

    #[tokio::test]
    async fn test_classify_unknown_answer_is_no_destination() {
        let temp_dir = TempDir::new().unwrap();
        let (classifier, _) = classifier("/etc", folders(&[temp_dir.path()]));
        let result = classifier.classify("report.pdf", "A Q3 report").await.unwrap();
        assert_eq!(result, Classification::NoDestination);
    }

    #[tokio::test]
    async fn test_classify_without_folders_skips_model() {
        let (classifier, model) = classifier("/anything", BTreeMap::new());
        let result = classifier.classify("report.pdf", "A Q3 report").await.unwrap();
        assert_eq!(result, Classification::NoDestination);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_classify_model_failure_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![Err(ModelError::MalformedResponse(
            "{}".to_string(),
        ))]));
        let settings = Arc::new(StaticSettings::new(Vec::new(), folders(&[temp_dir.path()])));
        let classifier = Classifier::new(model, settings);

        let result = classifier.classify("report.pdf", "A Q3 report").await;
        assert!(matches!(result, Err(ModelError::MalformedResponse(_))));
    }
}
