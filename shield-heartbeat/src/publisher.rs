//! Artifact publication
//!
//! Each named artifact is rendered as JSON and CSV and both files are handed
//! to the object store. The two uploads run concurrently and one failing
//! never stops the other from being attempted.

use crate::serializer::Format;
use crate::storage::ObjectStore;
use crate::tree::CountTree;
use shield_common::config::artifact_key;
use shield_common::{Error, PublishFailureDetail, Result};
use std::sync::Arc;
use tracing::{error, info};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Publishes artifacts through one explicit store client
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    csv_content_type: String,
}

/// Outcome of publishing a set of artifacts
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// `name.ext` of every file written
    pub published: Vec<String>,
    pub failures: Vec<PublishFailureDetail>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// `Error::Publish` listing every failed file, if any
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.failures.is_empty() {
            Ok(self.published)
        } else {
            Err(Error::Publish(self.failures))
        }
    }
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        csv_content_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            csv_content_type: csv_content_type.into(),
        }
    }

    /// Object key for one format of a named artifact
    pub fn object_key(&self, name: &str, format: Format) -> String {
        artifact_key(&self.prefix, &format!("{}.{}", name, format.extension()))
    }

    pub fn content_type(&self, format: Format) -> &str {
        match format {
            Format::Json => JSON_CONTENT_TYPE,
            Format::Csv => self.csv_content_type.as_str(),
        }
    }

    /// Publish one artifact in both formats
    ///
    /// Returns the first failure after both uploads were attempted.
    pub async fn publish(&self, name: &str, tree: &CountTree) -> Result<()> {
        let failures = self.publish_formats(name, tree).await;
        match failures.into_iter().next() {
            Some(detail) => Err(detail.into()),
            None => Ok(()),
        }
    }

    /// Publish every artifact, collecting all failures
    pub async fn publish_all(&self, artifacts: &[(String, CountTree)]) -> PublishReport {
        let mut report = PublishReport::default();

        for (name, tree) in artifacts {
            let failures = self.publish_formats(name, tree).await;
            for format in Format::ALL {
                if !failures.iter().any(|f| f.format == format.extension()) {
                    report.published.push(format!("{}.{}", name, format.extension()));
                }
            }
            report.failures.extend(failures);
        }

        if report.is_success() {
            info!(files = report.published.len(), "Published all artifacts");
        } else {
            error!(
                published = report.published.len(),
                failed = report.failures.len(),
                "Artifact publication incomplete"
            );
        }
        report
    }

    async fn publish_formats(&self, name: &str, tree: &CountTree) -> Vec<PublishFailureDetail> {
        let (json, csv) = futures::join!(
            self.upload(name, tree, Format::Json),
            self.upload(name, tree, Format::Csv)
        );
        [json, csv].into_iter().filter_map(|outcome| outcome.err()).collect()
    }

    async fn upload(
        &self,
        name: &str,
        tree: &CountTree,
        format: Format,
    ) -> std::result::Result<(), PublishFailureDetail> {
        let fail = |reason: String| {
            error!(artifact = %name, format = %format, %reason, "Artifact upload failed");
            PublishFailureDetail {
                artifact: name.to_string(),
                format: format.extension().to_string(),
                reason,
            }
        };

        let body = format.render(tree).map_err(|e| fail(e.to_string()))?;
        let key = self.object_key(name, format);
        let bytes = body.len();

        self.store
            .put(&key, body, self.content_type(format))
            .await
            .map_err(|e| fail(e.to_string()))?;

        info!(key = %key, bytes, store = %self.store.describe(), "Published artifact");
        Ok(())
    }
}
