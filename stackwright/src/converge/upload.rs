//! Upload of templates too large to submit inline.

use base64::Engine;
use md5::{Digest, Md5};
use std::sync::Arc;

use super::options::UploadLocation;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::document::StackDocument;
use crate::errors::{Result, StackwrightError};
use crate::provider::{ObjectStore, TemplateSource};

/// Base64 MD5 digest of `body`, as sent in a `Content-MD5` header.
#[must_use]
pub fn content_md5(body: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Md5::digest(body))
}

/// Puts template bodies into an [`ObjectStore`].
pub struct TemplateUploader {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn DiagnosticSink>,
}

impl TemplateUploader {
    /// Creates an uploader.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { store, sink }
    }

    /// Uploads `document` for `stack` and returns the URL to pass on.
    pub async fn upload(
        &self,
        stack: &str,
        document: &StackDocument,
        location: &UploadLocation,
    ) -> Result<TemplateSource> {
        let key = location.key_for(stack, &document.fingerprint());
        let body = document.body().as_bytes().to_vec();
        let digest = content_md5(&body);

        self.sink.emit(
            DiagnosticEvent::info(
                "template.upload",
                format!("Uploading template ({} bytes) to s3://{}/{key}", body.len(), location.bucket),
            )
            .with_stack(stack),
        );
        let url = self
            .store
            .put_object(&location.bucket, &key, body, &digest)
            .await
            .map_err(|e| StackwrightError::from_provider(stack, e))?;
        Ok(TemplateSource::Url(url))
    }
}

impl std::fmt::Debug for TemplateUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateUploader").finish_non_exhaustive()
    }
}
