//! Transforms applied to source documents before comparison
//!
//! Transforms run in registration order. A transform may rewrite a document
//! or drop it from the source entirely.

use cfgsync_core::ConfigDocument;
use tracing::debug;

/// A handler rewriting source documents before they are compared
pub trait DocumentTransform: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Rewrite a document; `None` removes it from the source
    fn transform(&self, doc: ConfigDocument) -> Option<ConfigDocument>;
}

/// Ordered list of transforms
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn DocumentTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform to the end of the pipeline
    pub fn register(&mut self, transform: Box<dyn DocumentTransform>) {
        debug!("Registered document transform: {}", transform.name());
        self.transforms.push(transform);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, transform: Box<dyn DocumentTransform>) -> Self {
        self.register(transform);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run every transform over the document
    pub fn apply(&self, doc: ConfigDocument) -> Option<ConfigDocument> {
        self.transforms
            .iter()
            .try_fold(doc, |doc, transform| transform.transform(doc))
    }
}

/// Removes top-level keys from every document
pub struct StripKeys {
    keys: Vec<String>,
}

impl StripKeys {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl DocumentTransform for StripKeys {
    fn name(&self) -> &str {
        "strip-keys"
    }

    fn transform(&self, mut doc: ConfigDocument) -> Option<ConfigDocument> {
        for key in &self.keys {
            doc.remove(key);
        }
        Some(doc)
    }
}
