//! Synchronous text and JSON providers

use std::sync::Arc;

use serde_json::Value;

use crate::handle::ResourceType;
use crate::location::ResourceLocation;
use crate::manager::ResourceManager;
use crate::provider::{ProvideRequest, ResourceProvider};
use crate::source::ContentSource;

/// Default id of [`TextDataProvider`]
pub const TEXT_DATA_PROVIDER_ID: &str = "TextDataProvider";

/// Default id of [`JsonDataProvider`]
pub const JSON_DATA_PROVIDER_ID: &str = "JsonDataProvider";

/// Reads a location's internal id from a [`ContentSource`] as `String`
pub struct TextDataProvider {
    id: String,
    source: Arc<dyn ContentSource>,
    ignore_failures: bool,
}

impl TextDataProvider {
    /// Provider with the default id
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self::with_id(TEXT_DATA_PROVIDER_ID, source)
    }

    /// Provider with a custom id
    pub fn with_id(id: impl Into<String>, source: Arc<dyn ContentSource>) -> Self {
        Self {
            id: id.into(),
            source,
            ignore_failures: false,
        }
    }

    /// Succeed without a value instead of failing when a read fails.
    /// Used for optional content such as remote hashes.
    pub fn ignore_failures(mut self, ignore: bool) -> Self {
        self.ignore_failures = ignore;
        self
    }

    /// Check if read failures are ignored
    pub fn ignores_failures(&self) -> bool {
        self.ignore_failures
    }
}

impl ResourceProvider for TextDataProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn can_provide(&self, resource_type: ResourceType, location: &ResourceLocation) -> bool {
        location.provider_id() == self.id && resource_type.accepts::<String>()
    }

    fn provide(&self, rm: &mut ResourceManager, request: ProvideRequest) {
        let id = request.location().internal_id();
        let completed = match self.source.read_string(id) {
            Ok(text) => {
                let len = text.len() as u64;
                request.set_download_status(rm, len, len);
                request.complete(rm, text)
            }
            Err(err) if self.ignore_failures => {
                log::debug!("ignoring failed read of `{id}`: {err}");
                request.complete_empty(rm)
            }
            Err(err) => request.fail(rm, err.to_string()),
        };
        if let Err(err) = completed {
            log::warn!("text provider could not complete `{id}`: {err}");
        }
    }
}

/// Reads and parses JSON into a [`serde_json::Value`]
pub struct JsonDataProvider {
    id: String,
    source: Arc<dyn ContentSource>,
}

impl JsonDataProvider {
    /// Provider with the default id
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self::with_id(JSON_DATA_PROVIDER_ID, source)
    }

    /// Provider with a custom id
    pub fn with_id(id: impl Into<String>, source: Arc<dyn ContentSource>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

impl ResourceProvider for JsonDataProvider {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn can_provide(&self, resource_type: ResourceType, location: &ResourceLocation) -> bool {
        location.provider_id() == self.id && resource_type.accepts::<Value>()
    }

    fn provide(&self, rm: &mut ResourceManager, request: ProvideRequest) {
        let id = request.location().internal_id();
        let parsed = self
            .source
            .read(id)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(|e| e.to_string()));
        let completed = match parsed {
            Ok(value) => request.complete(rm, value),
            Err(message) => request.fail(rm, message),
        };
        if let Err(err) = completed {
            log::warn!("json provider could not complete `{id}`: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::OperationStatus;
    use crate::source::MemorySource;

    fn manager(source: MemorySource) -> ResourceManager {
        let source: Arc<dyn ContentSource> = Arc::new(source);
        let mut rm = ResourceManager::default();
        rm.add_provider(TextDataProvider::new(source.clone()));
        rm.add_provider(TextDataProvider::with_id("OptionalText", source.clone()).ignore_failures(true));
        rm.add_provider(JsonDataProvider::new(source));
        rm
    }

    #[test]
    fn test_text_provider() {
        let mut rm = manager(MemorySource::new().with_entry("greeting.txt", "hello"));
        let loc = ResourceLocation::new("greeting", "greeting.txt", TEXT_DATA_PROVIDER_ID).shared();

        let handle = rm.provide::<String>(&loc);
        assert_eq!(rm.status(handle).unwrap(), OperationStatus::Succeeded);
        assert_eq!(rm.result(handle).unwrap().unwrap().as_str(), "hello");
        assert_eq!(rm.download_status(handle).total_bytes, 5);
    }

    #[test]
    fn test_missing_text_fails_unless_ignored() {
        let mut rm = manager(MemorySource::new());
        let strict = ResourceLocation::new("a", "missing.txt", TEXT_DATA_PROVIDER_ID).shared();
        let optional = ResourceLocation::new("b", "missing.txt", "OptionalText").shared();

        let strict = rm.provide::<String>(&strict);
        let optional = rm.provide::<String>(&optional);

        assert_eq!(rm.status(strict).unwrap(), OperationStatus::Failed);
        assert_eq!(rm.status(optional).unwrap(), OperationStatus::Succeeded);
        assert!(rm.result(optional).unwrap().is_none());
    }

    #[test]
    fn test_json_provider() {
        let mut rm = manager(
            MemorySource::new()
                .with_entry("config.json", r#"{ "level": 3 }"#)
                .with_entry("broken.json", "{"),
        );
        let good = ResourceLocation::new("good", "config.json", JSON_DATA_PROVIDER_ID).shared();
        let bad = ResourceLocation::new("bad", "broken.json", JSON_DATA_PROVIDER_ID).shared();

        let good = rm.provide::<Value>(&good);
        let bad = rm.provide::<Value>(&bad);

        assert_eq!(rm.result(good).unwrap().unwrap()["level"], 3);
        assert_eq!(rm.status(bad).unwrap(), OperationStatus::Failed);
    }
}
