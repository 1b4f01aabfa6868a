use std::sync::{Arc, Mutex};

use chrono::Utc;
use engine_logging::engine_warn;
use locator_core::{PageAnchor, Timestamp};
use locator_engine::{
    DurableStore, FetchError, Highlighter, HttpPage, Navigator, PageContentProvider,
    ReqwestFetcher, StoreError,
};
use serde::{Deserialize, Serialize};

pub const LOCATION_KEY: &str = "location_v1";

/// Where the last navigation went, kept so a later process can resume there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub navigable_ref: String,
    pub recorded_at: Timestamp,
}

pub fn load_location(store: &dyn DurableStore) -> Result<Option<Location>, StoreError> {
    let Some(text) = store.get(LOCATION_KEY)? else {
        return Ok(None);
    };
    ron::from_str(&text)
        .map(Some)
        .map_err(|err| StoreError::Decode {
            key: LOCATION_KEY.to_string(),
            message: err.to_string(),
        })
}

fn save_location(store: &dyn DurableStore, location: &Location) -> Result<(), StoreError> {
    let text = ron::ser::to_string(location).map_err(|err| StoreError::Encode {
        key: LOCATION_KEY.to_string(),
        message: err.to_string(),
    })?;
    store.set(LOCATION_KEY, &text)
}

/// Records navigations instead of performing them; the app loop opens each
/// one as a fresh context.
pub struct PendingNavigator {
    store: Arc<dyn DurableStore>,
    pending: Mutex<Option<String>>,
}

impl PendingNavigator {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(None),
        }
    }

    pub fn take_pending(&self) -> Option<String> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }
}

impl Navigator for PendingNavigator {
    fn navigate_to(&self, navigable_ref: &str) {
        let location = Location {
            navigable_ref: navigable_ref.to_string(),
            recorded_at: Utc::now().timestamp_millis(),
        };
        if let Err(err) = save_location(self.store.as_ref(), &location) {
            engine_warn!("failed to remember location {}: {}", navigable_ref, err);
        }
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(navigable_ref.to_string());
        }
    }
}

/// Remembers the located entry so the app can print it once the context settles.
#[derive(Default)]
pub struct ConsoleHighlighter {
    marked: Mutex<Option<(PageAnchor, String)>>,
}

impl ConsoleHighlighter {
    pub fn take_marked(&self) -> Option<(PageAnchor, String)> {
        self.marked.lock().ok().and_then(|mut marked| marked.take())
    }
}

impl Highlighter for ConsoleHighlighter {
    fn highlight(&self, anchor: &PageAnchor, label: &str) {
        if let Ok(mut marked) = self.marked.lock() {
            *marked = Some((anchor.clone(), label.to_string()));
        }
    }
}

/// An HTTP page that keeps its body once read, for printing the highlighted row.
pub struct FetchedPage<'a> {
    page: HttpPage<'a>,
    body: Mutex<Option<String>>,
}

impl<'a> FetchedPage<'a> {
    pub fn new(fetcher: &'a ReqwestFetcher, url: &str) -> Self {
        Self {
            page: HttpPage::new(fetcher, url),
            body: Mutex::new(None),
        }
    }

    pub fn body(&self) -> Option<String> {
        self.body.lock().ok().and_then(|body| body.clone())
    }
}

#[async_trait::async_trait]
impl PageContentProvider for FetchedPage<'_> {
    async fn page_content(&self) -> Result<String, FetchError> {
        let html = self.page.page_content().await?;
        if let Ok(mut body) = self.body.lock() {
            *body = Some(html.clone());
        }
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locator_engine::FileStore;
    use tempfile::TempDir;

    #[test]
    fn navigation_is_pending_once_and_survives_in_the_store() {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn DurableStore> = Arc::new(FileStore::new(temp.path()));
        let navigator = PendingNavigator::new(store.clone());

        navigator.navigate_to("https://crm.example.com/nihul/Wizard.php?q=alice");
        assert_eq!(
            navigator.take_pending().as_deref(),
            Some("https://crm.example.com/nihul/Wizard.php?q=alice")
        );
        assert_eq!(navigator.take_pending(), None);

        let location = load_location(store.as_ref()).unwrap().unwrap();
        assert_eq!(
            location.navigable_ref,
            "https://crm.example.com/nihul/Wizard.php?q=alice"
        );
    }

    #[test]
    fn highlight_is_taken_once() {
        let highlighter = ConsoleHighlighter::default();
        highlighter.highlight(&PageAnchor(vec![0, 1]), "alice | Acme | id 7");
        let (anchor, label) = highlighter.take_marked().unwrap();
        assert_eq!(anchor, PageAnchor(vec![0, 1]));
        assert_eq!(label, "alice | Acme | id 7");
        assert!(highlighter.take_marked().is_none());
    }
}
