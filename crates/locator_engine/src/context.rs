use locator_core::PageAnchor;

use crate::fetch::{RequestProfile, ReqwestFetcher};
use crate::FetchError;

/// Supplies the raw content of the current context, fetched only when a stage needs it.
#[async_trait::async_trait]
pub trait PageContentProvider: Send + Sync {
    async fn page_content(&self) -> Result<String, FetchError>;
}

/// Leaves the current context. Nothing held in memory survives the call.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, navigable_ref: &str);
}

/// Marks the located entry on the current page.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, anchor: &PageAnchor, label: &str);
}

/// The context a resume runs in: where it is and how to read it.
pub struct PageContext<'a> {
    pub navigable_ref: &'a str,
    pub content: &'a dyn PageContentProvider,
}

impl<'a> PageContext<'a> {
    pub fn new(navigable_ref: &'a str, content: &'a dyn PageContentProvider) -> Self {
        Self {
            navigable_ref,
            content,
        }
    }
}

/// Content already in hand.
#[derive(Debug, Clone, Default)]
pub struct StaticPage(pub String);

#[async_trait::async_trait]
impl PageContentProvider for StaticPage {
    async fn page_content(&self) -> Result<String, FetchError> {
        Ok(self.0.clone())
    }
}

/// Content loaded over HTTP the way a navigation would load it.
pub struct HttpPage<'a> {
    fetcher: &'a ReqwestFetcher,
    url: String,
}

impl<'a> HttpPage<'a> {
    pub fn new(fetcher: &'a ReqwestFetcher, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl PageContentProvider for HttpPage<'_> {
    async fn page_content(&self) -> Result<String, FetchError> {
        self.fetcher.fetch_text(&self.url, RequestProfile::Page).await
    }
}
