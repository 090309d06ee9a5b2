//! Paginated repository catalog.
//!
//! ACR returns the catalog in pages. Each response may carry a
//! `Link: <...>; rel="next"` header naming the next page; the link target is
//! kept as an opaque [`PageCursor`]. [`RepositoryPager`] walks the pages and
//! fails instead of returning a partial listing.

use std::collections::HashSet;
use std::fmt;

use acrops_core::RegistryEndpoint;
use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::RegistryError;

/// Opaque continuation token for the next catalog page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    /// Wraps a raw cursor value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw cursor value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of repository names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryPage {
    /// Repository names on this page, in registry order.
    pub names: Vec<String>,
    /// Cursor for the following page, absent on the last page.
    pub next: Option<PageCursor>,
}

impl RepositoryPage {
    /// Creates a final page.
    #[must_use]
    pub fn last<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            next: None,
        }
    }

    /// Sets the cursor for the following page.
    #[must_use]
    pub fn with_next(mut self, cursor: impl Into<String>) -> Self {
        self.next = Some(PageCursor::new(cursor));
        self
    }
}

/// Extracts the `rel="next"` target from a `Link` header value.
///
/// # Examples
///
/// ```
/// use acrops_registry::parse_next_link;
///
/// let cursor = parse_next_link(r#"</acr/v1/_catalog?last=app-b&n=2>; rel="next""#).unwrap();
/// assert_eq!(cursor.as_str(), "/acr/v1/_catalog?last=app-b&n=2");
/// assert!(parse_next_link(r#"</other>; rel="prev""#).is_none());
/// ```
#[must_use]
pub fn parse_next_link(header: &str) -> Option<PageCursor> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            param
                .trim()
                .split_once('=')
                .is_some_and(|(key, value)| {
                    key.trim().eq_ignore_ascii_case("rel")
                        && value
                            .trim()
                            .trim_matches('"')
                            .split_whitespace()
                            .any(|rel| rel.eq_ignore_ascii_case("next"))
                })
        });
        (is_next && !target.is_empty()).then(|| PageCursor::new(target))
    })
}

/// Fetches single catalog pages.
#[async_trait]
pub trait RepositoryLister: Send + Sync {
    /// Fetches the page at `cursor`, or the first page when `cursor` is `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the page cannot be fetched.
    async fn list_page(
        &self,
        endpoint: &RegistryEndpoint,
        credential: &Credential,
        cursor: Option<&PageCursor>,
    ) -> Result<RepositoryPage, RegistryError>;
}

/// Drives a [`RepositoryLister`] across every page of a catalog.
pub struct RepositoryPager<'a> {
    lister: &'a dyn RepositoryLister,
    endpoint: &'a RegistryEndpoint,
    credential: &'a Credential,
    max_pages: u32,
    pages: u32,
    cursor: Option<PageCursor>,
    seen: HashSet<PageCursor>,
    done: bool,
}

impl<'a> RepositoryPager<'a> {
    /// Creates a pager that gives up after `max_pages` pages.
    #[must_use]
    pub fn new(
        lister: &'a dyn RepositoryLister,
        endpoint: &'a RegistryEndpoint,
        credential: &'a Credential,
        max_pages: u32,
    ) -> Self {
        Self {
            lister,
            endpoint,
            credential,
            max_pages,
            pages: 0,
            cursor: None,
            seen: HashSet::new(),
            done: false,
        }
    }

    /// Returns true while pages remain to be fetched.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        !self.done
    }

    /// Number of pages fetched so far.
    #[must_use]
    pub const fn pages(&self) -> u32 {
        self.pages
    }

    /// Fetches the next page, or returns `None` after the last one.
    ///
    /// # Errors
    ///
    /// Returns the lister's error, or [`RegistryError::Truncated`] when the
    /// page limit is hit or a cursor repeats.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, RegistryError> {
        if self.done {
            return Ok(None);
        }
        if self.pages >= self.max_pages {
            return Err(RegistryError::Truncated {
                pages: self.pages,
                reason: format!("more than {} pages", self.max_pages),
            });
        }

        let page = self
            .lister
            .list_page(self.endpoint, self.credential, self.cursor.as_ref())
            .await?;
        self.pages += 1;

        match page.next {
            None => self.done = true,
            Some(next) => {
                if !self.seen.insert(next.clone()) {
                    return Err(RegistryError::Truncated {
                        pages: self.pages,
                        reason: format!("cursor {next} did not advance"),
                    });
                }
                self.cursor = Some(next);
            }
        }

        Ok(Some(page.names))
    }

    /// Fetches every remaining page and concatenates the names.
    ///
    /// # Errors
    ///
    /// Fails on the first page that fails; no partial listing is returned.
    pub async fn collect_all(mut self) -> Result<Vec<String>, RegistryError> {
        let mut names = Vec::new();
        while let Some(page) = self.next_page().await? {
            names.extend(page);
        }
        tracing::debug!(
            endpoint = %self.endpoint,
            pages = self.pages,
            repositories = names.len(),
            "Enumerated registry catalog"
        );
        Ok(names)
    }
}

impl fmt::Debug for RepositoryPager<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryPager")
            .field("endpoint", &self.endpoint.as_str())
            .field("max_pages", &self.max_pages)
            .field("pages", &self.pages)
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serves pages keyed by cursor; `None` is the first page.
    struct FakeLister {
        pages: Vec<(Option<&'static str>, Result<RepositoryPage, u16>)>,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl FakeLister {
        fn new(pages: Vec<(Option<&'static str>, Result<RepositoryPage, u16>)>) -> Self {
            Self {
                pages,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RepositoryLister for FakeLister {
        async fn list_page(
            &self,
            _endpoint: &RegistryEndpoint,
            _credential: &Credential,
            cursor: Option<&PageCursor>,
        ) -> Result<RepositoryPage, RegistryError> {
            let key = cursor.map(|c| c.as_str().to_string());
            self.calls.lock().unwrap().push(key.clone());
            let (_, page) = self
                .pages
                .iter()
                .find(|(c, _)| c.map(str::to_string) == key)
                .expect("unexpected cursor");
            page.clone().map_err(|status| RegistryError::HttpError {
                status,
                message: "boom".to_string(),
            })
        }
    }

    fn endpoint() -> RegistryEndpoint {
        RegistryEndpoint::parse("https://myregistry.azurecr.io").unwrap()
    }

    #[test]
    fn test_parse_next_link() {
        let cursor =
            parse_next_link(r#"</acr/v1/_catalog?last=app-b&n=2&orderby=>; rel="next""#).unwrap();
        assert_eq!(cursor.as_str(), "/acr/v1/_catalog?last=app-b&n=2&orderby=");
    }

    #[test]
    fn test_parse_next_link_variants() {
        assert_eq!(
            parse_next_link("</a>; rel=next").map(|c| c.0),
            Some("/a".to_string())
        );
        assert_eq!(
            parse_next_link(r#"</prev>; rel="prev", </next>; rel="next""#).map(|c| c.0),
            Some("/next".to_string())
        );
        assert_eq!(
            parse_next_link(r#"</both>; rel="prev next""#).map(|c| c.0),
            Some("/both".to_string())
        );
        assert!(parse_next_link("").is_none());
        assert!(parse_next_link("/no-brackets; rel=next").is_none());
        assert!(parse_next_link(r#"<>; rel="next""#).is_none());
    }

    #[tokio::test]
    async fn test_collect_concatenates_pages() {
        let lister = FakeLister::new(vec![
            (None, Ok(RepositoryPage::last(["app-a", "app-b"]).with_next("c1"))),
            (Some("c1"), Ok(RepositoryPage::last(["app-c"]))),
        ]);
        let endpoint = endpoint();
        let credential = Credential::Anonymous;

        let names = RepositoryPager::new(&lister, &endpoint, &credential, 10)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(names, vec!["app-a", "app-b", "app-c"]);
        assert_eq!(lister.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let lister = FakeLister::new(vec![(None, Ok(RepositoryPage::default()))]);
        let endpoint = endpoint();
        let credential = Credential::Anonymous;

        let mut pager = RepositoryPager::new(&lister, &endpoint, &credential, 10);
        assert!(pager.has_more());
        assert_eq!(pager.next_page().await.unwrap(), Some(Vec::new()));
        assert!(!pager.has_more());
        assert_eq!(pager.next_page().await.unwrap(), None);
        assert_eq!(lister.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_page_aborts_listing() {
        let lister = FakeLister::new(vec![
            (None, Ok(RepositoryPage::last(["app-a"]).with_next("c1"))),
            (Some("c1"), Err(503)),
        ]);
        let endpoint = endpoint();
        let credential = Credential::Anonymous;

        let err = RepositoryPager::new(&lister, &endpoint, &credential, 10)
            .collect_all()
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_truncation() {
        let lister = FakeLister::new(vec![
            (None, Ok(RepositoryPage::last(["app-a"]).with_next("c1"))),
            (Some("c1"), Ok(RepositoryPage::last(["app-b"]).with_next("c1"))),
        ]);
        let endpoint = endpoint();
        let credential = Credential::Anonymous;

        let err = RepositoryPager::new(&lister, &endpoint, &credential, 10)
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Truncated { pages: 2, .. }));
    }

    #[tokio::test]
    async fn test_page_limit_is_truncation() {
        let lister = FakeLister::new(vec![
            (None, Ok(RepositoryPage::last(["app-a"]).with_next("c1"))),
            (Some("c1"), Ok(RepositoryPage::last(["app-b"]).with_next("c2"))),
            (Some("c2"), Ok(RepositoryPage::last(["app-c"]))),
        ]);
        let endpoint = endpoint();
        let credential = Credential::Anonymous;

        let err = RepositoryPager::new(&lister, &endpoint, &credential, 2)
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Truncated { pages: 2, .. }));
        assert_eq!(lister.calls(), 2);
    }
}
