//! Per-event logging context.
//!
//! The pipeline builds one [`EventContext`] per delivery and enters the span
//! it produces; every stage below logs inside that span. Enrichment returns a
//! new value, so two events processed at the same time never share context.

use tracing::Span;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventContext {
    pub event_type: String,
    pub delivery_id: String,
    pub org: Option<String>,
    pub repo: Option<String>,
    pub number: Option<u64>,
    pub author: Option<String>,
    pub url: Option<String>,
}

impl EventContext {
    pub fn new(event_type: impl Into<String>, delivery_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            delivery_id: delivery_id.into(),
            ..Self::default()
        }
    }

    pub fn with_pull_request(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        author: &str,
        url: &str,
    ) -> Self {
        Self {
            org: Some(org.to_string()),
            repo: Some(repo.to_string()),
            number: Some(number),
            author: Some(author.to_string()),
            url: Some(url.to_string()),
            ..self.clone()
        }
    }

    pub fn span(&self) -> Span {
        tracing::info_span!(
            "event",
            event_type = %self.event_type,
            delivery_id = %self.delivery_id,
            org = self.org.as_deref(),
            repo = self.repo.as_deref(),
            pr = self.number,
            author = self.author.as_deref(),
            url = self.url.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_pull_request_leaves_original_untouched() {
        let base = EventContext::new("pull_request", "guid-1");
        let enriched = base.with_pull_request("org", "repo", 7, "alice", "https://x/7");
        assert_eq!(base.org, None);
        assert_eq!(enriched.org.as_deref(), Some("org"));
        assert_eq!(enriched.number, Some(7));
        assert_eq!(enriched.delivery_id, "guid-1");
    }
}
