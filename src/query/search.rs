use std::sync::Arc;

use tracing::{error, info};

use crate::database::repo::AnalysisStore;

pub const STORE_DOWN_MESSAGE: &str = "Database connection error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found,
    NotFound,
    StoreUnavailable,
}

impl SearchOutcome {
    /// User-facing sentence for this outcome, echoing the searched term.
    pub fn message(&self, keyword: &str) -> String {
        match self {
            SearchOutcome::Found => format!("{} is found in the video.", capitalize(keyword)),
            SearchOutcome::NotFound => format!("{} is not found in the video.", capitalize(keyword)),
            SearchOutcome::StoreUnavailable => STORE_DOWN_MESSAGE.to_string(),
        }
    }
}

/// First character upper-cased, the rest lower-cased ("dOG" -> "Dog").
pub fn capitalize(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct SearchService {
    store: Arc<AnalysisStore>,
}

impl SearchService {
    pub fn new(store: Arc<AnalysisStore>) -> Self {
        Self { store }
    }

    pub fn search(&self, video_id: &str, keyword: &str) -> SearchOutcome {
        match self.store.count_matching(video_id, keyword) {
            Ok(0) => {
                info!("'{}' not found in video {}", keyword, video_id);
                SearchOutcome::NotFound
            }
            Ok(n) => {
                info!("'{}' found in {} frames of video {}", keyword, n, video_id);
                SearchOutcome::Found
            }
            Err(e) => {
                error!("Search for '{}' failed: {}", keyword, e);
                SearchOutcome::StoreUnavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::PoolConfig;
    use crate::database::repo::CaseSensitivity;
    use std::time::Duration;

    fn service(case: CaseSensitivity, descriptions: &[&str]) -> (tempfile::TempDir, SearchService) {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::open(PoolConfig::new(dir.path().join("f.db")), case);
        for (i, d) in descriptions.iter().enumerate() {
            store.append("v1", Duration::from_secs(i as u64), d).unwrap();
        }
        (dir, SearchService::new(Arc::new(store)))
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("dog"), "Dog");
        assert_eq!(capitalize("Dog"), "Dog");
        assert_eq!(capitalize("hOT DOG"), "Hot dog");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("éclair"), "Éclair");
    }

    #[test]
    fn test_search_presence_insensitive() {
        let (_dir, search) = service(CaseSensitivity::Insensitive, &["A Cat on a sofa", "empty room"]);
        assert_eq!(search.search("v1", "cat"), SearchOutcome::Found);
        assert_eq!(search.search("v1", "CAT"), SearchOutcome::Found);
        assert_eq!(search.search("v1", "dog"), SearchOutcome::NotFound);
    }

    #[test]
    fn test_search_presence_sensitive() {
        let (_dir, search) = service(CaseSensitivity::Sensitive, &["A Cat on a sofa", "empty room"]);
        assert_eq!(search.search("v1", "cat"), SearchOutcome::NotFound);
        assert_eq!(search.search("v1", "Cat"), SearchOutcome::Found);
    }

    #[test]
    fn test_store_unavailable_is_an_outcome() {
        let store = AnalysisStore::open(PoolConfig::new("/no/such/dir/f.db"), CaseSensitivity::Insensitive);
        let search = SearchService::new(Arc::new(store));

        let outcome = search.search("v1", "cat");
        assert_eq!(outcome, SearchOutcome::StoreUnavailable);
        assert_eq!(outcome.message("cat"), STORE_DOWN_MESSAGE);
    }

    #[test]
    fn test_messages_echo_capitalized_term() {
        assert_eq!(SearchOutcome::Found.message("cat"), "Cat is found in the video.");
        assert_eq!(SearchOutcome::NotFound.message("Dog"), "Dog is not found in the video.");
    }
}
