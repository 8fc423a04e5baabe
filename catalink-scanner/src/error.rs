use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    /// Transport-level failure reaching a catalog's metadata API.
    #[error("Catalog unreachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Catalog has no metadata API at {0}")]
    NotFound(String),

    #[error("Catalog returned HTTP {status} from {url}")]
    ServerError { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// Transport failure while fetching a catalog's full dump. Aborts the pass.
    #[error("Bulk fetch from {url} failed: {source}")]
    BulkFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Graph store rejected triple with HTTP {status}: {body}")]
    Ingestion { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CrawlError {
    /// Whether this error must abort the whole pass rather than one branch.
    pub fn is_pass_fatal(&self) -> bool {
        matches!(self, CrawlError::BulkFetch { .. })
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
