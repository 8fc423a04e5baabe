pub mod crawler;
pub mod domain;
pub mod error;
pub mod graph_store;
pub mod result;
pub mod sparql;

pub use crawler::{Crawler, http_client};
pub use domain::{Domain, Whitelist, domain_of, endpoint_for, last_modified_endpoint_for};
pub use error::CrawlError;
pub use graph_store::GraphStoreClient;
pub use result::{CrawlPass, DomainOutcome, DomainReport};
pub use sparql::{RdfTerm, Triple};
