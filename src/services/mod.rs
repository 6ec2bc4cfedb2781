//! External collaborator services
//!
//! The product catalog and the PubMed literature search consumed by the
//! agent's tools and exposed through the REST API.

pub mod catalog;
pub mod pubmed;

pub use catalog::{Product, ProductCatalog, ProductView};
pub use pubmed::{Article, ArticleSearchResult, PubmedClient};
