pub mod document;
pub mod journal;
pub mod link;
pub mod snippet;
pub mod specimen;
pub mod taxon;

pub use document::Document;
pub use journal::Journal;
pub use link::Link;
pub use snippet::Snippet;
pub use specimen::Specimen;
pub use taxon::Taxon;
