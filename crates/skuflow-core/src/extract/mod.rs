//! Record extraction strategies and the router that picks one per document.

pub mod grid;
pub mod router;
pub mod tabular;
pub mod text;
pub mod vision;

pub use crate::models::record::DocumentKind;
pub use router::{Document, ExtractionRouter};
pub use tabular::TabularExtractor;
pub use text::TextPatternExtractor;
pub use vision::{VisionExtractor, VisionModel};
