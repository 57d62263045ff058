// src/iiif/mod.rs
// =============================================================================
// This module contains all the IIIF-specific logic.
//
// Submodules:
// - document: version detection + child classification + pagination for one
//             fetched collection document
// - traverse: the worklist walk over a whole collection tree
// - images:   IIIF Image API URL construction from a manifest's canvases
//
// This file (mod.rs) is the module root - it re-exports the public API that
// the rest of the application uses.
// =============================================================================

mod document;
mod images;
mod traverse;

pub use document::{CollectionDocument, IiifVersion, ItemKind, ItemRef};
pub use images::{manifest_image_urls, ImageRequest};
pub use traverse::{collect, FetchFailure, TraversalOutcome, TraverseOptions};
