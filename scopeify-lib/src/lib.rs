//! Scopes the `<style>` of an HTML document to that document.
//!
//! The style elements are pulled out, a scoping engine renames every selector in
//! them, and the document's classes, ids and inline styles are rewritten to match.

pub mod dom;
pub mod dom_applier;
pub mod error;
pub mod scope_runner;

pub mod parser {
    pub mod dom_indices;
    pub mod scope_html;
    pub mod serialize;
}

pub mod style {
    pub mod css_rewrite;
    pub mod extract;
    pub mod scope_engine;
    pub mod scope_map;
    pub mod selector_rewriter;
}

pub use dom::dom_tree::{Document, Handle};
pub use error::{ApplyError, RunError, RunPhase, ScopeError};
pub use parser::scope_html::create_dom_tree;
pub use parser::serialize::to_html;
pub use scope_runner::{RunnerOptions, ScopeRunner, ScopingFailurePolicy};
pub use style::extract::{extract_css, insert_css};
pub use style::scope_engine::{
    DeferredScopingEngine, FixedScopeMap, ScopeifyConfig, Scopeify, ScopingEngine,
};
pub use style::scope_map::{ScopeMap, ScopedStyles, SelectorMap};
pub use style::selector_rewriter::ClassPolicy;
