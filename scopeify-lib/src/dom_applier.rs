use crate::dom::dom_tree::{Document, Node};
use crate::error::{ApplyError, ElementFailure};
use crate::parser::dom_indices::ElementIndex;
use crate::style::scope_map::ScopeMap;
use crate::style::selector_rewriter::{ClassPolicy, ElementView, SelectorRewriter};
use log::{debug, warn};

/// Rewrites every element of `document` according to `map`.
///
/// Elements are visited once each, in document order. An element that cannot be
/// rewritten does not stop the walk; all such elements are reported together once
/// the walk is over, and everything rewritten before or after them stays rewritten.
pub fn apply(document: &Document, map: &ScopeMap, policy: ClassPolicy) -> Result<(), ApplyError> {
    let rewriter = SelectorRewriter::new(map, policy)?;
    let index = ElementIndex::build(document);

    let mut rewritten = 0;
    let mut failures = Vec::new();
    for (position, handle) in index.elements().iter().enumerate() {
        let mut node = match handle.try_borrow_mut() {
            Ok(node) => node,
            Err(err) => {
                warn!("element #{position} skipped: {err}");
                failures.push(ElementFailure {
                    index: position,
                    reason: format!("node is in use: {err}"),
                });
                continue;
            }
        };
        let Node::Element(element) = &mut *node else {
            continue;
        };

        let rewrite = rewriter.compute(&ElementView::of(element));
        if rewrite.is_empty() {
            continue;
        }
        rewrite.commit(element);
        rewritten += 1;
    }

    debug!(
        "visited {} elements, rewrote {rewritten}, {} failed",
        index.len(),
        failures.len()
    );
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ApplyError::Elements {
            failures,
            rewritten,
        })
    }
}
