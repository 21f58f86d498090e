use crate::dom::dom_tree::Document;
use crate::dom_applier;
use crate::error::{RunError, RunPhase};
use crate::style::extract::extract_css;
use crate::style::scope_engine::{DeferredScopingEngine, ScopingEngine};
use crate::style::scope_map::ScopedStyles;
use crate::style::selector_rewriter::ClassPolicy;
use log::{trace, warn};

/// What the deferred path does when the engine itself fails.
///
/// The blocking path always propagates engine failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopingFailurePolicy {
    /// Resolve to `Ok(None)`, as if the document had no style.
    #[default]
    ResolveNone,
    /// Fail with [`RunError::Scoping`].
    Propagate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerOptions {
    pub class_policy: ClassPolicy,
    pub deferred_scoping_failure: ScopingFailurePolicy,
}

/// Extracts a document's style, scopes it with an engine and rewrites the document.
///
/// `run` and `run_deferred` share every step but the engine call, so for the same
/// engine output they leave the document in the same state.
#[derive(Debug, Clone, Default)]
pub struct ScopeRunner<E> {
    engine: E,
    options: RunnerOptions,
}

impl<E> ScopeRunner<E> {
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, RunnerOptions::default())
    }

    pub fn with_options(engine: E, options: RunnerOptions) -> Self {
        ScopeRunner { engine, options }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Removes the style elements. `None` means there is nothing to scope.
    fn extract(&self, document: &Document) -> Option<String> {
        transition(RunPhase::Idle, RunPhase::ExtractingStyle);
        let css = extract_css(document);
        if css.is_empty() {
            transition(RunPhase::ExtractingStyle, RunPhase::Done);
            return None;
        }
        transition(RunPhase::ExtractingStyle, RunPhase::Scoping);
        Some(css)
    }

    fn apply(
        &self,
        document: &Document,
        scoped: ScopedStyles,
    ) -> Result<Option<ScopedStyles>, RunError> {
        transition(RunPhase::Scoping, RunPhase::ApplyingToDom);
        if let Err(err) = dom_applier::apply(document, &scoped.map, self.options.class_policy) {
            transition(RunPhase::ApplyingToDom, RunPhase::Failed);
            return Err(err.into());
        }
        transition(RunPhase::ApplyingToDom, RunPhase::Done);
        Ok(Some(scoped))
    }
}

impl<E: ScopingEngine> ScopeRunner<E> {
    /// Scopes `document` in place, returning the scoped styles, or `None` when the
    /// document has no style.
    ///
    /// Engine and rewrite failures are both returned to the caller.
    pub fn run(&self, document: &Document) -> Result<Option<ScopedStyles>, RunError> {
        let Some(css) = self.extract(document) else {
            return Ok(None);
        };
        let scoped = self.engine.scope(&css).map_err(|err| {
            transition(RunPhase::Scoping, RunPhase::Failed);
            RunError::from(err)
        })?;
        self.apply(document, scoped)
    }
}

impl<E: DeferredScopingEngine> ScopeRunner<E> {
    /// Like [`ScopeRunner::run`], but waits on the engine's future.
    ///
    /// An engine failure resolves to `Ok(None)` unless the options ask for
    /// [`ScopingFailurePolicy::Propagate`]. The style elements are removed either way.
    /// A rewrite failure is always returned as [`RunError::Apply`].
    pub async fn run_deferred(
        &self,
        document: &Document,
    ) -> Result<Option<ScopedStyles>, RunError> {
        let Some(css) = self.extract(document) else {
            return Ok(None);
        };
        let scoped = match self.engine.scope_deferred(css).await {
            Ok(scoped) => scoped,
            Err(err) => {
                transition(RunPhase::Scoping, RunPhase::Failed);
                return match self.options.deferred_scoping_failure {
                    ScopingFailurePolicy::ResolveNone => {
                        warn!("scoping failed, leaving document unscoped: {err}");
                        Ok(None)
                    }
                    ScopingFailurePolicy::Propagate => Err(err.into()),
                };
            }
        };
        self.apply(document, scoped)
    }
}

fn transition(from: RunPhase, to: RunPhase) {
    trace!("scope run: {from} -> {to}");
}
