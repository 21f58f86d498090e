use crate::error::ScopeError;
use crate::style::css_rewrite::{self, Renamer, SelectorKind};
use crate::style::scope_map::{ScopeMap, ScopedStyles};
use futures::future::LocalBoxFuture;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::font_face::FontFaceProperty;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{ParserOptions, StyleSheet as LightningStyleSheet};
use lightningcss::traits::ToCss;
use log::debug;
use sha2::{Digest, Sha256};

/// Turns raw CSS text into a scope map plus the scoped CSS text.
pub trait ScopingEngine {
    fn scope(&self, css: &str) -> Result<ScopedStyles, ScopeError>;
}

impl<E: ScopingEngine + ?Sized> ScopingEngine for &E {
    fn scope(&self, css: &str) -> Result<ScopedStyles, ScopeError> {
        (**self).scope(css)
    }
}

/// An engine whose result arrives later.
///
/// Every [`ScopingEngine`] is also deferred; its work runs when the future is first polled.
pub trait DeferredScopingEngine {
    fn scope_deferred(&self, css: String) -> LocalBoxFuture<'_, Result<ScopedStyles, ScopeError>>;
}

impl<E: ScopingEngine> DeferredScopingEngine for E {
    fn scope_deferred(&self, css: String) -> LocalBoxFuture<'_, Result<ScopedStyles, ScopeError>> {
        Box::pin(async move { self.scope(&css) })
    }
}

/// Options of the built-in engine. The DOM passes never look at these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeifyConfig {
    /// Fixed suffix for every generated name. Defaults to a hash of the CSS text.
    pub suffix: Option<String>,
    /// Number of hex digits of the CSS hash used as suffix.
    pub hash_length: usize,
}

impl Default for ScopeifyConfig {
    fn default() -> Self {
        ScopeifyConfig {
            suffix: None,
            hash_length: 6,
        }
    }
}

/// The built-in engine: renames every class, id, type selector, font face and
/// keyframes rule of a stylesheet to `<name>_<suffix>`.
#[derive(Debug, Clone, Default)]
pub struct Scopeify {
    config: ScopeifyConfig,
}

impl Scopeify {
    pub fn new(config: ScopeifyConfig) -> Self {
        Scopeify { config }
    }

    fn suffix_for(&self, css: &str) -> String {
        if let Some(suffix) = &self.config.suffix {
            return suffix.clone();
        }
        let digest = Sha256::digest(css.as_bytes());
        let mut hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        hex.truncate(self.config.hash_length);
        hex
    }
}

impl ScopingEngine for Scopeify {
    fn scope(&self, css: &str) -> Result<ScopedStyles, ScopeError> {
        let suffix = self.suffix_for(css);
        let sheet = parse_sheet(css)?;

        // Declarations may use a font face or keyframes before the rule defining it.
        let mut map = ScopeMap::default();
        collect_at_rule_names(&sheet.rules.0, &mut map, &suffix);

        let printed = print_sheet(&sheet)?;
        let mut renamer = Registering {
            map,
            suffix: &suffix,
        };
        let css = css_rewrite::rewrite_stylesheet(&printed, &mut renamer);
        let map = renamer.map;
        debug!(
            "scoped {} classes, {} elements, {} ids, {} font faces, {} keyframes",
            map.classes.len(),
            map.elements.len(),
            map.ids.len(),
            map.font_faces.len(),
            map.keyframes.len()
        );
        Ok(ScopedStyles { map, css })
    }
}

/// An engine replaying a scope map computed elsewhere.
///
/// Only names present in the map are rewritten in the CSS text.
#[derive(Debug, Clone, Default)]
pub struct FixedScopeMap {
    map: ScopeMap,
}

impl FixedScopeMap {
    pub fn new(map: ScopeMap) -> Self {
        FixedScopeMap { map }
    }

    pub fn map(&self) -> &ScopeMap {
        &self.map
    }
}

impl ScopingEngine for FixedScopeMap {
    fn scope(&self, css: &str) -> Result<ScopedStyles, ScopeError> {
        let sheet = parse_sheet(css)?;
        let printed = print_sheet(&sheet)?;
        let mut renamer = Lookup { map: &self.map };
        let css = css_rewrite::rewrite_stylesheet(&printed, &mut renamer);
        Ok(ScopedStyles {
            map: self.map.clone(),
            css,
        })
    }
}

/// Adds a generated name for every selector part it sees.
struct Registering<'a> {
    map: ScopeMap,
    suffix: &'a str,
}

impl Renamer for Registering<'_> {
    fn rename(&mut self, kind: SelectorKind, original: &str) -> Option<String> {
        let suffix = self.suffix;
        let table = match kind {
            SelectorKind::Class => &mut self.map.classes,
            SelectorKind::Id => &mut self.map.ids,
            SelectorKind::Element => &mut self.map.elements,
        };
        Some(
            table
                .get_or_insert_with(original, || scoped_name(original, suffix))
                .to_string(),
        )
    }

    fn map(&self) -> &ScopeMap {
        &self.map
    }
}

/// Renames only what an existing map already knows.
struct Lookup<'a> {
    map: &'a ScopeMap,
}

impl Renamer for Lookup<'_> {
    fn rename(&mut self, kind: SelectorKind, original: &str) -> Option<String> {
        let table = match kind {
            SelectorKind::Class => &self.map.classes,
            SelectorKind::Id => &self.map.ids,
            SelectorKind::Element => &self.map.elements,
        };
        table.get(original).map(str::to_string)
    }

    fn map(&self) -> &ScopeMap {
        self.map
    }
}

fn parse_sheet(css: &str) -> Result<LightningStyleSheet<'_, '_>, ScopeError> {
    LightningStyleSheet::parse(css, ParserOptions::default())
        .map_err(|err| ScopeError::Parse(err.to_string()))
}

fn print_sheet(sheet: &LightningStyleSheet<'_, '_>) -> Result<String, ScopeError> {
    sheet
        .to_css(PrinterOptions::default())
        .map(|result| result.code)
        .map_err(|err| ScopeError::Print(err.to_string()))
}

/// Walks the rule list (and nested grouping rules) for font faces and keyframes.
fn collect_at_rule_names(rules: &[CssRule<'_>], map: &mut ScopeMap, suffix: &str) {
    for rule in rules {
        match rule {
            CssRule::FontFace(font_face) => {
                for property in &font_face.properties {
                    if let FontFaceProperty::FontFamily(family) = property {
                        if let Ok(name) = family.to_css_string(PrinterOptions::default()) {
                            let name = unquote(&name);
                            map.font_faces
                                .get_or_insert_with(name, || scoped_name(name, suffix));
                        }
                    }
                }
            }
            CssRule::Keyframes(keyframes) => {
                if let Ok(name) = keyframes.name.to_css_string(PrinterOptions::default()) {
                    let name = unquote(&name);
                    map.keyframes
                        .get_or_insert_with(name, || scoped_name(name, suffix));
                }
            }
            CssRule::Media(media_rule) => collect_at_rule_names(&media_rule.rules.0, map, suffix),
            CssRule::Supports(supports_rule) => {
                collect_at_rule_names(&supports_rule.rules.0, map, suffix)
            }
            _ => {}
        }
    }
}

fn unquote(name: &str) -> &str {
    let trimmed = name.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

/// `<original>_<suffix>`, with the original made safe to use as an identifier.
fn scoped_name(original: &str, suffix: &str) -> String {
    let mut base: String = if original == "*" {
        "asterisk".to_string()
    } else {
        original
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect()
    };
    let mut chars = base.chars();
    let needs_prefix = match (chars.next(), chars.next()) {
        (None, _) => true,
        (Some(first), _) if first.is_ascii_digit() => true,
        (Some('-'), Some(second)) if second.is_ascii_digit() => true,
        (Some('-'), None) => true,
        _ => false,
    };
    if needs_prefix {
        base.insert(0, '_');
    }
    format!("{base}_{suffix}")
}
