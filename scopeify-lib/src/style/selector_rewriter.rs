use crate::dom::dom_tree::ElementNode;
use crate::error::ApplyError;
use crate::style::scope_map::ScopeMap;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

/// How matched class rules are committed to an element's class list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassPolicy {
    /// Remove matched originals and add their replacements; unmatched classes stay.
    #[default]
    MutateInPlace,
    /// The class list becomes only the scoped classes; unmatched classes are dropped.
    ReplaceWholesale,
}

/// Read-only snapshot of the element state a rewrite depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementView<'a> {
    /// Lowercase tag name.
    pub tag: String,
    /// Raw class attribute, if present.
    pub class_attr: Option<&'a str>,
    pub id: Option<&'a str>,
    pub style: Option<&'a str>,
}

impl<'a> ElementView<'a> {
    pub fn of(element: &'a ElementNode) -> Self {
        ElementView {
            tag: element.tag_name(),
            class_attr: element.attribute("class"),
            id: element.attribute("id"),
            style: element.attribute("style"),
        }
    }

    /// Class tokens as an ordered set.
    pub fn classes(&self) -> Vec<&'a str> {
        let mut tokens: Vec<&'a str> = Vec::new();
        for token in self.class_attr.unwrap_or("").split_ascii_whitespace() {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
    }
}

/// Changes to commit to one element. `None` fields leave the attribute untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    pub classes: Option<Vec<String>>,
    pub id: Option<String>,
    pub style: Option<String>,
}

impl Rewrite {
    pub fn is_empty(&self) -> bool {
        self.classes.is_none() && self.id.is_none() && self.style.is_none()
    }

    /// Writes the changes onto `element`.
    pub fn commit(&self, element: &mut ElementNode) {
        if let Some(classes) = &self.classes {
            element.set_attribute("class", &classes.join(" "));
        }
        if let Some(id) = &self.id {
            element.set_attribute("id", id);
        }
        if let Some(style) = &self.style {
            element.set_attribute("style", style);
        }
    }
}

/// A `classes` entry split into its tokens.
#[derive(Debug)]
struct ClassRule<'m> {
    tokens: Vec<&'m str>,
    replacement: &'m str,
}

/// Compiled size allowed for one inline-style matcher.
const STYLE_PATTERN_SIZE_LIMIT: usize = 1 << 16;

/// Case-insensitive literal matcher for a font-face or keyframes name.
#[derive(Debug)]
struct StyleRule<'m> {
    pattern: Regex,
    replacement: &'m str,
}

/// Computes per-element rewrites from a scope map.
///
/// All decisions read the element's state as it was before the rewrite, and
/// the scope map is never modified.
#[derive(Debug)]
pub struct SelectorRewriter<'m> {
    map: &'m ScopeMap,
    policy: ClassPolicy,
    class_rules: Vec<ClassRule<'m>>,
    scoped_classes: HashSet<&'m str>,
    style_rules: Vec<StyleRule<'m>>,
}

impl<'m> SelectorRewriter<'m> {
    pub fn new(map: &'m ScopeMap, policy: ClassPolicy) -> Result<Self, ApplyError> {
        let class_rules = map
            .classes
            .iter()
            .map(|(key, replacement)| ClassRule {
                tokens: key.split_ascii_whitespace().collect(),
                replacement,
            })
            .filter(|rule| !rule.tokens.is_empty())
            .collect();

        let scoped_classes = map.classes.values().chain(map.elements.values()).collect();

        // Font faces first: keyframes substitutions see the font-rewritten text.
        let mut style_rules = Vec::new();
        for (key, replacement) in map.font_faces.iter().chain(map.keyframes.iter()) {
            if key.is_empty() {
                continue;
            }
            let pattern = RegexBuilder::new(&regex::escape(key))
                .case_insensitive(true)
                .size_limit(STYLE_PATTERN_SIZE_LIMIT)
                .build()
                .map_err(|err| ApplyError::InvalidPattern {
                    key: key.to_string(),
                    message: err.to_string(),
                })?;
            style_rules.push(StyleRule {
                pattern,
                replacement,
            });
        }

        Ok(SelectorRewriter {
            map,
            policy,
            class_rules,
            scoped_classes,
            style_rules,
        })
    }

    /// Computes the rewrite for one element without touching it.
    pub fn compute(&self, element: &ElementView<'_>) -> Rewrite {
        Rewrite {
            classes: self.rewrite_classes(element),
            id: self.rewrite_id(element),
            style: self.rewrite_style(element),
        }
    }

    fn rewrite_classes(&self, element: &ElementView<'_>) -> Option<Vec<String>> {
        let original = element.classes();

        let mut removals: Vec<&str> = Vec::new();
        let mut additions: Vec<&str> = Vec::new();
        for rule in &self.class_rules {
            // Compound keys fire only when every token is present.
            if rule.tokens.iter().all(|token| original.contains(token)) {
                removals.extend(rule.tokens.iter().copied());
                additions.push(rule.replacement);
            }
        }
        for (key, class_name) in self.map.elements.iter() {
            if key == "*" || key == element.tag {
                additions.push(class_name);
            }
        }

        let mut updated: Vec<&str> = match self.policy {
            ClassPolicy::MutateInPlace => original
                .iter()
                .copied()
                .filter(|token| !removals.contains(token))
                .collect(),
            ClassPolicy::ReplaceWholesale => original
                .iter()
                .copied()
                .filter(|token| self.scoped_classes.contains(token))
                .collect(),
        };
        for class_name in additions {
            if !updated.contains(&class_name) {
                updated.push(class_name);
            }
        }

        let unchanged = match element.class_attr {
            Some(raw) => match self.policy {
                ClassPolicy::MutateInPlace => updated == original,
                ClassPolicy::ReplaceWholesale => raw == updated.join(" "),
            },
            None => updated.is_empty(),
        };
        if unchanged {
            None
        } else {
            Some(updated.into_iter().map(str::to_string).collect())
        }
    }

    fn rewrite_id(&self, element: &ElementView<'_>) -> Option<String> {
        let id = element.id?;
        self.map
            .ids
            .get(id)
            .filter(|scoped| *scoped != id)
            .map(str::to_string)
    }

    fn rewrite_style(&self, element: &ElementView<'_>) -> Option<String> {
        let original = element.style.filter(|style| !style.is_empty())?;
        let mut text = original.to_string();
        for rule in &self.style_rules {
            if rule.pattern.is_match(&text) {
                text = replace_unscoped(&rule.pattern, &text, rule.replacement);
            }
        }
        if text == original {
            None
        } else {
            Some(text)
        }
    }
}

/// Replaces every match of `pattern` in `text` with `replacement`, except
/// matches lying inside an occurrence of `replacement` itself.
fn replace_unscoped(pattern: &Regex, text: &str, replacement: &str) -> String {
    let scoped: Vec<(usize, usize)> = text
        .match_indices(replacement)
        .map(|(start, found)| (start, start + found.len()))
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in pattern.find_iter(text) {
        let inside_scoped = scoped
            .iter()
            .any(|&(start, end)| start <= found.start() && found.end() <= end);
        if inside_scoped {
            continue;
        }
        out.push_str(&text[last..found.start()]);
        out.push_str(replacement);
        last = found.end();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::scope_map::SelectorMap;
    use pretty_assertions::assert_eq;

    fn table(pairs: &[(&str, &str)]) -> SelectorMap {
        pairs.iter().copied().collect()
    }

    fn view<'a>(tag: &str, class_attr: Option<&'a str>) -> ElementView<'a> {
        ElementView {
            tag: tag.to_string(),
            class_attr,
            ..Default::default()
        }
    }

    fn classes_of(rewrite: &Rewrite) -> Option<Vec<&str>> {
        rewrite
            .classes
            .as_ref()
            .map(|classes| classes.iter().map(String::as_str).collect())
    }

    #[test]
    fn test_single_class_is_swapped() {
        let map = ScopeMap {
            classes: table(&[("red", "red_1")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::MutateInPlace).unwrap();
        let rewrite = rewriter.compute(&view("div", Some("red other")));
        assert_eq!(classes_of(&rewrite), Some(vec!["other", "red_1"]));
    }

    #[test]
    fn test_compound_class_is_all_or_nothing() {
        let map = ScopeMap {
            classes: table(&[("small featured", "s1")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::MutateInPlace).unwrap();

        assert_eq!(rewriter.compute(&view("div", Some("small"))), Rewrite::default());

        let rewrite = rewriter.compute(&view("div", Some("featured small")));
        assert_eq!(classes_of(&rewrite), Some(vec!["s1"]));
    }

    #[test]
    fn test_rules_accumulate_before_commit() {
        let map = ScopeMap {
            classes: table(&[("a b", "ab1"), ("b", "b1"), ("c", "c1")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::MutateInPlace).unwrap();
        // "b" is consumed by two rules; both see the original list.
        let rewrite = rewriter.compute(&view("p", Some("a b keep")));
        assert_eq!(classes_of(&rewrite), Some(vec!["keep", "ab1", "b1"]));
    }

    #[test]
    fn test_tag_augmentation_is_additive() {
        let map = ScopeMap {
            elements: table(&[("div", "d1"), ("*", "any1"), ("p", "p1")]),
            ..Default::default()
        };
        for policy in [ClassPolicy::MutateInPlace, ClassPolicy::ReplaceWholesale] {
            let rewriter = SelectorRewriter::new(&map, policy).unwrap();
            let rewrite = rewriter.compute(&view("div", None));
            assert_eq!(classes_of(&rewrite), Some(vec!["d1", "any1"]));
        }

        let rewriter = SelectorRewriter::new(&map, ClassPolicy::MutateInPlace).unwrap();
        let rewrite = rewriter.compute(&view("div", Some("mine")));
        assert_eq!(classes_of(&rewrite), Some(vec!["mine", "d1", "any1"]));
    }

    #[test]
    fn test_wholesale_clears_unmatched_classes() {
        let map = ScopeMap::default();
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::ReplaceWholesale).unwrap();

        let rewrite = rewriter.compute(&view("div", Some("small")));
        assert_eq!(rewrite.classes, Some(Vec::new()));

        // No attribute and nothing matched: leave the element alone.
        assert_eq!(rewriter.compute(&view("div", None)), Rewrite::default());
    }

    #[test]
    fn test_wholesale_keeps_discovery_order() {
        let map = ScopeMap {
            classes: table(&[("b", "b1"), ("a", "a1")]),
            elements: table(&[("span", "span1")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::ReplaceWholesale).unwrap();
        let rewrite = rewriter.compute(&view("span", Some("a unknown b")));
        assert_eq!(classes_of(&rewrite), Some(vec!["b1", "a1", "span1"]));
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let map = ScopeMap {
            classes: table(&[("small", "small_x")]),
            elements: table(&[("div", "div_x")]),
            ..Default::default()
        };
        for policy in [ClassPolicy::MutateInPlace, ClassPolicy::ReplaceWholesale] {
            let rewriter = SelectorRewriter::new(&map, policy).unwrap();
            let first = rewriter.compute(&view("div", Some("small")));
            let joined = first.classes.clone().unwrap().join(" ");
            let second = rewriter.compute(&view("div", Some(&joined)));
            assert_eq!(second, Rewrite::default(), "{policy:?}");
        }
    }

    #[test]
    fn test_id_exact_match_only() {
        let map = ScopeMap {
            ids: table(&[("hero", "h1")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::default()).unwrap();

        let exact = ElementView {
            id: Some("hero"),
            ..view("div", None)
        };
        assert_eq!(rewriter.compute(&exact).id, Some("h1".to_string()));

        let partial = ElementView {
            id: Some("hero-2"),
            ..view("div", None)
        };
        assert_eq!(rewriter.compute(&partial), Rewrite::default());
    }

    #[test]
    fn test_style_substitution_is_global_and_case_insensitive() {
        let map = ScopeMap {
            font_faces: table(&[("MyFont", "f_abc")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::default()).unwrap();
        let element = ElementView {
            style: Some("font-family: myfont, MYFONT-Bold"),
            ..view("p", None)
        };
        assert_eq!(
            rewriter.compute(&element).style,
            Some("font-family: f_abc, f_abc-Bold".to_string())
        );
    }

    #[test]
    fn test_keyframes_see_font_rewritten_text() {
        let map = ScopeMap {
            font_faces: table(&[("Brand", "Pulse_f")]),
            keyframes: table(&[("pulse", "pulse_k"), ("fade.in", "fade_1")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::default()).unwrap();
        let element = ElementView {
            style: Some("font-family: Brand; animation: pulse 1s, fade.in 2s, fadexin 3s"),
            ..view("p", None)
        };
        // "Pulse" only exists after the font pass; keys are literal, so "fadexin" stays.
        assert_eq!(
            rewriter.compute(&element).style,
            Some("font-family: pulse_k_f; animation: pulse_k 1s, fade_1 2s, fadexin 3s".to_string())
        );
    }

    #[test]
    fn test_style_rewrite_is_idempotent() {
        let map = ScopeMap {
            font_faces: table(&[("MyFont", "MyFont_abc")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::default()).unwrap();
        let first = rewriter
            .compute(&ElementView {
                style: Some("font-family: MyFont"),
                ..view("p", None)
            })
            .style
            .unwrap();
        assert_eq!(first, "font-family: MyFont_abc");

        let second = rewriter.compute(&ElementView {
            style: Some(&first),
            ..view("p", None)
        });
        assert_eq!(second, Rewrite::default());
    }

    #[test]
    fn test_oversized_key_is_rejected() {
        let key = "a".repeat(20_000);
        let map = ScopeMap {
            keyframes: [(key.as_str(), "k1")].into_iter().collect(),
            ..Default::default()
        };
        match SelectorRewriter::new(&map, ClassPolicy::MutateInPlace) {
            Err(ApplyError::InvalidPattern { key: rejected, .. }) => assert_eq!(rejected, key),
            other => panic!("expected an invalid pattern, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_style_is_ignored() {
        let map = ScopeMap {
            keyframes: table(&[("", "never"), ("x", "y")]),
            ..Default::default()
        };
        let rewriter = SelectorRewriter::new(&map, ClassPolicy::default()).unwrap();
        let element = ElementView {
            style: Some(""),
            ..view("p", None)
        };
        assert_eq!(rewriter.compute(&element), Rewrite::default());
    }
}
