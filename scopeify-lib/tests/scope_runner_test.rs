use futures::executor::block_on;
use pretty_assertions::assert_eq;
use scopeify_lib::dom::dom_tree::Document;
use scopeify_lib::dom_applier;
use scopeify_lib::parser::dom_indices::ElementIndex;
use scopeify_lib::{
    create_dom_tree, insert_css, to_html, ApplyError, ClassPolicy, FixedScopeMap, RunError,
    RunPhase, RunnerOptions, ScopeMap, ScopeRunner, Scopeify, ScopeifyConfig,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn body(document: &Document) -> String {
    let html = to_html(document).unwrap();
    let start = html.find("<body>").map(|at| at + "<body>".len()).unwrap();
    let end = html.rfind("</body>").unwrap();
    html[start..end].to_string()
}

/// Runs a fixed map over `body_html`, which gets a style element so the runner
/// does not take the style-less fast path.
fn scope_with(map: ScopeMap, policy: ClassPolicy, body_html: &str) -> Document {
    let document = create_dom_tree(&format!("<style>p {{ margin: 0 }}</style>{body_html}"));
    let runner = ScopeRunner::with_options(
        FixedScopeMap::new(map),
        RunnerOptions {
            class_policy: policy,
            ..Default::default()
        },
    );
    runner.run(&document).unwrap().unwrap();
    document
}

const PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Card</title><style>
@font-face { font-family: Brand; src: url(brand.woff) }
.card { font-family: Brand }
.card.featured h1 { color: red }
#hero { animation: spin 1s }
@keyframes spin { to { opacity: 1 } }
</style></head><body><div id="hero" class="card featured"><h1 style="font-family: Brand">Hi</h1><p class="card other">t</p></div></body></html>"#;

#[test]
fn test_scopeify_end_to_end() {
    init_logger();
    let document = create_dom_tree(PAGE);
    let runner = ScopeRunner::new(Scopeify::new(ScopeifyConfig {
        suffix: Some("x".to_string()),
        ..Default::default()
    }));
    let scoped = runner.run(&document).unwrap().unwrap();

    let classes: Vec<_> = scoped.map.classes.iter().collect();
    assert_eq!(classes, vec![("card", "card_x"), ("featured", "featured_x")]);
    assert_eq!(scoped.map.elements.get("h1"), Some("h1_x"));
    assert_eq!(scoped.map.ids.get("hero"), Some("hero_x"));
    assert_eq!(scoped.map.font_faces.get("Brand"), Some("Brand_x"));
    assert_eq!(scoped.map.keyframes.get("spin"), Some("spin_x"));

    assert_eq!(
        body(&document),
        "<div id=\"hero_x\" class=\"card_x featured_x\">\
         <h1 style=\"font-family: Brand_x\" class=\"h1_x\">Hi</h1>\
         <p class=\"other card_x\">t</p></div>"
    );

    let style = insert_css(&document, scoped.css(), None).unwrap();
    let html = to_html(&document).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>"), "{html}");
    assert!(html.contains("<title>Card</title><style type=\"text/css\">"), "{html}");
    assert!(scopeify_lib::dom::dom_tree::text_content(&style).contains(".card_x.featured_x .h1_x"));
}

#[test]
fn test_blocking_and_deferred_are_byte_identical() {
    init_logger();
    let runner = ScopeRunner::new(Scopeify::default());

    let blocking = create_dom_tree(PAGE);
    let deferred = create_dom_tree(PAGE);
    let from_blocking = runner.run(&blocking).unwrap();
    let from_deferred = block_on(runner.run_deferred(&deferred)).unwrap();

    assert_eq!(from_blocking, from_deferred);
    assert_eq!(to_html(&blocking).unwrap(), to_html(&deferred).unwrap());
}

#[test]
fn test_no_style_is_a_no_op() {
    let html = "<html><head></head><body><div class=\"a\" id=\"b\">x</div></body></html>";
    let runner = ScopeRunner::new(Scopeify::default());

    let document = create_dom_tree(html);
    assert_eq!(runner.run(&document), Ok(None));
    assert_eq!(to_html(&document).unwrap(), html);

    let document = create_dom_tree(html);
    assert_eq!(block_on(runner.run_deferred(&document)), Ok(None));
    assert_eq!(to_html(&document).unwrap(), html);
}

#[test]
fn test_compound_class_is_all_or_nothing() {
    let map = ScopeMap {
        classes: [("small featured", "s1")].into_iter().collect(),
        ..Default::default()
    };
    let document = scope_with(
        map,
        ClassPolicy::MutateInPlace,
        "<p class=\"small\">a</p><p class=\"featured small\">b</p>",
    );
    assert_eq!(
        body(&document),
        "<p class=\"small\">a</p><p class=\"s1\">b</p>"
    );
}

#[test]
fn test_tag_augmentation_is_additive() {
    let map = ScopeMap {
        elements: [("div", "d1")].into_iter().collect(),
        ..Default::default()
    };
    let document = scope_with(
        map,
        ClassPolicy::ReplaceWholesale,
        "<div class=\"x\"></div><DIV></DIV><span class=\"x\"></span>",
    );
    // Wholesale still drops the unmatched `x`; the tag class is added either way.
    assert_eq!(
        body(&document),
        "<div class=\"d1\"></div><div class=\"d1\"></div><span class=\"\"></span>"
    );

    let map = ScopeMap {
        elements: [("div", "d1")].into_iter().collect(),
        ..Default::default()
    };
    let document = scope_with(map, ClassPolicy::MutateInPlace, "<div class=\"x\"></div>");
    assert_eq!(body(&document), "<div class=\"x d1\"></div>");
}

#[test]
fn test_wholesale_clears_unmatched_classes() {
    let document = scope_with(
        ScopeMap::default(),
        ClassPolicy::ReplaceWholesale,
        "<div class=\"small\"></div><div></div>",
    );
    assert_eq!(body(&document), "<div class=\"\"></div><div></div>");
}

#[test]
fn test_id_exact_match_only() {
    let map = ScopeMap {
        ids: [("hero", "h1")].into_iter().collect(),
        ..Default::default()
    };
    let document = scope_with(
        map,
        ClassPolicy::MutateInPlace,
        "<p id=\"hero-2\"></p><p id=\"hero\"></p>",
    );
    assert_eq!(body(&document), "<p id=\"hero-2\"></p><p id=\"h1\"></p>");
}

#[test]
fn test_inline_style_substitution_over_matches() {
    let map = ScopeMap {
        font_faces: [("MyFont", "f_abc")].into_iter().collect(),
        ..Default::default()
    };
    let document = scope_with(
        map,
        ClassPolicy::MutateInPlace,
        "<p style=\"font-family: myfont, MYFONT-Bold\"></p>",
    );
    assert_eq!(
        body(&document),
        "<p style=\"font-family: f_abc, f_abc-Bold\"></p>"
    );
}

#[test]
fn test_second_apply_changes_nothing() {
    for policy in [ClassPolicy::MutateInPlace, ClassPolicy::ReplaceWholesale] {
        let document = create_dom_tree(PAGE);
        let runner = ScopeRunner::with_options(
            Scopeify::default(),
            RunnerOptions {
                class_policy: policy,
                ..Default::default()
            },
        );
        let scoped = runner.run(&document).unwrap().unwrap();
        let once = to_html(&document).unwrap();

        dom_applier::apply(&document, &scoped.map, policy).unwrap();
        assert_eq!(to_html(&document).unwrap(), once);
    }
}

#[test]
fn test_apply_failure_is_reported_in_both_modes() {
    let html = "<style>.a { color: red }</style><p class=\"a\">1</p><p class=\"a\">2</p>";
    let runner = ScopeRunner::new(Scopeify::default());

    for deferred in [false, true] {
        let document = create_dom_tree(html);
        let held = ElementIndex::build(&document).by_tag("p")[1].clone();
        let result = {
            let _guard = held.borrow();
            if deferred {
                block_on(runner.run_deferred(&document))
            } else {
                runner.run(&document)
            }
        };

        let err = result.unwrap_err();
        assert_eq!(err.phase(), RunPhase::ApplyingToDom);
        match err {
            RunError::Apply(ApplyError::Elements {
                failures,
                rewritten,
            }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(rewritten, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The first paragraph stays rewritten.
        assert!(!body(&document).starts_with("<p class=\"a\">1"));
    }
}

#[test]
fn test_class_starting_with_a_digit() {
    init_logger();
    let document = create_dom_tree("<style>.\\31 0 { color: red }</style><p class=\"10\">t</p>");
    let runner = ScopeRunner::new(Scopeify::new(ScopeifyConfig {
        suffix: Some("x".to_string()),
        ..Default::default()
    }));
    let scoped = runner.run(&document).unwrap().unwrap();

    assert_eq!(scoped.map.classes.get("10"), Some("_10_x"));
    assert_eq!(body(&document), "<p class=\"_10_x\">t</p>");
    assert!(scoped.css().contains("._10_x"), "{}", scoped.css());
}
