//! End-to-end scenarios across the surfaces, the scope and the resources

use osml_core::diagnostics::Logger;
use osml_core::managed::{Manager, Rooted};
use osml_core::rtti::{types, RttiSet};
use osml_core::source::CharReader;
use osml_core::variant::Variant;
use osml_parser::resource::{
    MemoryLocator, Registry, ResourceManager, ResourceRequest, ResourceType,
};
use osml_parser::scope::ParserScope;
use osml_parser::surface::{OsmlParser, OsxmlParser, Parser, ParserEnv};
use osml_parser::tokens::{Tokenizer, TOKEN_DATA};
use std::cell::Cell;
use std::rc::Rc;

fn env() -> (ParserEnv, Manager, Logger) {
    let manager = Manager::new();
    let logger = Logger::default();
    let env = ParserEnv::new(manager.clone(), logger.clone());
    (env, manager, logger)
}

/// An empty OSXML document: no commands, no errors, zero top-level nodes.
#[test]
fn empty_osxml_document() {
    let (env, _manager, logger) = env();
    let roots = OsxmlParser::new().parse("<ousia/>", &env);
    assert!(roots.is_empty());
    assert!(logger.is_empty());
}

/// Comment-style tokens split data exactly at their boundaries.
#[test]
fn comment_tokens_split_data() {
    let mut tokenizer = Tokenizer::new(CharReader::new("a/*b*/c"));
    tokenizer.register_token("/*", 1);
    tokenizer.register_token("*/", 2);
    tokenizer.register_token("/", 3);
    let tokens: Vec<(u32, String)> = tokenizer.map(|t| (t.id, t.content)).collect();
    assert_eq!(
        tokens,
        vec![
            (TOKEN_DATA, "a".to_owned()),
            (1, "/*".to_owned()),
            (TOKEN_DATA, "b".to_owned()),
            (2, "*/".to_owned()),
            (TOKEN_DATA, "c".to_owned()),
        ]
    );
}

/// A reference posted before its target exists is parked, fires exactly
/// once when the target appears, and leaves no end-of-parse diagnostic.
#[test]
fn forward_reference_resolves_after_definition() {
    let (_env, manager, logger) = env();
    let document = manager.create(&types::DOCUMENT, "doc");
    let mut scope = ParserScope::new();
    scope.push(document.clone());

    let fired = Rc::new(Cell::new(0));
    let seen_name = Rc::new(std::cell::RefCell::new(String::new()));
    let retired = {
        let fired = fired.clone();
        let seen_name = seen_name.clone();
        scope.resolve(
            &["x"],
            &types::NODE,
            document.clone(),
            (5..6).into(),
            &logger,
            Rc::new(move |target: &Rooted, _owner: &Rooted, _logger: &Logger| {
                fired.set(fired.get() + 1);
                *seen_name.borrow_mut() = target.name();
            }),
            None,
        )
    };
    assert!(!retired);
    assert_eq!(scope.pending_count(), 1);
    assert_eq!(fired.get(), 0);

    let x = manager.create(&types::NODE, "x");
    document.adopt(&x).unwrap();
    scope.retry_all(&logger);
    assert_eq!(fired.get(), 1);
    assert_eq!(&*seen_name.borrow(), "x");

    scope.flush(&logger);
    assert_eq!(fired.get(), 1);
    assert!(logger.is_empty());
}

/// A reference that never resolves produces exactly one diagnostic and no
/// callback.
#[test]
fn dangling_reference_reports_once() {
    let (_env, manager, logger) = env();
    let document = manager.create(&types::DOCUMENT, "doc");
    let mut scope = ParserScope::new();
    scope.push(document.clone());

    let fired = Rc::new(Cell::new(0));
    let callback = {
        let fired = fired.clone();
        Rc::new(move |_: &Rooted, _: &Rooted, _: &Logger| fired.set(fired.get() + 1))
    };
    scope.resolve(
        &["missing"],
        &types::NODE,
        document,
        (0..7).into(),
        &logger,
        callback,
        None,
    );
    scope.flush(&logger);
    assert_eq!(fired.get(), 0);
    assert_eq!(logger.len(), 1);
    assert!(logger.has_error());
}

/// Overlapping annotations survive as sibling anchors in event order.
#[test]
fn overlapping_annotations_are_siblings() {
    let (env, manager, logger) = env();
    let roots = OsmlParser::new().parse("\\document{\\<em a\\<strong b\\>em c\\>strong}", &env);
    assert!(!logger.has_error());
    assert_eq!(roots.len(), 1);

    let children: Vec<Rooted> = roots[0]
        .children()
        .iter()
        .filter_map(|id| manager.rooted(*id))
        .collect();
    let anchors: Vec<(String, String)> = children
        .iter()
        .filter(|n| n.rtti() == &*types::ANNOTATION)
        .map(|n| {
            let role = n
                .read_data("role")
                .and_then(|v| v.to_string_value().ok())
                .unwrap_or_default();
            (n.name(), role)
        })
        .collect();
    assert_eq!(
        anchors,
        vec![
            ("em".to_owned(), "start".to_owned()),
            ("strong".to_owned(), "start".to_owned()),
            ("em".to_owned(), "end".to_owned()),
            ("strong".to_owned(), "end".to_owned()),
        ]
    );
    let texts: Vec<String> = children
        .iter()
        .filter_map(|n| n.read_data("text").and_then(|v| v.to_string_value().ok()))
        .collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

/// The same file included through two spellings is parsed exactly once.
#[test]
fn canonical_paths_share_one_parse() {
    struct CountingParser {
        inner: OsmlParser,
        count: Rc<Cell<usize>>,
    }
    impl Parser for CountingParser {
        fn parse(&self, source: &str, env: &ParserEnv) -> Vec<Rooted> {
            self.count.set(self.count.get() + 1);
            self.inner.parse(source, env)
        }
    }

    let (env, _manager, logger) = env();
    let mut locator = MemoryLocator::new();
    locator.insert("lib/shared.osml", "\\ontology{}");
    let counter = Rc::new(Cell::new(0));
    let mut registry = Registry::new();
    registry.register_extension("osml", "text/vnd.osml");
    registry.register_parser(
        "text/vnd.osml",
        Rc::new(CountingParser {
            inner: OsmlParser::new(),
            count: counter.clone(),
        }),
        RttiSet::new(vec![&types::ONTOLOGY]),
        &logger,
    );
    registry.register_resource_type("text/vnd.osml", ResourceType::Ontology);
    registry.register_locator(Rc::new(locator));

    let resources = ResourceManager::new();
    let first = resources
        .import(&registry, &ResourceRequest::new("lib/shared.osml"), &env)
        .unwrap();
    let second = resources
        .import(
            &registry,
            &ResourceRequest::new("lib/nested/../shared.osml"),
            &env,
        )
        .unwrap();

    assert_eq!(counter.get(), 1);
    assert_eq!(resources.cached_count(), 1);
    assert_eq!(first.resource.location, second.resource.location);
    assert_eq!(first.roots[0], second.roots[0]);
    assert_eq!(first.roots[0].read_data("class"), None);
    assert_eq!(first.roots[0].rtti(), &*types::ONTOLOGY);
}

/// Both surfaces produce the same graph for equivalent inputs.
#[test]
fn surfaces_agree_on_equivalent_documents() {
    let (osml_env, osml_mgr, osml_log) = env();
    let osml_roots = OsmlParser::new().parse("\\document{\\chapter{hello}}", &osml_env);

    let (osxml_env, osxml_mgr, osxml_log) = env();
    let osxml_roots =
        OsxmlParser::new().parse("<document><chapter>hello</chapter></document>", &osxml_env);

    assert!(!osml_log.has_error());
    assert!(!osxml_log.has_error());
    assert_eq!(shape(&osml_roots, &osml_mgr), shape(&osxml_roots, &osxml_mgr));
}

fn shape(roots: &[Rooted], manager: &Manager) -> Vec<String> {
    fn walk(out: &mut Vec<String>, node: &Rooted, manager: &Manager, depth: usize) {
        let text = node
            .read_data("text")
            .map(|v| v.to_string_value().unwrap_or_default())
            .unwrap_or_default();
        out.push(format!(
            "{}{}:{}:{}",
            "  ".repeat(depth),
            node.rtti().name(),
            node.name(),
            text
        ));
        for child in node.children().iter().filter_map(|id| manager.rooted(*id)) {
            walk(out, &child, manager, depth + 1);
        }
    }
    let mut out = Vec::new();
    for root in roots {
        walk(&mut out, root, manager, 0);
    }
    out
}

/// A document assembled from OSML parses into typed variants end to end.
#[test]
fn typed_arguments_flow_into_the_graph() {
    let (env, manager, logger) = env();
    let roots = OsmlParser::new().parse(
        "\\document{\\figure[wide]{width=640, visible=true}{body}}",
        &env,
    );
    assert!(!logger.has_error());
    let figure = manager.rooted(roots[0].children()[0]).unwrap();
    assert_eq!(figure.name(), "figure");
    assert_eq!(figure.read_data("class"), Some(Variant::from("wide".to_owned())));
    assert_eq!(figure.read_data("width"), Some(Variant::Int(640)));
    assert_eq!(figure.read_data("visible"), Some(Variant::Bool(true)));
}
