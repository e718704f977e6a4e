//! Command-line interface for the OSML engine
//!
//! Parses an OSML or OSXML document (extension-dispatched) into a node
//! graph and dumps the result.
//!
//! Usage:
//!   osml `<path>` [--format tree|json|events] [-I `<dir>`]... [--config `<file>`]
//!
//! Exit codes: 0 on success, 1 when the document parsed with errors, 2 when
//! the input could not be processed at all.

mod dump;

use clap::{Arg, ArgAction, Command};
use osml_config::{Loader, OsmlConfig, OutputFormat};
use osml_core::diagnostics::{Logger, Severity};
use osml_core::managed::Manager;
use osml_core::rtti::{types, RttiSet};
use osml_core::source::SourceContextReader;
use osml_parser::resource::{
    FileLocator, Registry, ResourceManager, ResourceRequest, ResourceType,
};
use osml_parser::surface::{OsmlParser, OsxmlParser, ParserEnv};
use std::path::PathBuf;
use std::rc::Rc;

const OSML_MIME: &str = "text/vnd.osml";
const OSXML_MIME: &str = "text/vnd.osxml";

fn main() {
    let matches = Command::new("osml")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Parses OSML and OSXML documents into a node graph")
        .arg(
            Arg::new("input")
                .help("Path to the document to parse")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("include")
                .long("include")
                .short('I')
                .help("Additional include directory (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Output format (default: from configuration)")
                .value_parser(["tree", "json", "events"]),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Write the dump to a file instead of stdout"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file layered over the built-in defaults"),
        )
        .get_matches();

    let mut loader = Loader::new();
    if let Some(path) = matches.get_one::<String>("config") {
        loader = loader.with_file(path);
    }
    let config = loader.build().unwrap_or_else(|err| {
        eprintln!("configuration error: {}", err);
        std::process::exit(2);
    });

    let format = match matches.get_one::<String>("format").map(String::as_str) {
        Some("tree") => OutputFormat::Tree,
        Some("json") => OutputFormat::Json,
        Some("events") => OutputFormat::Events,
        _ => config.output.default_format,
    };
    let input = matches
        .get_one::<String>("input")
        .expect("input is a required argument");
    let includes: Vec<String> = matches
        .get_many::<String>("include")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let output = matches.get_one::<String>("output").map(String::as_str);

    std::process::exit(run(input, &includes, format, output, &config));
}

fn run(
    input: &str,
    includes: &[String],
    format: OutputFormat,
    output: Option<&str>,
    config: &OsmlConfig,
) -> i32 {
    let manager = Manager::new();
    let logger = Logger::new();
    let env = ParserEnv::new(manager.clone(), logger.clone());
    let registry = build_registry(includes, config, &logger);

    let resources = ResourceManager::new();
    let module = match resources.import(&registry, &ResourceRequest::new(input), &env) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("error: {}", err);
            return 2;
        }
    };

    // Attach source context so rendered diagnostics carry an excerpt.
    if let Ok(source) = module.resource.stream() {
        let width = config.diagnostics.max_context_width;
        logger.set_context_resolver(Some(Rc::new(move |range| {
            Some(SourceContextReader::new(&source).context(range, width))
        })));
    }
    let threshold = if config.diagnostics.show_warnings {
        Severity::Warning
    } else {
        Severity::Error
    };
    for diagnostic in logger.diagnostics() {
        if diagnostic.severity >= threshold {
            eprintln!("{}", logger.render(&diagnostic));
        }
    }

    let rendered = match format {
        OutputFormat::Tree => dump::tree(&module.roots, &manager),
        OutputFormat::Json => {
            let value = dump::json(&module.roots, &manager);
            match serde_json::to_string_pretty(&value) {
                Ok(mut text) => {
                    text.push('\n');
                    text
                }
                Err(err) => {
                    eprintln!("error: cannot serialize the graph: {}", err);
                    return 2;
                }
            }
        }
        OutputFormat::Events => dump::events(&module.roots, &manager),
    };
    match output {
        Some(path) => {
            if let Err(err) = std::fs::write(path, &rendered) {
                eprintln!("error: cannot write \"{}\": {}", path, err);
                return 2;
            }
        }
        None => print!("{}", rendered),
    }
    if logger.has_error() {
        1
    } else {
        0
    }
}

fn build_registry(includes: &[String], config: &OsmlConfig, logger: &Logger) -> Registry {
    let mut search_paths: Vec<PathBuf> = config
        .resources
        .include_paths
        .iter()
        .map(PathBuf::from)
        .collect();
    search_paths.extend(includes.iter().map(PathBuf::from));

    let produced = || {
        RttiSet::new(vec![
            &types::DOCUMENT,
            &types::ONTOLOGY,
            &types::TYPESYSTEM,
        ])
    };
    let mut registry = Registry::new();
    registry.register_extension("osml", OSML_MIME);
    registry.register_extension("osxml", OSXML_MIME);
    registry.register_parser(OSML_MIME, Rc::new(OsmlParser::new()), produced(), logger);
    registry.register_parser(OSXML_MIME, Rc::new(OsxmlParser::new()), produced(), logger);
    registry.register_resource_type(OSML_MIME, ResourceType::Document);
    registry.register_resource_type(OSXML_MIME, ResourceType::Document);
    registry.register_locator(Rc::new(FileLocator::new(search_paths)));
    registry
}
