//! Module cache and include resolution
//!
//! Importing a module runs the full pipeline: deduce the mimetype, pick the
//! parser, locate the file, parse it into the shared graph. Parsed modules
//! are cached by canonical location and resource type, so including the
//! same file twice (even through different relative paths) hands back the
//! same nodes. An include chain that reaches a location already being
//! parsed is reported as recursive instead of looping.
//!
//! `import` takes `&self`: a surface parser triggered by an include command
//! re-enters the manager while the outer import is still running, which is
//! exactly how recursion is detected.

use crate::resource::{Registry, Resource, ResourceError, ResourceType};
use crate::surface::ParserEnv;
use osml_core::managed::Rooted;
use osml_core::rtti::RttiSet;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One import request, before anything about it is deduced.
pub struct ResourceRequest {
    pub path: String,
    pub mimetype: Option<String>,
    pub relative_to: Option<Resource>,
    pub expected_types: RttiSet,
}

impl ResourceRequest {
    pub fn new(path: impl Into<String>) -> Self {
        ResourceRequest {
            path: path.into(),
            mimetype: None,
            relative_to: None,
            expected_types: RttiSet::new(Vec::new()),
        }
    }

    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    pub fn relative_to(mut self, resource: Resource) -> Self {
        self.relative_to = Some(resource);
        self
    }

    pub fn expecting(mut self, types: RttiSet) -> Self {
        self.expected_types = types;
        self
    }
}

/// The parsed module behind one canonical location.
#[derive(Clone)]
pub struct Module {
    pub resource: Resource,
    pub roots: Vec<Rooted>,
}

#[derive(Default)]
pub struct ResourceManager {
    cache: RefCell<HashMap<(String, ResourceType), Module>>,
    in_flight: RefCell<HashSet<(String, ResourceType)>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        ResourceManager::default()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Import a module, parsing it on first sight and serving the cache
    /// afterwards.
    pub fn import(
        &self,
        registry: &Registry,
        request: &ResourceRequest,
        env: &ParserEnv,
    ) -> Result<Module, ResourceError> {
        let mimetype = deduce_mimetype(registry, request)?;
        let ty = registry.resource_type_for(&mimetype);

        let resource =
            registry.locate_resource(&request.path, ty, request.relative_to.as_ref());
        if !resource.found {
            return Err(ResourceError::NotFound(request.path.clone()));
        }

        let key = (resource.location.clone(), resource.ty);
        if let Some(module) = self.cache.borrow().get(&key) {
            return Ok(module.clone());
        }
        if !self.in_flight.borrow_mut().insert(key.clone()) {
            return Err(ResourceError::RecursiveInclude(resource.location.clone()));
        }

        // No borrow is held here; the parser may re-enter `import`.
        let result = parse(registry, &mimetype, &resource, env);
        self.in_flight.borrow_mut().remove(&key);
        let module = result?;
        self.cache.borrow_mut().insert(key, module.clone());
        Ok(module)
    }
}

fn parse(
    registry: &Registry,
    mimetype: &str,
    resource: &Resource,
    env: &ParserEnv,
) -> Result<Module, ResourceError> {
    let Some((parser, _)) = registry.parser_for(mimetype) else {
        return Err(ResourceError::NoParser(mimetype.to_owned()));
    };
    let source = resource.stream()?;
    let roots = parser.parse(&source, env);
    Ok(Module {
        resource: resource.clone(),
        roots,
    })
}

/// Mimetype deduction: explicit value, else file extension, else the unique
/// registered parser producing one of the expected types.
fn deduce_mimetype(
    registry: &Registry,
    request: &ResourceRequest,
) -> Result<String, ResourceError> {
    if let Some(mimetype) = &request.mimetype {
        return Ok(mimetype.clone());
    }
    if let Some(extension) = Path::new(&request.path)
        .extension()
        .and_then(|e| e.to_str())
    {
        if let Some(mimetype) = registry.mimetype_for_extension(extension) {
            return Ok(mimetype.to_owned());
        }
    }
    if !request.expected_types.is_empty() {
        let candidates = registry.mimetypes_producing(&request.expected_types);
        return match candidates.as_slice() {
            [] => Err(ResourceError::NoParser(request.path.clone())),
            [only] => Ok((*only).to_owned()),
            _ => Err(ResourceError::AmbiguousMimetype(request.path.clone())),
        };
    }
    Err(ResourceError::NoParser(request.path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryLocator;
    use crate::surface::{OsmlParser, Parser, ParserEnv};
    use osml_core::diagnostics::Logger;
    use osml_core::managed::Manager;
    use osml_core::rtti::types;
    use std::cell::Cell;
    use std::rc::Rc;

    const OSML_MIME: &str = "text/vnd.osml";

    fn setup(files: &[(&str, &str)]) -> (Registry, ParserEnv, Logger) {
        let mut locator = MemoryLocator::new();
        for (path, content) in files {
            locator.insert(*path, *content);
        }
        let logger = Logger::default();
        let mut registry = Registry::new();
        registry.register_extension("osml", OSML_MIME);
        registry.register_parser(
            OSML_MIME,
            Rc::new(OsmlParser::new()),
            RttiSet::new(vec![&types::DOCUMENT, &types::ONTOLOGY, &types::TYPESYSTEM]),
            &logger,
        );
        registry.register_resource_type(OSML_MIME, ResourceType::Document);
        registry.register_locator(Rc::new(locator));
        let env = ParserEnv::new(Manager::new(), logger.clone());
        (registry, env, logger)
    }

    #[test]
    fn test_import_parses_module() {
        let (registry, env, logger) = setup(&[("a.osml", "\\document{hi}")]);
        let manager = ResourceManager::new();
        let module = manager
            .import(&registry, &ResourceRequest::new("a.osml"), &env)
            .unwrap();
        assert!(!logger.has_error());
        assert_eq!(module.roots.len(), 1);
        assert_eq!(module.roots[0].rtti().name(), "document");
        assert_eq!(module.resource.ty, ResourceType::Document);
    }

    #[test]
    fn test_same_file_two_paths_parsed_once() {
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

        let (mut registry, env, logger) = setup(&[("docs/a.osml", "\\document{once}")]);
        let counter = Rc::new(Cell::new(0));
        registry.register_parser(
            OSML_MIME,
            Rc::new(CountingParser {
                inner: OsmlParser::new(),
                count: counter.clone(),
            }),
            RttiSet::new(vec![&types::DOCUMENT]),
            &logger,
        );

        let manager = ResourceManager::new();
        let first = manager
            .import(&registry, &ResourceRequest::new("docs/a.osml"), &env)
            .unwrap();
        let second = manager
            .import(
                &registry,
                &ResourceRequest::new("docs/sub/../a.osml"),
                &env,
            )
            .unwrap();
        assert_eq!(counter.get(), 1);
        assert_eq!(manager.cached_count(), 1);
        assert_eq!(first.roots[0], second.roots[0]);
    }

    #[test]
    fn test_missing_file_is_error() {
        let (registry, env, _logger) = setup(&[]);
        let manager = ResourceManager::new();
        let result = manager.import(&registry, &ResourceRequest::new("absent.osml"), &env);
        assert!(matches!(result, Err(ResourceError::NotFound(_))));
    }

    #[test]
    fn test_unknown_extension_without_hints_is_error() {
        let (registry, env, _logger) = setup(&[("a.xyz", "")]);
        let manager = ResourceManager::new();
        let result = manager.import(&registry, &ResourceRequest::new("a.xyz"), &env);
        assert!(matches!(result, Err(ResourceError::NoParser(_))));
    }

    #[test]
    fn test_mimetype_deduced_from_expected_types() {
        let (registry, env, _logger) = setup(&[("a.xyz", "\\document{x}")]);
        let manager = ResourceManager::new();
        let request = ResourceRequest::new("a.xyz")
            .expecting(RttiSet::new(vec![&types::DOCUMENT]));
        let module = manager.import(&registry, &request, &env).unwrap();
        assert_eq!(module.roots.len(), 1);
    }

    #[test]
    fn test_explicit_mimetype_wins() {
        let (registry, env, _logger) = setup(&[("a.bin", "\\document{x}")]);
        let manager = ResourceManager::new();
        let request = ResourceRequest::new("a.bin").mimetype(OSML_MIME);
        let module = manager.import(&registry, &request, &env).unwrap();
        assert_eq!(module.roots.len(), 1);
    }

    #[test]
    fn test_recursion_detected() {
        // A parser whose module includes itself; the registry is handed to
        // it after construction since each owns a reference to the other.
        struct SelfIncludingParser {
            registry: Rc<RefCell<Option<Rc<Registry>>>>,
            manager: Rc<ResourceManager>,
            seen: Rc<RefCell<Option<ResourceError>>>,
        }
        impl Parser for SelfIncludingParser {
            fn parse(&self, _source: &str, env: &ParserEnv) -> Vec<Rooted> {
                let registry = self
                    .registry
                    .borrow()
                    .clone()
                    .expect("registry slot filled before parsing");
                let result =
                    self.manager
                        .import(&registry, &ResourceRequest::new("a.osml"), env);
                if let Err(err) = result {
                    *self.seen.borrow_mut() = Some(err);
                }
                Vec::new()
            }
        }

        let slot = Rc::new(RefCell::new(None));
        let manager = Rc::new(ResourceManager::new());
        let seen = Rc::new(RefCell::new(None));
        let logger = Logger::default();

        let mut registry = Registry::new();
        registry.register_extension("osml", OSML_MIME);
        registry.register_parser(
            OSML_MIME,
            Rc::new(SelfIncludingParser {
                registry: slot.clone(),
                manager: manager.clone(),
                seen: seen.clone(),
            }),
            RttiSet::new(vec![&types::DOCUMENT]),
            &logger,
        );
        let mut locator = MemoryLocator::new();
        locator.insert("a.osml", "\\document{}");
        registry.register_locator(Rc::new(locator));
        let registry = Rc::new(registry);
        *slot.borrow_mut() = Some(registry.clone());

        let env = ParserEnv::new(Manager::new(), logger);
        manager
            .import(&registry, &ResourceRequest::new("a.osml"), &env)
            .unwrap();
        assert!(matches!(
            seen.borrow_mut().take(),
            Some(ResourceError::RecursiveInclude(_))
        ));
    }
}
