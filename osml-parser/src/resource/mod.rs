//! Resource registry and import machinery
//!
//! The [`Registry`] ties file extensions to MIME types, MIME types to
//! surface parsers and resource types, and holds the ordered locator list.
//! The [`ResourceManager`](manager::ResourceManager) sits on top and caches
//! parsed modules by canonical location so a file included twice is parsed
//! once.

pub mod locator;
pub mod manager;

pub use locator::{FileLocator, MemoryLocator, ResourceLocator};
pub use manager::{ResourceManager, ResourceRequest};

use crate::surface::Parser;
use osml_core::diagnostics::Logger;
use osml_core::rtti::RttiSet;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::io;
use std::rc::Rc;

/// What kind of module a resource holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    #[default]
    Unknown,
    Document,
    Ontology,
    Typesystem,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Unknown => "unknown",
            ResourceType::Document => "document",
            ResourceType::Ontology => "ontology",
            ResourceType::Typesystem => "typesystem",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum ResourceError {
    NotFound(String),
    NoParser(String),
    AmbiguousMimetype(String),
    RecursiveInclude(String),
    Io(String, io::Error),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound(path) => write!(f, "resource \"{}\" not found", path),
            ResourceError::NoParser(what) => write!(f, "no parser for \"{}\"", what),
            ResourceError::AmbiguousMimetype(path) => {
                write!(f, "cannot deduce a unique mimetype for \"{}\"", path)
            }
            ResourceError::RecursiveInclude(location) => {
                write!(f, "recursive include of \"{}\"", location)
            }
            ResourceError::Io(location, err) => {
                write!(f, "cannot read \"{}\": {}", location, err)
            }
        }
    }
}

impl Error for ResourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ResourceError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}

/// A located resource. `found` distinguishes the invalid placeholder; the
/// locator reference lets relative includes start from the right place and
/// backs [`stream`](Resource::stream).
#[derive(Clone)]
pub struct Resource {
    pub found: bool,
    pub ty: ResourceType,
    pub location: String,
    locator: Option<Rc<dyn ResourceLocator>>,
}

impl Resource {
    pub fn unknown() -> Self {
        Resource {
            found: false,
            ty: ResourceType::Unknown,
            location: String::new(),
            locator: None,
        }
    }

    fn new(locator: Rc<dyn ResourceLocator>, ty: ResourceType, location: String) -> Self {
        Resource {
            found: true,
            ty,
            location,
            locator: Some(locator),
        }
    }

    pub fn locator(&self) -> Option<&Rc<dyn ResourceLocator>> {
        self.locator.as_ref()
    }

    /// The resource's content, served by its originating locator.
    pub fn stream(&self) -> Result<String, ResourceError> {
        match &self.locator {
            Some(locator) => locator.read(&self.location),
            None => Err(ResourceError::NotFound(self.location.clone())),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("found", &self.found)
            .field("ty", &self.ty)
            .field("location", &self.location)
            .finish()
    }
}

/// Everything the import machinery needs to know about the outside world.
#[derive(Default)]
pub struct Registry {
    extensions: HashMap<String, String>,
    parsers: HashMap<String, (Rc<dyn Parser>, RttiSet)>,
    resource_types: HashMap<String, ResourceType>,
    locators: Vec<Rc<dyn ResourceLocator>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Extensions are registered and looked up without the dot,
    /// case-insensitively.
    pub fn register_extension(&mut self, extension: &str, mimetype: impl Into<String>) {
        self.extensions
            .insert(extension.to_ascii_lowercase(), mimetype.into());
    }

    pub fn mimetype_for_extension(&self, extension: &str) -> Option<&str> {
        self.extensions
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Registering a second parser for the same mimetype replaces the first
    /// and logs a warning.
    pub fn register_parser(
        &mut self,
        mimetype: impl Into<String>,
        parser: Rc<dyn Parser>,
        produces: RttiSet,
        logger: &Logger,
    ) {
        let mimetype = mimetype.into();
        if self
            .parsers
            .insert(mimetype.clone(), (parser, produces))
            .is_some()
        {
            logger.warning(
                format!("parser for \"{}\" registered twice, last one wins", mimetype),
                None,
            );
        }
    }

    pub fn parser_for(&self, mimetype: &str) -> Option<&(Rc<dyn Parser>, RttiSet)> {
        self.parsers.get(mimetype)
    }

    /// Mimetypes whose parser can produce at least one of `expected`.
    pub fn mimetypes_producing(&self, expected: &RttiSet) -> Vec<&str> {
        let mut matches: Vec<&str> = self
            .parsers
            .iter()
            .filter(|(_, (_, produces))| produces.intersects(expected))
            .map(|(mime, _)| mime.as_str())
            .collect();
        matches.sort_unstable();
        matches
    }

    pub fn register_resource_type(&mut self, mimetype: impl Into<String>, ty: ResourceType) {
        self.resource_types.insert(mimetype.into(), ty);
    }

    pub fn resource_type_for(&self, mimetype: &str) -> ResourceType {
        self.resource_types
            .get(mimetype)
            .copied()
            .unwrap_or(ResourceType::Unknown)
    }

    pub fn register_locator(&mut self, locator: Rc<dyn ResourceLocator>) {
        self.locators.push(locator);
    }

    /// Locate a resource: the originating locator of `relative_to` is tried
    /// first (against the including file's directory, then plainly), then
    /// all locators in registration order, then once more with the type
    /// hint dropped.
    pub fn locate_resource(
        &self,
        path: &str,
        ty: ResourceType,
        relative_to: Option<&Resource>,
    ) -> Resource {
        if let Some(rel) = relative_to.filter(|r| r.found) {
            if let Some(locator) = &rel.locator {
                let sibling = locator::resolve_relative(&rel.location, path);
                if let Some(location) = locator.locate(&sibling, ty) {
                    return Resource::new(locator.clone(), ty, location);
                }
                if let Some(location) = locator.locate(path, ty) {
                    return Resource::new(locator.clone(), ty, location);
                }
            }
        }
        for locator in &self.locators {
            if let Some(location) = locator.locate(path, ty) {
                return Resource::new(locator.clone(), ty, location);
            }
        }
        if ty != ResourceType::Unknown {
            for locator in &self.locators {
                if let Some(location) = locator.locate(path, ResourceType::Unknown) {
                    return Resource::new(locator.clone(), ResourceType::Unknown, location);
                }
            }
        }
        Resource::unknown()
    }
}
