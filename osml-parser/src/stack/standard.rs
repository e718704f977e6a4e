//! Standard parser states
//!
//! A small state table sufficient for generic documents: a `document` root
//! state, `ontology` and `typesystem` module states, and a wildcard element
//! state that turns any other command into a plain node. Ontology-driven
//! parsing registers richer states on top of these.

use crate::stack::{
    Handler, HandlerContext, HandlerError, ParserState, StateRegistry, ROOT_STATE, WILDCARD_STATE,
};
use osml_core::managed::Rooted;
use osml_core::rtti::{types, RttiType};
use osml_core::variant::{Variant, VariantMap};

/// Creates one node per command, stores the arguments in the node's data
/// side channel and collects primitive content as child text nodes.
pub struct ElementHandler {
    rtti: &'static RttiType,
}

impl ElementHandler {
    pub fn node() -> Box<dyn Handler> {
        Box::new(ElementHandler { rtti: &types::NODE })
    }

    pub fn document() -> Box<dyn Handler> {
        Box::new(ElementHandler {
            rtti: &types::DOCUMENT,
        })
    }

    pub fn ontology() -> Box<dyn Handler> {
        Box::new(ElementHandler {
            rtti: &types::ONTOLOGY,
        })
    }

    pub fn typesystem() -> Box<dyn Handler> {
        Box::new(ElementHandler {
            rtti: &types::TYPESYSTEM,
        })
    }
}

impl Handler for ElementHandler {
    fn on_start(
        &mut self,
        cx: &mut HandlerContext<'_>,
        name: &str,
        args: &VariantMap,
    ) -> Result<Option<Rooted>, HandlerError> {
        // An explicit name argument overrides the command name.
        let node_name = match args.get("name") {
            Some(v) => v.to_string_value().unwrap_or_else(|_| name.to_owned()),
            None => name.to_owned(),
        };
        let node = cx.manager.create(self.rtti, node_name);
        for (key, value) in args {
            node.store_data(key.clone(), value.clone());
        }
        cx.attach(&node);
        Ok(Some(node))
    }

    fn on_data(
        &mut self,
        cx: &mut HandlerContext<'_>,
        _token: &crate::tokens::Token,
        value: &Variant,
    ) -> Result<(), HandlerError> {
        let text = cx.manager.create(&types::NODE, "");
        text.store_data("text", value.clone());
        cx.attach(&text);
        Ok(())
    }
}

/// The default state table.
pub fn standard_registry() -> StateRegistry {
    let mut registry = StateRegistry::new();
    registry.register(
        ParserState::build("document", ElementHandler::document)
            .parent(ROOT_STATE)
            .creates(&types::DOCUMENT)
            .annotations(),
    );
    registry.register(
        ParserState::build("ontology", ElementHandler::ontology)
            .parent(ROOT_STATE)
            .parent("document")
            .creates(&types::ONTOLOGY),
    );
    registry.register(
        ParserState::build("typesystem", ElementHandler::typesystem)
            .parent(ROOT_STATE)
            .parent("document")
            .parent("ontology")
            .creates(&types::TYPESYSTEM),
    );
    registry.register(
        ParserState::build(WILDCARD_STATE, ElementHandler::node)
            .parent(WILDCARD_STATE)
            .creates(&types::NODE)
            .annotations(),
    );
    registry
}
