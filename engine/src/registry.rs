//! Bank parser registry.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::parser::RateParser;

/// Ordered set of known bank parsers.
///
/// Registration order is kept and is the order every multi-bank query walks.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn RateParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from parsers in order.
    pub fn from_parsers(
        parsers: impl IntoIterator<Item = Arc<dyn RateParser>>,
    ) -> EngineResult<Self> {
        let mut registry = Self::new();
        for parser in parsers {
            registry.register(parser)?;
        }
        Ok(registry)
    }

    /// Add a parser; names and short names must be unique (case-insensitive).
    pub fn register(&mut self, parser: Arc<dyn RateParser>) -> EngineResult<()> {
        let clash = self.parsers.iter().find(|existing| {
            existing.descriptor().matches_name(parser.short_name())
                || existing.descriptor().matches_name(parser.name())
        });
        if let Some(existing) = clash {
            return Err(EngineError::DuplicateParser(format!(
                "{} clashes with {}",
                parser.short_name(),
                existing.short_name()
            )));
        }

        info!(
            bank = %parser.short_name(),
            active = parser.descriptor().is_active,
            "Registered parser"
        );
        self.parsers.push(parser);
        Ok(())
    }

    /// Find an active parser by name or short name, ignoring case.
    pub fn lookup(&self, name: &str) -> EngineResult<Arc<dyn RateParser>> {
        let query = name.trim();
        match self
            .active()
            .find(|parser| parser.descriptor().matches_name(query))
        {
            Some(parser) => Ok(parser.clone()),
            None => {
                debug!(query, "No parser matched");
                Err(EngineError::ParserLookup(name.to_string()))
            }
        }
    }

    /// Active parsers in registration order.
    pub fn active_parsers(&self) -> Vec<Arc<dyn RateParser>> {
        self.active().cloned().collect()
    }

    /// Names accepted by [`lookup`](Self::lookup): full names, then short names.
    pub fn bank_names(&self) -> Vec<String> {
        let names = self.active().map(|p| p.name().to_string());
        let short_names = self.active().map(|p| p.short_name().to_string());
        names.chain(short_names).collect()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    fn active(&self) -> impl Iterator<Item = &Arc<dyn RateParser>> {
        self.parsers.iter().filter(|p| p.descriptor().is_active)
    }
}
