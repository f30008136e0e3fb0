//! Ordered macro store with recursive reference resolution
//!
//! Macros are declared in the `ENTITIES` section and referenced elsewhere as
//! `&name;`. The table keeps declaration order, which drives both the
//! declaration block and the root element's attribute order.

use crate::error::{CompilerError, Result};
use crate::types::SECTION_ENTITIES;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Entities every markup reader knows without a declaration
const PREDEFINED_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&([A-Za-z_][A-Za-z0-9_.:-]*);").unwrap())
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:-]*$").unwrap())
}

/// Check that a macro name can be declared and referenced
pub fn is_valid_macro_name(name: &str) -> bool {
    name_regex().is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub raw_value: String,
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: Vec<Macro>,
    index: HashMap<String, usize>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from declaration pairs, last write winning for duplicates
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::new();
        for (name, value) in pairs {
            table.insert(name, value)?;
        }
        Ok(table)
    }

    /// Insert or overwrite a macro; an overwrite keeps the original position
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let raw_value = value.into();

        if !is_valid_macro_name(&name) {
            return Err(CompilerError::invalid_shape(
                SECTION_ENTITIES,
                format!("'{}' is not a valid macro name", name),
            ));
        }

        if let Some(&position) = self.index.get(&name) {
            log::debug!("Macro '{}' redefined", name);
            self.macros[position].raw_value = raw_value;
        } else {
            self.index.insert(name.clone(), self.macros.len());
            self.macros.push(Macro { name, raw_value });
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.index.get(name).map(|&position| &self.macros[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.macros.iter()
    }

    /// Declared names in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.macros.iter().map(|m| m.name.as_str()).collect()
    }

    /// Length of the longest macro name, used for declaration alignment
    pub fn longest_name(&self) -> usize {
        self.macros.iter().map(|m| m.name.len()).max().unwrap_or(0)
    }

    /// Fully resolve a macro's value
    pub fn resolve(&self, name: &str) -> Result<String> {
        let mut cache = HashMap::new();
        self.resolve_cached(name, &mut Vec::new(), &mut cache)
    }

    /// Substitute every known reference inside arbitrary text
    pub fn resolve_text(&self, text: &str) -> Result<String> {
        let mut cache = HashMap::new();
        self.substitute(text, "<text>", &mut Vec::new(), &mut cache)
    }

    /// Resolve every macro, failing on the first undefined or circular reference
    pub fn validate(&self) -> Result<()> {
        let mut cache = HashMap::new();
        for entry in &self.macros {
            self.resolve_cached(&entry.name, &mut Vec::new(), &mut cache)?;
        }
        Ok(())
    }

    fn resolve_cached(
        &self,
        name: &str,
        chain: &mut Vec<String>,
        cache: &mut HashMap<String, String>,
    ) -> Result<String> {
        if let Some(value) = cache.get(name) {
            return Ok(value.clone());
        }

        if chain.iter().any(|visited| visited == name) {
            let mut path = chain.clone();
            path.push(name.to_string());
            return Err(CompilerError::CircularReference {
                name: name.to_string(),
                chain: path.join(" -> "),
            });
        }

        let raw_value = match self.get(name) {
            Some(entry) => entry.raw_value.clone(),
            None => {
                return Err(CompilerError::UnresolvedReference {
                    name: chain.last().cloned().unwrap_or_default(),
                    reference: name.to_string(),
                })
            }
        };

        chain.push(name.to_string());
        let value = self.substitute(&raw_value, name, chain, cache)?;
        chain.pop();

        cache.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn substitute(
        &self,
        text: &str,
        owner: &str,
        chain: &mut Vec<String>,
        cache: &mut HashMap<String, String>,
    ) -> Result<String> {
        let mut result = String::with_capacity(text.len());
        let mut last_end = 0;

        for captures in reference_regex().captures_iter(text) {
            let whole = captures.get(0).unwrap();
            let reference = &captures[1];

            result.push_str(&text[last_end..whole.start()]);
            last_end = whole.end();

            if self.contains(reference) {
                result.push_str(&self.resolve_cached(reference, chain, cache)?);
            } else if PREDEFINED_ENTITIES.contains(&reference) {
                result.push_str(whole.as_str());
            } else {
                return Err(CompilerError::UnresolvedReference {
                    name: owner.to_string(),
                    reference: reference.to_string(),
                });
            }
        }

        result.push_str(&text[last_end..]);
        Ok(result)
    }
}
