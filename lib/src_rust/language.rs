//! Language metadata: the static tables a grammar hands to the engine.
//!
//! A grammar is a `&'static LanguageDefinition`. It carries:
//! - symbol names and visibility metadata, indexed by symbol id
//! - field names (id 0 is reserved for "no field")
//! - the node-type table used to validate query structure
//! - the lex and parse entry points driven by the parser

use std::fmt;

use super::lexer::Lexer;
use super::parser::ParseContext;

pub type Symbol = u16;
pub type FieldId = u16;
pub type StateId = u16;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// The ABI version produced by grammars written against this crate.
pub const LANGUAGE_VERSION: u32 = 15;
/// The oldest grammar ABI the parser still accepts.
pub const MIN_COMPATIBLE_LANGUAGE_VERSION: u32 = 13;

pub const BUILTIN_SYM_END: Symbol = 0;
pub const BUILTIN_SYM_ERROR: Symbol = u16::MAX;

/// Subtrees tagged with this state are never reused.
pub const STATE_NONE: StateId = 0;

const ERROR_METADATA: SymbolMetadata = SymbolMetadata {
    visible: true,
    named: true,
};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub visible: bool,
    pub named: bool,
}

impl SymbolMetadata {
    pub const REGULAR: Self = Self {
        visible: true,
        named: true,
    };
    pub const ANONYMOUS: Self = Self {
        visible: true,
        named: false,
    };
    pub const AUXILIARY: Self = Self {
        visible: false,
        named: true,
    };
}

/// Which children a node of `symbol` can have. `fields` pairs each field
/// with the symbols allowed in it; `children` lists symbols that may appear
/// without a field.
#[derive(Debug)]
pub struct NodeTypeInfo {
    pub symbol: Symbol,
    pub fields: &'static [(FieldId, &'static [Symbol])],
    pub children: &'static [Symbol],
}

pub type LexFn = fn(&mut Lexer<'_>) -> bool;
pub type ParseFn = fn(&mut ParseContext<'_>);

pub struct LanguageDefinition {
    pub abi_version: u32,
    pub name: &'static str,
    pub symbol_names: &'static [&'static str],
    pub symbol_metadata: &'static [SymbolMetadata],
    pub field_names: &'static [&'static str],
    pub extras: &'static [Symbol],
    pub node_types: &'static [NodeTypeInfo],
    pub lex_fn: LexFn,
    pub parse_fn: ParseFn,
}

impl fmt::Debug for LanguageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageDefinition")
            .field("name", &self.name)
            .field("abi_version", &self.abi_version)
            .field("symbol_count", &self.symbol_count())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolType {
    Regular,
    Anonymous,
    Auxiliary,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Regular => "Regular",
            Self::Anonymous => "Anonymous",
            Self::Auxiliary => "Auxiliary",
        })
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

impl LanguageDefinition {
    #[inline]
    pub fn symbol_count(&self) -> u32 {
        self.symbol_names.len() as u32
    }

    #[inline]
    pub fn field_count(&self) -> u32 {
        self.field_names.len().saturating_sub(1) as u32
    }

    pub fn symbol_name(&self, symbol: Symbol) -> Option<&'static str> {
        if symbol == BUILTIN_SYM_ERROR {
            Some("ERROR")
        } else {
            self.symbol_names.get(usize::from(symbol)).copied()
        }
    }

    pub fn symbol_metadata(&self, symbol: Symbol) -> SymbolMetadata {
        if symbol == BUILTIN_SYM_ERROR {
            ERROR_METADATA
        } else {
            self.symbol_metadata
                .get(usize::from(symbol))
                .copied()
                .unwrap_or_default()
        }
    }

    /// Returns the visible symbol with this name and namedness, or 0.
    pub fn symbol_for_name(&self, name: &str, is_named: bool) -> Symbol {
        if is_named && name == "ERROR" {
            return BUILTIN_SYM_ERROR;
        }
        for (i, symbol_name) in self.symbol_names.iter().enumerate() {
            let metadata = self.symbol_metadata(i as Symbol);
            if !metadata.visible || metadata.named != is_named {
                continue;
            }
            if *symbol_name == name {
                return i as Symbol;
            }
        }
        0
    }

    pub fn symbol_type(&self, symbol: Symbol) -> SymbolType {
        let metadata = self.symbol_metadata(symbol);
        if metadata.named && metadata.visible {
            SymbolType::Regular
        } else if metadata.visible {
            SymbolType::Anonymous
        } else {
            SymbolType::Auxiliary
        }
    }

    pub fn field_name_for_id(&self, id: FieldId) -> Option<&'static str> {
        if id == 0 {
            return None;
        }
        self.field_names.get(usize::from(id)).copied()
    }

    /// Returns the id of the named field, or 0.
    pub fn field_id_for_name(&self, name: &str) -> FieldId {
        self.field_names
            .iter()
            .skip(1)
            .position(|field| *field == name)
            .map_or(0, |i| (i + 1) as FieldId)
    }

    #[inline]
    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.extras.contains(&symbol)
    }

    pub fn node_type(&self, symbol: Symbol) -> Option<&'static NodeTypeInfo> {
        self.node_types.iter().find(|info| info.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammars::arithmetic;

    #[test]
    fn symbol_lookups_skip_hidden_symbols() {
        let language = &arithmetic::DEFINITION;
        assert_eq!(language.symbol_for_name("end", true), 0);
        assert_eq!(language.symbol_for_name("number", true), 4);
        assert_eq!(language.symbol_for_name("number", false), 0);
        assert_eq!(language.symbol_for_name("+", false), 3);
        assert_eq!(language.symbol_for_name("ERROR", true), BUILTIN_SYM_ERROR);
    }

    #[test]
    fn field_ids_start_at_one() {
        let language = &arithmetic::DEFINITION;
        assert_eq!(language.field_count(), 2);
        assert_eq!(language.field_id_for_name("left"), 1);
        assert_eq!(language.field_id_for_name("right"), 2);
        assert_eq!(language.field_id_for_name("middle"), 0);
        assert_eq!(language.field_name_for_id(0), None);
        assert_eq!(language.field_name_for_id(2), Some("right"));
    }
}
