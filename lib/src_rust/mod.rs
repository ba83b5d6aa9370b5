// The parsing engine behind the public API in `binding_rust`.
//
// Modules are listed bottom-up: each one only depends on those above it.

// Leaf utilities
pub mod error_costs;
pub mod length;
pub mod point;
pub mod unicode;

// Core data structure
pub mod subtree;

// Grammar-facing pieces
pub mod language;
pub mod lexer;

// Parsing
pub mod parser;
pub mod reusable_node;

// Tree navigation
pub mod get_changed_ranges;
pub mod node;
pub mod tree;
pub mod tree_cursor;

// Queries
pub mod query;
