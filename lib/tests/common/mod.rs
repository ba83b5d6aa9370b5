#![allow(dead_code)]

use sitter::grammars::arithmetic;
use sitter::{InputEdit, Parser, Point, Tree};

pub fn parser() -> Parser {
    let mut parser = Parser::new();
    parser
        .set_language(&arithmetic::language())
        .expect("arithmetic grammar is compatible");
    parser
}

pub fn parse(text: &str) -> Tree {
    parser().parse(text, None)
}

/// An edit on a single-line document.
pub fn line_edit(start: u32, old_end: u32, new_end: u32) -> InputEdit {
    InputEdit {
        start_byte: start,
        old_end_byte: old_end,
        new_end_byte: new_end,
        start_position: Point::new(0, start),
        old_end_position: Point::new(0, old_end),
        new_end_position: Point::new(0, new_end),
    }
}
