//! Character-level input reading for grammar lex functions.
//!
//! The `Lexer` walks a byte buffer, decodes UTF-8, and keeps track of:
//! - the row/column of the current position
//! - the included ranges (bytes outside of them are invisible to the grammar)
//! - where the current token started and ended
//!
//! Lex functions only see the small public surface (`lookahead`, `advance`,
//! `mark_end`, `accept_token`, ...). The parser drives the rest.

use std::fmt;

use crate::{LogType, Logger, Point, Range};

use super::language::Symbol;
use super::length::Length;
use super::unicode::utf8_next;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BYTE_ORDER_MARK: char = '\u{FEFF}';

pub const DEFAULT_RANGE: Range = Range {
    start_byte: 0,
    end_byte: u32::MAX,
    start_point: Point { row: 0, column: 0 },
    end_point: Point {
        row: u32::MAX,
        column: u32::MAX,
    },
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

pub struct Lexer<'a> {
    input: &'a [u8],
    included_ranges: &'a [Range],
    logger: Option<&'a mut Logger>,

    current_position: Length,
    token_start_position: Length,
    token_end_position: Option<Length>,
    current_included_range_index: usize,

    lookahead: char,
    lookahead_size: u32,
    decode_error: bool,

    /// The symbol recognized by the last call to the lex function.
    pub result_symbol: Symbol,
}

/// Checks that ranges are ordered and non-overlapping. On failure returns
/// the index of the first offending range.
pub fn validate_included_ranges(ranges: &[Range]) -> Result<(), usize> {
    let mut previous_byte = 0;
    for (i, range) in ranges.iter().enumerate() {
        if range.start_byte < previous_byte || range.end_byte < range.start_byte {
            return Err(i);
        }
        previous_byte = range.end_byte;
    }
    Ok(())
}

// ===========================================================================
// Lex function API
// ===========================================================================

impl Lexer<'_> {
    /// The next character, or `'\0'` at the end of the input.
    #[inline]
    pub fn lookahead(&self) -> char {
        self.lookahead
    }

    /// Move past the lookahead character. Skipped characters become part of
    /// the token's padding instead of its content.
    pub fn advance(&mut self, skip: bool) {
        if self.eof() {
            return;
        }

        if self.logger.is_some() {
            let character = self.lookahead;
            let verb = if skip { "skip" } else { "consume" };
            if (' '..'\u{7f}').contains(&character) {
                self.log(format_args!("{verb} character:'{character}'"));
            } else {
                self.log(format_args!("{verb} character:{}", u32::from(character)));
            }
        }

        self.do_advance(skip);
    }

    /// Mark the current position as the end of the token being scanned.
    pub fn mark_end(&mut self) {
        if !self.eof() && self.current_included_range_index > 0 {
            // At the very start of an included range the token ends at the end
            // of the previous range instead.
            let current_range = &self.included_ranges[self.current_included_range_index];
            if self.current_position.bytes == current_range.start_byte {
                let previous_range = &self.included_ranges[self.current_included_range_index - 1];
                self.token_end_position =
                    Some(Length::new(previous_range.end_byte, previous_range.end_point));
                return;
            }
        }
        self.token_end_position = Some(self.current_position);
    }

    /// Record `symbol` as the scanned token, ending at the current position.
    #[inline]
    pub fn accept_token(&mut self, symbol: Symbol) -> bool {
        self.result_symbol = symbol;
        self.mark_end();
        true
    }

    #[inline]
    pub fn eof(&self) -> bool {
        self.current_included_range_index >= self.included_ranges.len()
    }

    /// The column of the current position, counted in characters.
    pub fn get_column(&self) -> u32 {
        let end = self.current_position.bytes as usize;
        let start = end.saturating_sub(self.current_position.extent.column as usize);
        self.input
            .get(start..end.min(self.input.len()))
            .map_or(0, |line| line.iter().filter(|b| (**b & 0xC0) != 0x80).count() as u32)
    }

    /// Whether the lexer sits at the first byte of a disjoint included range.
    pub fn is_at_included_range_start(&self) -> bool {
        self.included_ranges
            .get(self.current_included_range_index)
            .is_some_and(|range| self.current_position.bytes == range.start_byte)
    }
}

// ===========================================================================
// Parser-facing API
// ===========================================================================

impl<'a> Lexer<'a> {
    pub fn new(input: &'a [u8], included_ranges: &'a [Range], logger: Option<&'a mut Logger>) -> Self {
        debug_assert!(!included_ranges.is_empty());
        let mut lexer = Self {
            input,
            included_ranges,
            logger,
            current_position: Length::default(),
            token_start_position: Length::default(),
            token_end_position: None,
            current_included_range_index: 0,
            lookahead: '\0',
            lookahead_size: 0,
            decode_error: false,
            result_symbol: 0,
        };
        lexer.goto(Length::default());
        lexer
    }

    #[inline]
    pub fn current_position(&self) -> Length {
        self.current_position
    }

    #[inline]
    pub fn token_start_position(&self) -> Length {
        self.token_start_position
    }

    #[inline]
    pub fn token_end_position(&self) -> Length {
        self.token_end_position.unwrap_or(self.current_position)
    }

    pub fn log(&mut self, args: fmt::Arguments<'_>) {
        self.log_with_type(LogType::Lex, args);
    }

    pub fn log_with_type(&mut self, log_type: LogType, args: fmt::Arguments<'_>) {
        if let Some(logger) = self.logger.as_mut() {
            logger(log_type, &args.to_string());
        }
    }

    #[inline]
    pub fn has_logger(&self) -> bool {
        self.logger.is_some()
    }

    /// Move to `position` (no-op if already there).
    pub fn reset(&mut self, position: Length) {
        if position.bytes != self.current_position.bytes {
            self.goto(position);
        }
    }

    /// Prepare to scan a new token at the current position.
    pub fn start(&mut self) {
        self.token_start_position = self.current_position;
        self.token_end_position = None;
        self.result_symbol = 0;
        if !self.eof() {
            if self.lookahead_size == 0 {
                self.get_lookahead();
            }
            if self.current_position.bytes == 0 && self.lookahead == BYTE_ORDER_MARK {
                self.do_advance(true);
            }
        }
    }

    /// Finish the current token. Returns the end of the bytes the scan looked
    /// at, which becomes the token's lookahead extent.
    pub fn finish(&mut self) -> u32 {
        if self.token_end_position.is_none() {
            self.mark_end();
        }
        let token_end_position = self.token_end_position();

        // A token that ended at an included range boundary had its end moved
        // back to the previous range.
        if token_end_position.bytes < self.token_start_position.bytes {
            self.token_start_position = token_end_position;
        }

        let mut lookahead_end_byte = self.current_position.bytes.saturating_add(1);
        if self.decode_error {
            lookahead_end_byte = lookahead_end_byte.saturating_add(4);
        }
        lookahead_end_byte
    }

    /// Advance to the end of the input without logging, and return the final
    /// position.
    pub fn skip_to_end(&mut self) -> Length {
        if self.lookahead_size == 0 && !self.eof() {
            self.get_lookahead();
        }
        while !self.eof() {
            self.do_advance(false);
        }
        self.current_position
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn get_lookahead(&mut self) {
        let (size, character) = utf8_next(self.input, self.current_position.bytes as usize);
        if let Some(character) = character {
            self.lookahead = character;
            self.lookahead_size = size;
            self.decode_error = character == char::REPLACEMENT_CHARACTER && size == 1;
        } else {
            self.current_included_range_index = self.included_ranges.len();
            self.lookahead = '\0';
            self.lookahead_size = 1;
            self.decode_error = false;
        }
    }

    fn goto(&mut self, position: Length) {
        self.current_position = position;

        // Move to the first valid position at or after the given position.
        let found = self
            .included_ranges
            .iter()
            .position(|range| range.end_byte > position.bytes && range.end_byte > range.start_byte);

        if let Some(index) = found {
            let range = &self.included_ranges[index];
            if range.start_byte >= position.bytes {
                self.current_position = Length::new(range.start_byte, range.start_point);
            }
            self.current_included_range_index = index;
            self.lookahead_size = 0;
            self.lookahead = '\0';
        } else {
            // Past every included range: move to the EOF state.
            self.current_included_range_index = self.included_ranges.len();
            if let Some(last) = self.included_ranges.last() {
                self.current_position = Length::new(last.end_byte, last.end_point);
            }
            self.lookahead_size = 1;
            self.lookahead = '\0';
        }
    }

    fn do_advance(&mut self, skip: bool) {
        if self.lookahead_size != 0 {
            if self.lookahead == '\n' {
                self.current_position.extent.row += 1;
                self.current_position.extent.column = 0;
            } else {
                self.current_position.extent.column += self.lookahead_size;
            }
            self.current_position.bytes += self.lookahead_size;
        }

        let mut in_range = false;
        while let Some(range) = self.included_ranges.get(self.current_included_range_index) {
            if self.current_position.bytes < range.end_byte && range.end_byte != range.start_byte {
                in_range = true;
                break;
            }
            self.current_included_range_index += 1;
            if let Some(next) = self.included_ranges.get(self.current_included_range_index) {
                self.current_position = Length::new(next.start_byte, next.start_point);
            }
        }

        if skip {
            self.token_start_position = self.current_position;
        }

        if in_range {
            self.get_lookahead();
        } else {
            self.lookahead = '\0';
            self.lookahead_size = 1;
            self.decode_error = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::point::point_new;

    fn range(start: u32, end: u32, start_point: Point, end_point: Point) -> Range {
        Range {
            start_byte: start,
            end_byte: end,
            start_point,
            end_point,
        }
    }

    #[test]
    fn tracks_rows_and_columns() {
        let ranges = [DEFAULT_RANGE];
        let mut lexer = Lexer::new(b"ab\ncd", &ranges, None);
        lexer.start();
        for _ in 0..4 {
            lexer.advance(false);
        }
        assert_eq!(lexer.lookahead(), 'd');
        assert_eq!(lexer.current_position(), Length::new(4, point_new(1, 1)));
        lexer.advance(false);
        assert!(lexer.eof());
        assert_eq!(lexer.lookahead(), '\0');
    }

    #[test]
    fn columns_count_characters() {
        let ranges = [DEFAULT_RANGE];
        let mut lexer = Lexer::new("x\n\u{e9}\u{e9}".as_bytes(), &ranges, None);
        lexer.start();
        for _ in 0..4 {
            lexer.advance(false);
        }
        assert!(lexer.eof());
        assert_eq!(lexer.current_position().extent, point_new(1, 4));
        assert_eq!(lexer.get_column(), 2);
    }

    #[test]
    fn skips_bytes_between_included_ranges() {
        let ranges = [
            range(0, 2, point_new(0, 0), point_new(0, 2)),
            range(5, 7, point_new(0, 5), point_new(0, 7)),
        ];
        let mut lexer = Lexer::new(b"ab---cd---", &ranges, None);
        lexer.start();
        lexer.advance(false);
        lexer.advance(false);
        assert_eq!(lexer.lookahead(), 'c');
        assert!(lexer.is_at_included_range_start());
        lexer.mark_end();
        assert_eq!(lexer.token_end_position().bytes, 2);
        lexer.advance(false);
        lexer.advance(false);
        assert!(lexer.eof());
    }

    #[test]
    fn skipped_characters_move_the_token_start() {
        let ranges = [DEFAULT_RANGE];
        let mut lexer = Lexer::new(b"  x", &ranges, None);
        lexer.start();
        lexer.advance(true);
        lexer.advance(true);
        lexer.advance(false);
        assert!(lexer.accept_token(1));
        assert_eq!(lexer.finish(), 4);
        assert_eq!(lexer.token_start_position().bytes, 2);
        assert_eq!(lexer.token_end_position().bytes, 3);
    }

    #[test]
    fn rejects_overlapping_ranges() {
        let ranges = [
            range(0, 5, point_new(0, 0), point_new(0, 5)),
            range(3, 7, point_new(0, 3), point_new(0, 7)),
        ];
        assert_eq!(validate_included_ranges(&ranges), Err(1));
        assert_eq!(validate_included_ranges(&ranges[..1]), Ok(()));
    }

    #[test]
    fn logs_consumed_characters() {
        let ranges = [DEFAULT_RANGE];
        let messages = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = messages.clone();
        let mut logger: Logger = Box::new(move |_, message: &str| sink.lock().push(message.to_owned()));
        let mut lexer = Lexer::new(b" 1", &ranges, Some(&mut logger));
        lexer.start();
        lexer.advance(true);
        lexer.advance(false);
        assert_eq!(
            *messages.lock(),
            ["skip character:' '", "consume character:'1'"]
        );
    }
}
