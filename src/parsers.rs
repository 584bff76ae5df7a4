// Row parsing: the quoted-field tokenizer and the account assembler

mod assembler;
mod tokenizer;

pub use assembler::{assemble, is_inbound_header, ParseError, INBOUND_HEADER_PREFIX};
pub use tokenizer::{is_line_break, scrub, tokenize, DELIMITER, QUOTE};
