mod client;
pub mod glyph;
mod parser;

pub use client::{KandilliFeed, decode_page};
pub use parser::{RowError, TableParse, parse_page, parse_row};
