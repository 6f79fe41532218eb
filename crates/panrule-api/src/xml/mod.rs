//! Generic XML tree used for both request elements and response bodies.

mod parser;
mod tree;
mod writer;

pub use parser::{ParseError, parse};
pub use tree::XmlNode;
pub use writer::{children_to_string, to_string};
