//
// syntax/mod.rs
//
// Tokens, green/red trees and the layout-aware parser
//

pub mod ast;
pub mod incremental;
pub mod kind;
pub mod lexer;
pub mod parser;
pub mod tree;

pub use incremental::{reparse, ReuseStats, TextEdit};
pub use kind::SyntaxKind;
pub use parser::parse;
pub use tree::{NodeId, SyntaxNode, SyntaxTree, TextRange};
