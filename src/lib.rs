pub mod ai;
pub mod ast;
pub mod env;
pub mod eval;
pub mod format;
pub mod host;
pub mod lexer;
pub mod ml;
pub mod parser;
pub mod server;
pub mod stdlib;
pub mod token;
pub mod value;

#[cfg(test)]
mod eval_tests;

use thiserror::Error;

/// Chapeau des trois familles d'erreurs du langage. Les signaux de transfert
/// de contrôle internes (retour de fonction, arrêt de programme) n'en font
/// pas partie.
#[derive(Debug, Error)]
pub enum FiaError {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Runtime(#[from] eval::RuntimeError),
}

pub use crate::{eval::Interpreter, host::Host, parser::Parser};
