use std::fmt;

use thiserror::Error;

/// Byte offset into the expression text where a syntax error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos(pub usize);

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalcError {
    #[error("syntax error at position {pos}: {message}")]
    Syntax { message: String, pos: Pos },

    #[error("{name} expects between {min} and {max} arguments, got {got}")]
    Arity {
        name: String,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("cannot resolve '{path}' against {host}")]
    Binding { path: String, host: String },

    #[error("circular reference: '{dependent}' already depends on '{target}'")]
    CircularReference { target: String, dependent: String },

    #[error("{0}")]
    Eval(String),

    #[error("statement '{name}' ({statement}): {source}")]
    Statement {
        name: String,
        /// Full text of the offending statement.
        statement: String,
        #[source]
        source: Box<CalcError>,
    },
}

impl CalcError {
    pub fn syntax(message: impl Into<String>, pos: usize) -> Self {
        CalcError::Syntax {
            message: message.into(),
            pos: Pos(pos),
        }
    }

    pub fn eval(message: impl Into<String>) -> Self {
        CalcError::Eval(message.into())
    }

    pub fn binding(path: impl Into<String>, host: impl Into<String>) -> Self {
        CalcError::Binding {
            path: path.into(),
            host: host.into(),
        }
    }

    /// Wraps an error with the statement name and text it came from, for
    /// batch loads.
    pub fn in_statement(self, name: &str, statement: &str) -> Self {
        CalcError::Statement {
            name: name.to_string(),
            statement: statement.to_string(),
            source: Box::new(self),
        }
    }
}

pub type CalcResult<T> = Result<T, CalcError>;
