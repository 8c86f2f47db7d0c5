use crate::value::Value;

/// How a statement finished when it did not throw.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal(Value),
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

impl Completion {
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }
}

/// A thrown script value plus the call stack at the throw site, innermost first.
#[derive(Debug, Clone)]
pub struct Exception {
    pub value: Value,
    pub trace: Vec<String>,
}

#[derive(Debug)]
pub enum Interruption {
    /// Catchable by `try`/`catch`.
    Throw(Exception),
    /// Host-level failure; unwinds straight out of `interpret`.
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for Interruption {
    fn from(error: anyhow::Error) -> Self {
        Interruption::Fatal(error)
    }
}

pub type Eval<T> = Result<T, Interruption>;
