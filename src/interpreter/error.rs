use thiserror::Error;

use crate::object::Object;

/// The evaluator's single unwind channel.
///
/// `Error` is a genuine runtime failure and propagates to the driver.
/// `Return` is control flow: it unwinds block frames until the nearest user
/// function call frame consumes it, and must never reach the driver.
#[derive(Debug, PartialEq, Error)]
pub enum Interrupt {
    #[error("{msg}\n[line {line}]")]
    Error { line: u32, msg: String },

    #[error("unexpected 'return' outside of a function")]
    Return { value: Object },
}

impl Interrupt {
    pub fn error(line: u32, msg: impl AsRef<str>) -> Self {
        Self::Error { line, msg: msg.as_ref().to_owned() }
    }
}
