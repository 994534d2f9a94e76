use thiserror::Error;

use crate::analysis::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// None of these are runtime failures of the optimized program: they describe
/// malformed input IR, internal invariant violations that make the compiler
/// fall back to the unoptimized method, and failed checker assertions.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Structurally invalid SSA
/// - [`Error::UnknownMethod`] - A token that names no method of the unit
///
/// ## Pass Errors
/// - [`Error::LseInvariant`] - Load/store elimination broke an internal invariant
/// - [`Error::PassFailed`] - Any other pass failure
///
/// ## Harness Errors
/// - [`Error::CheckFailed`] - A checker directive did not hold
/// - [`Error::Interpreter`] - The reference interpreter could not execute the IR
///
/// # Examples
///
/// ```rust
/// use lsekit::{Error, analysis::SsaFunction};
///
/// let ssa = SsaFunction::new(0);
/// match ssa.validate() {
///     Ok(()) => println!("well-formed"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("malformed: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The SSA form is structurally invalid.
    ///
    /// Carries the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Load/store elimination detected an internal invariant violation.
    ///
    /// The method is left exactly as it was before the pass ran.
    #[error("Load/store elimination aborted on {method}: {message}")]
    LseInvariant {
        /// The method being optimized
        method: Token,
        /// Description of the violated invariant
        message: String,
    },

    /// A pass other than load/store elimination failed.
    #[error("Pass '{pass}' failed: {message}")]
    PassFailed {
        /// The failing pass
        pass: &'static str,
        /// Failure description
        message: String,
    },

    /// A method token does not resolve in the compilation unit.
    #[error("Unknown method {0}")]
    UnknownMethod(Token),

    /// A checker directive did not hold for the rendered IR.
    #[error("Check failed for '{method}' at '{phase}': {message}\n{rendered}")]
    CheckFailed {
        /// Method name
        method: String,
        /// Phase name, e.g. `load_store_elimination (after)`
        phase: String,
        /// The directive that failed
        message: String,
        /// The rendered instruction list the directive was matched against
        rendered: String,
    },

    /// The reference interpreter could not execute the IR.
    #[error("Interpreter error: {0}")]
    Interpreter(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
