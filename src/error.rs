use thiserror::Error;

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

macro_rules! invariant_error {
    ($msg:expr) => {
        crate::Error::InvariantViolation {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvariantViolation {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Note that an enum being *ineligible* for unboxing is never an error: ineligibility is
/// recorded as a [`crate::enums::Reason`] and only removes that enum from the candidate set.
/// The variants below cover the situations in which compilation has to stop.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - A method body or program structure is not well formed
///
/// ## Internal Errors
/// - [`Error::InvariantViolation`] - The optimizer reached a state its own analysis ruled out
///
/// ## Configuration Errors
/// - [`Error::EnumsNotUnboxed`] - Enums the user required to be unboxed survived the analysis
///
/// # Examples
///
/// ```rust,ignore
/// use enumbox::{Error, prelude::*};
///
/// match unbox_program(&mut app, &ctx, config) {
///     Ok(summary) => println!("unboxed {} enums", summary.unboxed.len()),
///     Err(Error::EnumsNotUnboxed { classes }) => {
///         eprintln!("required enums were kept: {}", classes.join(", "));
///     }
///     Err(e) => eprintln!("enum unboxing failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A method body or program structure is not well formed.
    ///
    /// Raised when an SSA function violates its own invariants (a value used
    /// without a definition, a branch to a missing block, a phi naming a block
    /// that is not a predecessor) or when the class graph is inconsistent.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The optimizer reached a state that its own analysis ruled out.
    ///
    /// Examples are an unboxed enum whose class initializer constructs an
    /// instance with a non-constant ordinal, or a moved method whose body went
    /// missing. These are fatal and abort the compilation: silently skipping
    /// them would leave references to a deleted class behind.
    #[error("Invariant violation - {file}:{line}: {message}")]
    InvariantViolation {
        /// Description of the violated invariant
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Enums the configuration requires to be unboxed were not unboxed.
    ///
    /// Raised once, after the enum data has been finalized, listing every
    /// offending class by canonical name in sorted order.
    #[error("Enum unboxing failed for the required classes: {}", classes.join(", "))]
    EnumsNotUnboxed {
        /// Canonical names of the enums that survived
        classes: Vec<String>,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
