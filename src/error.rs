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

/// The generic Error type, which provides coverage for all recoverable errors this library
/// can return.
///
/// Only conditions caused by the *input* end up here: a module that does not satisfy the
/// structural contract of [`crate::ir::Module`], a lookup by name that does not resolve, or a
/// type the abstract domains cannot model. Internal consistency faults of the analysis
/// (for example two pointer targets with different memory identities meeting at the same
/// place) are not errors; they abort the run through the `invariant!` macro because any
/// result produced afterwards would be unsound.
///
/// # Error Categories
///
/// ## Program Representation Errors
/// - [`Error::Malformed`] - The module violates a structural rule (missing terminator, bad branch target, ...)
/// - [`Error::InvalidWidth`] - An integer type or constant uses an unsupported bit width
/// - [`Error::UnsupportedType`] - A type that cannot be given an abstract value
///
/// ## Lookup Errors
/// - [`Error::FunctionNotFound`] - A function name did not resolve inside the module
///
/// # Examples
///
/// ```rust
/// use irscope::{Error, ir::ModuleBuilder, interpreter::{Interpreter, InterpreterConfig}};
///
/// let module = ModuleBuilder::new("empty").build()?;
/// let config = InterpreterConfig { entry: Some("main".into()), ..Default::default() };
/// match Interpreter::new(&module, config) {
///     Err(Error::FunctionNotFound(name)) => assert_eq!(name, "main"),
///     _ => unreachable!(),
/// }
/// # Ok::<(), irscope::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The program representation is structurally invalid.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
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

    /// An integer bit width outside of the supported `1..=64` range.
    #[error("Unsupported integer width - {0}")]
    InvalidWidth(u32),

    /// The type has no abstract value representation.
    #[error("Unsupported type - {0}")]
    UnsupportedType(String),

    /// Failed to find a function by name.
    #[error("Failed to find function - {0}")]
    FunctionNotFound(String),
}
