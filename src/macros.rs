#![allow(unused_macros)]

/// Aborts the analysis when a soundness invariant of the abstract domains is violated.
///
/// A violated invariant means the analysis itself became inconsistent, so no result
/// computed past this point could be trusted. This is not a recoverable [`crate::Error`].
///
/// ```rust, ignore
///  invariant!(self.width == other.width, "width mismatch: {} vs {}", self.width, other.width);
///  invariant!("cross-domain merge is not implemented");
/// ```
macro_rules! invariant {
    ($cond:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        if !$cond {
            panic!(
                "soundness invariant violated - {}:{}: {}",
                file!(),
                line!(),
                format!($fmt $(, $arg)*)
            );
        }
    };
    ($msg:expr) => {
        panic!("soundness invariant violated - {}:{}: {}", file!(), line!(), $msg)
    };
}
