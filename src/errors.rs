//! The `errors` module defines the common error types.

use std::error;
use std::fmt;

use super::Result;

/// `Error` provides an enumeration of all possible errors reported by retort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An argument violated the contract of the called operation, e.g. a
    /// zero-length buffer where samples are required or a zero coefficient
    /// shift for the integer predictor.
    InvalidArgument(&'static str),
    /// The requested prediction order exceeds the `max_order` the calculator
    /// was constructed with.
    ExceedMaxOrder,
    /// The input block is longer than the `max_num_samples` the calculator
    /// was constructed with.
    ExceedMaxNumSamples,
    /// A numerical failure escaped the estimator's internal fallbacks.
    FailedToCalculate(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidArgument(ref msg) => write!(f, "Invalid argument: {}", msg),
            Error::ExceedMaxOrder => write!(f, "Requested order exceeds calculator maximum"),
            Error::ExceedMaxNumSamples => {
                write!(f, "Input block exceeds calculator maximum sample count")
            }
            Error::FailedToCalculate(ref msg) => write!(f, "Calculation failed: {}", msg),
        }
    }
}

impl error::Error for Error {}

/// function to create an invalid argument error.
pub fn invalid_argument_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidArgument(desc))
}

/// function to create an exceeded max order error.
pub fn exceed_max_order_error<T>() -> Result<T> {
    Err(Error::ExceedMaxOrder)
}

/// function to create an exceeded max samples error.
pub fn exceed_max_num_samples_error<T>() -> Result<T> {
    Err(Error::ExceedMaxNumSamples)
}

/// function to create a failed calculation error.
pub fn failed_to_calculate_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::FailedToCalculate(desc))
}
