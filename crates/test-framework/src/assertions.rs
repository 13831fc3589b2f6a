//! Assertions that report failures as values instead of panicking.
//!
//! Every assertion returns an [`AssertionResult`] so test bodies can use `?`
//! and the runner can tell a failed check from a broken environment:
//!
//! ```ignore
//! assert_equal(node.get_block_count().await?, 10).context("after mining")?;
//! ```

use std::fmt::{self, Debug, Display};

use intcoin_rpc_client::Error as RpcError;

/// Result of an assertion.
pub type AssertionResult<T = ()> = Result<T, AssertionError>;

/// A failed assertion with a message naming the actual and expected values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionError {
    message: String,
    context: Option<String>,
}

impl AssertionError {
    /// Creates an assertion error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
        }
    }

    /// The failure message without context.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The context attached to the failure, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Attaches a context message, replacing any previous one.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{context}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for AssertionError {}

/// Adds context to a failed assertion.
pub trait Context<T> {
    /// Attaches `context` to the error, if there is one.
    ///
    /// # Errors
    ///
    /// Returns the original assertion error with context attached.
    fn context(self, context: impl Into<String>) -> AssertionResult<T>;
}

impl<T> Context<T> for AssertionResult<T> {
    fn context(self, context: impl Into<String>) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}

/// Checks `actual == expected`.
///
/// # Errors
///
/// Returns an [`AssertionError`] showing both values.
pub fn assert_equal<A, E>(actual: A, expected: E) -> AssertionResult
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "expected {expected:?}, got {actual:?}"
        )))
    }
}

/// Checks `actual != unexpected`.
///
/// # Errors
///
/// Returns an [`AssertionError`] showing the value.
pub fn assert_not_equal<A, E>(actual: A, unexpected: E) -> AssertionResult
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual == unexpected {
        Err(AssertionError::new(format!(
            "expected a value other than {unexpected:?}, got {actual:?}"
        )))
    } else {
        Ok(())
    }
}

/// Checks `actual > threshold`.
///
/// # Errors
///
/// Returns an [`AssertionError`] showing both values.
pub fn assert_greater_than<T>(actual: T, threshold: T) -> AssertionResult
where
    T: PartialOrd + Debug,
{
    if actual > threshold {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "expected a value greater than {threshold:?}, got {actual:?}"
        )))
    }
}

/// Checks `actual >= threshold`.
///
/// # Errors
///
/// Returns an [`AssertionError`] showing both values.
pub fn assert_greater_or_equal<T>(actual: T, threshold: T) -> AssertionResult
where
    T: PartialOrd + Debug,
{
    if actual >= threshold {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "expected a value of at least {threshold:?}, got {actual:?}"
        )))
    }
}

/// Checks that `result` is an error of any kind and returns it.
///
/// # Errors
///
/// Returns an [`AssertionError`] showing the unexpected success value.
pub fn assert_raises<T, E>(result: Result<T, E>) -> AssertionResult<E>
where
    T: Debug,
{
    match result {
        Ok(value) => Err(AssertionError::new(format!(
            "expected an error, got success: {value:?}"
        ))),
        Err(e) => Ok(e),
    }
}

/// Checks that `result` is an RPC error with `code` whose message contains
/// `message_substring`, ignoring case.
///
/// # Errors
///
/// Returns an [`AssertionError`] distinguishing success, a non-RPC failure,
/// a wrong code, and a message without the substring.
pub fn assert_raises_rpc_error<T>(
    result: Result<T, RpcError>,
    code: i64,
    message_substring: &str,
) -> AssertionResult
where
    T: Debug,
{
    let error = match result {
        Ok(value) => {
            return Err(AssertionError::new(format!(
                "expected RPC error {code}, got success: {value:?}"
            )));
        }
        Err(e) => e,
    };

    let RpcError::Rpc {
        code: actual_code,
        message,
    } = &error
    else {
        return Err(AssertionError::new(format!(
            "expected RPC error {code}, got non-RPC error: {error}"
        )));
    };

    if *actual_code != code {
        return Err(AssertionError::new(format!(
            "expected RPC error {code}, got {actual_code} ({message})"
        )));
    }

    if !message
        .to_lowercase()
        .contains(&message_substring.to_lowercase())
    {
        return Err(AssertionError::new(format!(
            "expected RPC error message containing {message_substring:?}, got {message:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc_error(code: i64, message: &str) -> Result<String, RpcError> {
        Err(RpcError::Rpc {
            code,
            message: message.to_string(),
        })
    }

    #[test]
    fn test_assert_equal() {
        assert!(assert_equal(10u64, 10u64).is_ok());

        let error = assert_equal(9u64, 10u64).unwrap_err();
        assert_eq!(error.to_string(), "expected 10, got 9");
    }

    #[test]
    fn test_assert_equal_across_types() {
        assert!(assert_equal("regtest".to_string(), "regtest").is_ok());
        assert!(assert_equal(vec![1, 2], [1, 2]).is_ok());
    }

    #[test]
    fn test_context_prefixes_message() {
        let error = assert_equal(1, 2).context("height after sync").unwrap_err();

        assert_eq!(error.context(), Some("height after sync"));
        assert_eq!(error.to_string(), "height after sync: expected 2, got 1");
    }

    #[test]
    fn test_assert_not_equal() {
        assert!(assert_not_equal("a", "b").is_ok());
        assert!(assert_not_equal(3, 3).is_err());
    }

    #[test]
    fn test_ordering_assertions() {
        assert!(assert_greater_than(2.5, 0.0).is_ok());
        assert!(assert_greater_than(0.0, 0.0).is_err());
        assert!(assert_greater_or_equal(5, 5).is_ok());

        let error = assert_greater_or_equal(4, 5).unwrap_err();
        assert_eq!(error.message(), "expected a value of at least 5, got 4");
    }

    #[test]
    fn test_assert_raises_returns_error() {
        let result: Result<u8, &str> = Err("boom");

        assert_eq!(assert_raises(result).unwrap(), "boom");
        assert!(assert_raises(Ok::<u8, &str>(1)).is_err());
    }

    #[test]
    fn test_rpc_error_matches_code_and_substring() {
        let result = rpc_error(-6, "Insufficient funds");

        assert!(assert_raises_rpc_error(result, -6, "insufficient funds").is_ok());
    }

    #[test]
    fn test_rpc_error_mismatches_are_distinguished() {
        let success = assert_raises_rpc_error(Ok::<_, RpcError>(1), -6, "").unwrap_err();
        assert!(success.message().contains("got success"));

        let non_rpc = assert_raises_rpc_error(
            Err::<u8, _>(RpcError::MalformedResponse("<html>".to_string())),
            -6,
            "",
        )
        .unwrap_err();
        assert!(non_rpc.message().contains("non-RPC error"));

        let wrong_code =
            assert_raises_rpc_error(rpc_error(-8, "Invalid parameter"), -6, "").unwrap_err();
        assert!(wrong_code.message().contains("got -8"));

        let wrong_message =
            assert_raises_rpc_error(rpc_error(-6, "Wallet locked"), -6, "funds").unwrap_err();
        assert!(wrong_message.message().contains("containing \"funds\""));
    }
}
