//! Test harness helpers.

use tracing_subscriber::EnvFilter;

/// Set up test logging with the given filter.
///
/// Output goes through the test writer, so it is only shown for failing
/// tests. Safe to call from every test; only the first call installs a
/// subscriber.
///
/// # Example
///
/// ```rust,ignore
/// use courier_test::init_test_tracing;
///
/// #[tokio::test]
/// async fn my_test() {
///     init_test_tracing("courier_events=trace");
///     // ... test code
/// }
/// ```
pub fn init_test_tracing(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with the default filter (debug for courier crates,
/// warn for everything else).
pub fn init_test_tracing_default() {
    init_test_tracing("warn,courier_events=debug");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_tracing_default();
        init_test_tracing("trace");
        tracing::debug!("still fine");
    }
}
