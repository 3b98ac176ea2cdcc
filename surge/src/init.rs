//! One-time target initialization, run before the pre-test gate.
//!
//! The target is expected to reset itself to a known dataset when asked. A
//! failure here ends the benchmark before any check runs.

use std::future::Future;

use crate::error::BenchError;

/// Prepares the target for a run.
///
/// # Example
/// ```rust
/// use surge::{error::BenchError, init::Initializer};
///
/// struct AlwaysReady;
///
/// impl Initializer for AlwaysReady {
///     async fn initialize(&self) -> Result<(), BenchError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Initializer: Send + Sync {
    fn initialize(&self) -> impl Future<Output = Result<(), BenchError>> + Send;
}

/// Skips initialization entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInit;

impl Initializer for NoInit {
    async fn initialize(&self) -> Result<(), BenchError> {
        Ok(())
    }
}

#[cfg(feature = "http")]
pub use http::HttpInitializer;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::{Client, header};
    use typed_builder::TypedBuilder;

    use super::*;

    /// Sends `GET <base_url>/initialize` and requires a 2xx answer.
    #[derive(Debug, Clone, TypedBuilder)]
    pub struct HttpInitializer {
        /// e.g. `http://127.0.0.1:8080`
        #[builder(setter(into))]
        pub base_url: String,
        /// Value for the `Host` header when the target routes by virtual host.
        #[builder(default, setter(into, strip_option))]
        pub host: Option<String>,
        #[builder(default = concat!("surge/", env!("CARGO_PKG_VERSION")).to_string(), setter(into))]
        pub user_agent: String,
        #[builder(default = Duration::from_secs(10))]
        pub timeout: Duration,
        #[builder(default)]
        pub client: Client,
    }

    impl HttpInitializer {
        fn url(&self) -> String {
            format!("{}/initialize", self.base_url.trim_end_matches('/'))
        }
    }

    impl Initializer for HttpInitializer {
        async fn initialize(&self) -> Result<(), BenchError> {
            let fail = |reason: String| BenchError::Initialize { reason };

            let mut req = self
                .client
                .get(self.url())
                .timeout(self.timeout)
                .header(header::USER_AGENT, &self.user_agent);
            if let Some(host) = &self.host {
                req = req.header(header::HOST, host);
            }

            let res = req.send().await.map_err(|e| fail(e.to_string()))?;
            let status = res.status();
            // drain the body so the connection can be reused
            res.bytes().await.map_err(|e| fail(e.to_string()))?;

            if !status.is_success() {
                return Err(fail(format!("unexpected status code: {}", status.as_u16())));
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn url_joins_without_double_slash() {
            let init = HttpInitializer::builder()
                .base_url("http://127.0.0.1:8080/")
                .build();
            assert_eq!(init.url(), "http://127.0.0.1:8080/initialize");
        }

        #[tokio::test]
        async fn unreachable_target_is_an_initialize_error() {
            // port 9 (discard) is not expected to serve HTTP
            let init = HttpInitializer::builder()
                .base_url("http://127.0.0.1:9")
                .timeout(Duration::from_secs(2))
                .build();
            let err = init.initialize().await.unwrap_err();
            assert!(matches!(err, BenchError::Initialize { .. }));
        }
    }
}
