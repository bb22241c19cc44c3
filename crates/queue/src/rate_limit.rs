//! Provider send-rate policy.
//!
//! The policy is computed once at startup from the email configuration and
//! applied to the send lane's worker through [`RateLimitLayer`], so pacing is
//! per worker process, not global across a fleet.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use mailspool_common::EmailConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tower::{Layer, Service};

/// How many send-batch jobs a worker may start per window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Jobs allowed per window.
    pub max_jobs: u64,
    /// Window duration.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Pick the send rate for the configured provider.
    ///
    /// - Hosted API providers take sustained bulk traffic; 1.5 batches/s
    ///   (300 emails/s at the default batch size) stays well under their
    ///   ceilings.
    /// - Consumer SMTP relays (gmail-style) allow a few hundred emails per
    ///   day; the send lane crawls at roughly ten batches per day.
    /// - Anything else gets a conservative one batch per second.
    #[must_use]
    pub fn for_provider(email: &EmailConfig) -> Self {
        if email.api_key.is_some() {
            // 1.5 jobs/s expressed in whole numbers
            return Self {
                max_jobs: 3,
                window: Duration::from_secs(2),
            };
        }

        if email.smtp.host.contains("gmail") {
            return Self {
                max_jobs: 10,
                window: Duration::from_secs(86_400),
            };
        }

        Self {
            max_jobs: 1,
            window: Duration::from_secs(1),
        }
    }
}

struct WindowState {
    resets_at: Instant,
    used: u64,
}

/// Worker middleware that holds jobs until the current window has budget.
///
/// Cloned services share one window, so the budget applies to the whole
/// worker process regardless of concurrency. The service stays `Clone`,
/// which the worker runtime requires of its middleware stack.
#[derive(Clone)]
pub struct RateLimitLayer {
    config: RateLimitConfig,
    state: Arc<Mutex<WindowState>>,
}

impl RateLimitLayer {
    /// Build a layer enforcing the given send rate.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let state = Arc::new(Mutex::new(WindowState {
            resets_at: Instant::now(),
            used: 0,
        }));
        Self { config, state }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimited<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimited {
            inner,
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Clone)]
pub struct RateLimited<S> {
    inner: S,
    config: RateLimitConfig,
    state: Arc<Mutex<WindowState>>,
}

impl<S, Req> Service<Req> for RateLimited<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // Take the instance poll_ready reported ready; leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);

        Box::pin(async move {
            loop {
                let wait = {
                    let mut window = state.lock().await;
                    let now = Instant::now();
                    if now >= window.resets_at {
                        window.resets_at = now + config.window;
                        window.used = 0;
                    }
                    if window.used < config.max_jobs {
                        window.used += 1;
                        None
                    } else {
                        Some(window.resets_at - now)
                    }
                };
                match wait {
                    None => break,
                    Some(delay) => tokio::time::sleep(delay).await,
                }
            }

            inner.call(req).await
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailspool_common::SmtpConfig;

    fn config(api_key: Option<&str>, smtp_host: &str) -> EmailConfig {
        EmailConfig {
            from_address: "noreply@example.com".to_string(),
            from_name: String::new(),
            report_address: "ops@example.com".to_string(),
            api_key: api_key.map(String::from),
            smtp: SmtpConfig {
                host: smtp_host.to_string(),
                port: 587,
                username: None,
                password: None,
            },
        }
    }

    #[test]
    fn test_api_provider_rate() {
        let rate = RateLimitConfig::for_provider(&config(Some("sg-key"), "smtp.example.com"));
        assert_eq!(rate.max_jobs, 3);
        assert_eq!(rate.window, Duration::from_secs(2));
    }

    #[test]
    fn test_consumer_relay_crawls() {
        let rate = RateLimitConfig::for_provider(&config(None, "smtp.gmail.com"));
        assert_eq!(rate.max_jobs, 10);
        assert_eq!(rate.window, Duration::from_secs(86_400));
    }

    #[test]
    fn test_default_rate_is_conservative() {
        let rate = RateLimitConfig::for_provider(&config(None, "mail.internal.example"));
        assert_eq!(rate.max_jobs, 1);
        assert_eq!(rate.window, Duration::from_secs(1));
    }

    #[test]
    fn test_api_key_wins_over_relay_host() {
        // An API key makes the API the primary transport even if the
        // fallback relay is a consumer one.
        let rate = RateLimitConfig::for_provider(&config(Some("sg-key"), "smtp.gmail.com"));
        assert_eq!(rate.max_jobs, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_service_defers_calls_over_budget() {
        use tower::ServiceExt;

        let layer = RateLimitLayer::new(RateLimitConfig {
            max_jobs: 2,
            window: Duration::from_secs(2),
        });
        let mut service =
            layer.layer(tower::service_fn(|n: u32| async move {
                Ok::<u32, std::convert::Infallible>(n)
            }));

        let started = Instant::now();
        service.ready().await.unwrap().call(1).await.unwrap();
        service.ready().await.unwrap().call(2).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);

        // Third call must wait for the window to roll over.
        service.ready().await.unwrap().call(3).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_clones_share_one_budget() {
        use tower::ServiceExt;

        let layer = RateLimitLayer::new(RateLimitConfig {
            max_jobs: 1,
            window: Duration::from_secs(5),
        });
        let mut first = layer.layer(tower::service_fn(|n: u32| async move {
            Ok::<u32, std::convert::Infallible>(n)
        }));
        let mut second = first.clone();

        let started = Instant::now();
        first.ready().await.unwrap().call(1).await.unwrap();
        second.ready().await.unwrap().call(2).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
