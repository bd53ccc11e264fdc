//! Bearer token lookup.

/// Supplies the bearer token for outgoing requests.
///
/// Consulted once per request, so a token changed by a login or logout is
/// picked up by the next call.
pub trait TokenSource: Send + Sync {
    /// Returns the current token, or `None` to send the request
    /// unauthenticated.
    fn token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Token source that never has a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenSource for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}
