//! Authentication events raised by the API client.

/// Capacity of the event channel. Slow listeners lose the oldest events.
pub const EVENT_CAPACITY: usize = 16;

/// Signals emitted by the client for the application to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// The backend answered 401; the user must log in again.
    Expired,
}
