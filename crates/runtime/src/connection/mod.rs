//! Correlation and subscription bookkeeping for one session.
//!
//! - [`PendingRequests`] maps a request id to the completion handle of the
//!   caller awaiting its `result` or `pong`.
//! - [`SubscriptionRegistry`] maps a subscription handle to the callback that
//!   receives its `event` frames, together with the descriptor needed to
//!   reissue the subscription after a reconnect. Handles stay fixed while the
//!   wire id of the stream changes from one connection to the next.
//!
//! # Message Flow
//!
//! 1. The session allocates an id and registers it here before writing
//! 2. The receive loop decodes inbound frames in arrival order
//! 3. `result` / `pong` frames settle the matching pending request
//! 4. `event` frames are handed to the matching subscription callback
//! 5. On disconnect every pending request fails; subscriptions are replayed
//!    under fresh wire ids and rerouted to their original handles

mod pending;
mod subscriptions;

pub use pending::{Disconnect, PendingRequests, Reply, ReplyFuture};
pub use subscriptions::{EventCallback, Removed, ReplayDescriptor, Subscription, SubscriptionRegistry};
