//! Service layer
//!
//! Contains business logic separated from HTTP handlers: the
//! relationship ledger, the group membership ledger, the content
//! store, the messaging gate, and profile CRUD.

mod account;
mod feed;
mod friendship;
mod group;
mod messaging;
mod post;

pub use account::AccountService;
pub use feed::FeedService;
pub use friendship::{FriendshipService, RequestOutcome};
pub use group::GroupService;
pub use messaging::MessagingService;
pub use post::{MAX_REPOST_DEPTH, PostService};
