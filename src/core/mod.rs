pub mod blog;
pub mod cache;
pub mod clock;
pub mod error;
pub mod feed;
pub mod forms;
pub mod paginator;
pub mod policy;
pub mod posts;
pub mod server;
pub mod social;
pub mod store;

pub use blog::{Blog, Profile};
pub use cache::{MemoryPageCache, PageCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BlogError, FieldErrors, Result};
pub use feed::{compose_feed, FeedScope};
pub use paginator::{Page, PageRequest, Paginator, POSTS_PER_PAGE};
pub use policy::Actor;
pub use server::Server;
pub use social::FollowResult;
pub use store::{NewUser, Store};
