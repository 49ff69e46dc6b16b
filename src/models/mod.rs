pub mod config;
pub mod types;

pub use config::Config;
pub use types::{
    Comment, CommentId, CommentView, Follow, FollowId, Group, GroupId, GroupRef, Post, PostId,
    PostView, User, UserId,
};
