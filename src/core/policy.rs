//! 访问策略：纯函数，不访问存储，没有副作用。

use crate::core::error::{BlogError, Result};
use crate::models::{Post, User, UserId};

/// 发起请求的一方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Authenticated(User),
}

impl Actor {
    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated(user) => Some(user),
        }
    }

    pub fn id(&self) -> Option<UserId> {
        self.user().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// 需要登录的操作用它取出当前用户
    pub fn require(&self) -> Result<&User> {
        self.user().ok_or(BlogError::Unauthorized)
    }
}

impl From<Option<User>> for Actor {
    fn from(user: Option<User>) -> Self {
        user.map_or(Actor::Anonymous, Actor::Authenticated)
    }
}

/// 只有作者本人可以编辑帖子
pub fn can_edit(actor: &Actor, post: &Post) -> bool {
    actor.id() == Some(post.author)
}

pub fn can_create_post(actor: &Actor) -> bool {
    actor.is_authenticated()
}

pub fn can_comment(actor: &Actor) -> bool {
    actor.is_authenticated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: UserId) -> User {
        User {
            id,
            username: format!("user{}", id),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        }
    }

    fn post_by(author: UserId) -> Post {
        Post {
            id: 1,
            text: "text".to_string(),
            created_at: Utc::now(),
            author,
            group: None,
            image: None,
        }
    }

    #[test]
    fn only_author_can_edit() {
        let post = post_by(1);
        assert!(can_edit(&Actor::Authenticated(user(1)), &post));
        assert!(!can_edit(&Actor::Authenticated(user(2)), &post));
        assert!(!can_edit(&Actor::Anonymous, &post));
    }

    #[test]
    fn anonymous_cannot_create_or_comment() {
        assert!(!can_create_post(&Actor::Anonymous));
        assert!(!can_comment(&Actor::Anonymous));
        assert!(can_create_post(&Actor::Authenticated(user(1))));
        assert!(can_comment(&Actor::Authenticated(user(1))));
        assert!(matches!(Actor::Anonymous.require(), Err(BlogError::Unauthorized)));
    }
}
