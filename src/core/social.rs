use tracing::{debug, info};

use crate::core::error::{BlogError, Result};
use crate::core::policy::Actor;
use crate::core::store::Store;
use crate::models::User;

/// 关注/取消关注之后的状态
#[derive(Debug, Clone)]
pub struct FollowResult {
    /// 目标作者
    pub author: User,
    /// 操作完成后当前用户是否关注着该作者
    pub following: bool,
    /// 本次调用是否新增或删除了关注记录
    pub changed: bool,
}

fn resolve_author(store: &Store, username: &str) -> Result<User> {
    store
        .user_by_username(username)?
        .ok_or_else(|| BlogError::NotFound(format!("用户 {}", username)))
}

/// 关注作者。关注自己或重复关注都不做任何修改
pub fn follow(store: &Store, actor: &Actor, target_username: &str) -> Result<FollowResult> {
    let user = actor.require()?;
    let author = resolve_author(store, target_username)?;

    if user.id == author.id {
        debug!("User {} tried to follow themselves, ignored", user.username);
        return Ok(FollowResult {
            author,
            following: false,
            changed: false,
        });
    }

    let changed = store.insert_follow_unique(user.id, author.id)?.is_some();
    if changed {
        info!("{} now follows {}", user.username, author.username);
    } else {
        debug!("{} already follows {}", user.username, author.username);
    }
    Ok(FollowResult {
        author,
        following: true,
        changed,
    })
}

/// 取消关注。没有关注记录时什么也不做
pub fn unfollow(store: &Store, actor: &Actor, target_username: &str) -> Result<FollowResult> {
    let user = actor.require()?;
    let author = resolve_author(store, target_username)?;

    let changed = store.delete_follow(user.id, author.id)?;
    if changed {
        info!("{} unfollowed {}", user.username, author.username);
    }
    Ok(FollowResult {
        author,
        following: false,
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::store::NewUser;
    use std::sync::Arc;

    fn setup() -> (Store, Actor, User) {
        let store = Store::new(Arc::new(ManualClock::default()));
        let reader = store.create_user(NewUser::named("reader")).unwrap();
        let author = store.create_user(NewUser::named("author")).unwrap();
        (store, Actor::Authenticated(reader), author)
    }

    #[test]
    fn follow_twice_creates_one_row() {
        let (store, reader, _) = setup();
        let first = follow(&store, &reader, "author").unwrap();
        let second = follow(&store, &reader, "author").unwrap();
        assert!(first.changed && first.following);
        assert!(!second.changed && second.following);
        assert_eq!(store.follow_count().unwrap(), 1);
    }

    #[test]
    fn self_follow_is_a_no_op() {
        let (store, reader, _) = setup();
        let result = follow(&store, &reader, "reader").unwrap();
        assert!(!result.changed && !result.following);
        assert_eq!(store.follow_count().unwrap(), 0);
    }

    #[test]
    fn unfollow_without_relation_is_a_no_op() {
        let (store, reader, _) = setup();
        let result = unfollow(&store, &reader, "author").unwrap();
        assert!(!result.changed);

        follow(&store, &reader, "author").unwrap();
        assert!(unfollow(&store, &reader, "author").unwrap().changed);
        assert_eq!(store.follow_count().unwrap(), 0);
    }

    #[test]
    fn unknown_target_and_anonymous_actor() {
        let (store, reader, _) = setup();
        assert!(matches!(follow(&store, &reader, "ghost"), Err(BlogError::NotFound(_))));
        assert!(matches!(
            follow(&store, &Actor::Anonymous, "author"),
            Err(BlogError::Unauthorized)
        ));
        assert!(matches!(
            unfollow(&store, &Actor::Anonymous, "author"),
            Err(BlogError::Unauthorized)
        ));
    }
}
