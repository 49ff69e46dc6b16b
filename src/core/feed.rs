use std::collections::HashSet;

use tracing::debug;

use crate::core::error::{BlogError, Result};
use crate::core::paginator::{paginate, Page, PageRequest};
use crate::core::policy::Actor;
use crate::core::store::Store;
use crate::models::Post;

/// 信息流的选择范围
#[derive(Debug, Clone)]
pub enum FeedScope {
    /// 全部帖子
    Global,
    /// 某个分组的帖子（分组别名）
    ByGroup(String),
    /// 某个作者的帖子（用户名）
    ByAuthor(String),
    /// 当前用户关注的作者的帖子
    Following(Actor),
}

/// 按范围取帖子并分页，结果总是按创建时间倒序
pub fn compose_feed(store: &Store, scope: &FeedScope, request: PageRequest) -> Result<Page<Post>> {
    let posts = match scope {
        FeedScope::Global => store.posts_where(|_| true)?,
        FeedScope::ByGroup(slug) => {
            let group = store
                .group_by_slug(slug)?
                .ok_or_else(|| BlogError::NotFound(format!("分组 {}", slug)))?;
            store.posts_where(|p| p.group == Some(group.id))?
        }
        FeedScope::ByAuthor(username) => {
            let author = store
                .user_by_username(username)?
                .ok_or_else(|| BlogError::NotFound(format!("用户 {}", username)))?;
            store.posts_where(|p| p.author == author.id)?
        }
        FeedScope::Following(actor) => {
            let user = actor.require()?;
            let authors: HashSet<_> = store.followed_authors(user.id)?.into_iter().collect();
            store.posts_where(|p| authors.contains(&p.author))?
        }
    };

    let page = paginate(posts, request);
    debug!(
        "Composed feed {:?}: page {}/{} ({} posts total)",
        scope, page.number, page.num_pages, page.count
    );
    Ok(page)
}
