use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::core::cache::{MemoryPageCache, PageCache};
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::{BlogError, Result};
use crate::core::feed::{self, FeedScope};
use crate::core::forms::PostInput;
use crate::core::paginator::{Page, PageRequest};
use crate::core::policy::Actor;
use crate::core::posts::{self, PostDetail};
use crate::core::social::{self, FollowResult};
use crate::core::store::{NewUser, Store};
use crate::models::{Comment, Config, Group, Post, PostId, PostView, User};

/// 作者主页的数据
#[derive(Debug, Clone)]
pub struct Profile {
    pub author: User,
    pub page: Page<Post>,
    /// 当前用户是否关注了该作者；匿名用户总是 false
    pub following: bool,
}

/// 博客服务：持有配置、存储和页面缓存，对外提供全部核心操作
#[derive(Clone)]
pub struct Blog {
    pub config: Config,
    store: Store,
    cache: Arc<dyn PageCache>,
}

impl Blog {
    /// 使用系统时钟和内存缓存创建服务，并写入配置里的初始数据
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// 存储和缓存共用同一个时钟
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let cache = Arc::new(MemoryPageCache::new(clock.clone()));
        Self::with_parts(config, clock, cache)
    }

    pub fn with_parts(
        config: Config,
        clock: Arc<dyn Clock>,
        cache: Arc<dyn PageCache>,
    ) -> Result<Self> {
        let blog = Self {
            config,
            store: Store::new(clock),
            cache,
        };
        blog.seed()?;
        Ok(blog)
    }

    /// 写入配置中的用户和分组；已存在的跳过
    fn seed(&self) -> Result<()> {
        for user in &self.config.seed.users {
            let new = NewUser {
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                email: user.email.clone(),
            };
            match self.store.create_user(new) {
                Ok(_) => {}
                Err(BlogError::Conflict(what)) => warn!("Seed skipped, {} already exists", what),
                Err(e) => return Err(e),
            }
        }
        for group in &self.config.seed.groups {
            match self
                .store
                .create_group(&group.title, group.slug.as_deref(), &group.description)
            {
                Ok(_) => {}
                Err(BlogError::Conflict(what)) => warn!("Seed skipped, {} already exists", what),
                Err(e) => return Err(e),
            }
        }
        info!(
            "Seeded {} users and {} groups",
            self.config.seed.users.len(),
            self.config.seed.groups.len()
        );
        Ok(())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache(&self) -> &dyn PageCache {
        self.cache.as_ref()
    }

    /// 页面缓存有效期；超出时间范围的配置按最大值处理
    pub fn cache_ttl(&self) -> Duration {
        i64::try_from(self.config.cache.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or_else(|| Duration::milliseconds(i64::MAX))
    }

    /// 把外部认证给出的用户名解析为请求方；未知用户名视为匿名
    pub fn actor_for(&self, username: Option<&str>) -> Result<Actor> {
        match username {
            Some(name) => Ok(self.store.user_by_username(name)?.into()),
            None => Ok(Actor::Anonymous),
        }
    }

    // ── 用户与分组 ──

    pub fn create_user(&self, new: NewUser) -> Result<User> {
        self.store.create_user(new)
    }

    pub fn create_group(&self, title: &str, slug: Option<&str>, description: &str) -> Result<Group> {
        self.store.create_group(title, slug, description)
    }

    pub fn group_by_slug(&self, slug: &str) -> Result<Group> {
        self.store
            .group_by_slug(slug)?
            .ok_or_else(|| BlogError::NotFound(format!("分组 {}", slug)))
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        self.store.groups()
    }

    pub fn delete_group(&self, slug: &str) -> Result<bool> {
        let group = self.group_by_slug(slug)?;
        self.store.delete_group(group.id)
    }

    pub fn delete_user(&self, username: &str) -> Result<bool> {
        match self.store.user_by_username(username)? {
            Some(user) => self.store.delete_user(user.id),
            None => Ok(false),
        }
    }

    // ── 信息流 ──

    pub fn compose_feed(&self, scope: &FeedScope, request: PageRequest) -> Result<Page<Post>> {
        feed::compose_feed(&self.store, scope, request)
    }

    pub fn profile(&self, actor: &Actor, username: &str, request: PageRequest) -> Result<Profile> {
        let author = self
            .store
            .user_by_username(username)?
            .ok_or_else(|| BlogError::NotFound(format!("用户 {}", username)))?;
        let page = self.compose_feed(&FeedScope::ByAuthor(username.to_string()), request)?;
        let following = match actor.id() {
            Some(id) => self.store.is_following(id, author.id)?,
            None => false,
        };
        Ok(Profile {
            author,
            page,
            following,
        })
    }

    /// 给一页帖子补上作者和分组信息
    pub fn post_views(&self, page: Page<Post>) -> Result<Page<PostView>> {
        let views = self.store.post_views(&page.items)?;
        Ok(page.map(|_| views))
    }

    // ── 关注 ──

    pub fn follow(&self, actor: &Actor, target_username: &str) -> Result<FollowResult> {
        social::follow(&self.store, actor, target_username)
    }

    pub fn unfollow(&self, actor: &Actor, target_username: &str) -> Result<FollowResult> {
        social::unfollow(&self.store, actor, target_username)
    }

    // ── 帖子与评论 ──

    pub fn create_post(&self, actor: &Actor, input: PostInput) -> Result<Post> {
        posts::create_post(&self.store, actor, input)
    }

    pub fn edit_post(&self, actor: &Actor, post_id: PostId, input: PostInput) -> Result<Post> {
        posts::edit_post(&self.store, actor, post_id, input)
    }

    pub fn add_comment(&self, actor: &Actor, post_id: PostId, text: &str) -> Result<Comment> {
        posts::add_comment(&self.store, actor, post_id, text)
    }

    pub fn post_detail(&self, post_id: PostId) -> Result<PostDetail> {
        posts::post_detail(&self.store, post_id)
    }

    /// 删除帖子；页面缓存不会随之失效
    pub fn delete_post(&self, post_id: PostId) -> Result<bool> {
        self.store.delete_post(post_id)
    }

    // ── 缓存 ──

    pub fn flush_cache(&self, prefix: &str) -> usize {
        self.cache.flush(prefix)
    }
}
