//! 进程内的关系型存储。
//!
//! 所有表放在同一把 `RwLock` 之后，每个公开方法只持有一次锁，
//! 因此每次调用都是一个原子的读或写，唯一约束检查与插入不会被交错。

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::core::clock::Clock;
use crate::core::error::{BlogError, Result};
use crate::models::{
    Comment, CommentId, CommentView, Follow, FollowId, Group, GroupId, GroupRef, Post, PostId, PostView, User,
    UserId,
};

/// 新建用户的参数
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewUser {
    pub fn named(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Self::default()
        }
    }
}

/// 新建帖子的参数，引用已解析完毕
#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub author: UserId,
    pub group: Option<GroupId>,
    pub image: Option<String>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    follows: BTreeMap<FollowId, Follow>,
    next_user: UserId,
    next_group: GroupId,
    next_post: PostId,
    next_comment: CommentId,
    next_follow: FollowId,
}

fn next_id(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    fn group_by_slug(&self, slug: &str) -> Option<&Group> {
        self.groups.values().find(|g| g.slug == slug)
    }

    fn find_follow(&self, user: UserId, author: UserId) -> Option<FollowId> {
        self.follows
            .values()
            .find(|f| f.user == user && f.author == author)
            .map(|f| f.id)
    }

    fn remove_comments_where<F: Fn(&Comment) -> bool>(&mut self, pred: F) -> usize {
        let before = self.comments.len();
        self.comments.retain(|_, c| !pred(c));
        before - self.comments.len()
    }
}

/// 按创建时间倒序排列；时间相同时后插入的在前
fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<chrono::Utc>, u64),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// 共享的存储句柄，克隆后指向同一份数据
#[derive(Clone)]
pub struct Store {
    tables: Arc<RwLock<Tables>>,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| BlogError::Storage("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| BlogError::Storage("store lock poisoned".to_string()))
    }

    // ── 用户 ──

    pub fn create_user(&self, new: NewUser) -> Result<User> {
        let mut t = self.write()?;
        if t.user_by_username(&new.username).is_some() {
            return Err(BlogError::Conflict(format!("用户名 {}", new.username)));
        }
        let user = User {
            id: next_id(&mut t.next_user),
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
        };
        t.users.insert(user.id, user.clone());
        info!("Created user {} (id={})", user.username, user.id);
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.read()?.user_by_username(username).cloned())
    }

    /// 删除用户：先删评论和帖子（含帖子下的评论），再删关注关系，最后删用户
    pub fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut t = self.write()?;
        if !t.users.contains_key(&id) {
            return Ok(false);
        }
        let own_posts: Vec<PostId> = t
            .posts
            .values()
            .filter(|p| p.author == id)
            .map(|p| p.id)
            .collect();
        let comments = t.remove_comments_where(|c| c.author == id || own_posts.contains(&c.post));
        for post_id in &own_posts {
            t.posts.remove(post_id);
        }
        t.follows.retain(|_, f| f.user != id && f.author != id);
        t.users.remove(&id);
        info!(
            "Deleted user {} with {} posts and {} comments",
            id,
            own_posts.len(),
            comments
        );
        Ok(true)
    }

    // ── 分组 ──

    /// 创建分组；`slug` 为空时由标题生成
    pub fn create_group(&self, title: &str, slug: Option<&str>, description: &str) -> Result<Group> {
        let slug = match slug {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => crate::utils::slugify(title),
        };
        if slug.is_empty() {
            return Err(BlogError::ValidationFailed(
                [("slug".to_string(), vec!["分组别名不能为空".to_string()])]
                    .into_iter()
                    .collect(),
            ));
        }
        let mut t = self.write()?;
        if t.group_by_slug(&slug).is_some() {
            return Err(BlogError::Conflict(format!("分组别名 {}", slug)));
        }
        let group = Group {
            id: next_id(&mut t.next_group),
            title: title.to_string(),
            slug,
            description: description.to_string(),
        };
        t.groups.insert(group.id, group.clone());
        info!("Created group {} (slug={})", group.title, group.slug);
        Ok(group)
    }

    pub fn group(&self, id: GroupId) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    pub fn group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        Ok(self.read()?.group_by_slug(slug).cloned())
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        Ok(self.read()?.groups.values().cloned().collect())
    }

    /// 删除分组：先把引用它的帖子的 `group` 置空，帖子本身保留
    pub fn delete_group(&self, id: GroupId) -> Result<bool> {
        let mut t = self.write()?;
        if !t.groups.contains_key(&id) {
            return Ok(false);
        }
        let mut cleared = 0;
        for post in t.posts.values_mut().filter(|p| p.group == Some(id)) {
            post.group = None;
            cleared += 1;
        }
        t.groups.remove(&id);
        info!("Deleted group {}, cleared group on {} posts", id, cleared);
        Ok(true)
    }

    // ── 帖子 ──

    pub fn insert_post(&self, new: NewPost) -> Result<Post> {
        let created_at = self.clock.now();
        let mut t = self.write()?;
        let post = Post {
            id: next_id(&mut t.next_post),
            text: new.text,
            created_at,
            author: new.author,
            group: new.group,
            image: new.image,
        };
        t.posts.insert(post.id, post.clone());
        debug!("Inserted post {} by user {}", post.id, post.author);
        Ok(post)
    }

    pub fn post(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.read()?.posts.get(&id).cloned())
    }

    /// 修改帖子的可变字段；`id`、`author`、`created_at` 保持不变
    pub fn update_post<F>(&self, id: PostId, apply: F) -> Result<Post>
    where
        F: FnOnce(&mut Post),
    {
        let mut t = self.write()?;
        let post = t
            .posts
            .get_mut(&id)
            .ok_or_else(|| BlogError::NotFound(format!("帖子 {}", id)))?;
        let (author, created_at) = (post.author, post.created_at);
        apply(post);
        post.id = id;
        post.author = author;
        post.created_at = created_at;
        Ok(post.clone())
    }

    /// 删除帖子及其评论
    pub fn delete_post(&self, id: PostId) -> Result<bool> {
        let mut t = self.write()?;
        if t.posts.remove(&id).is_none() {
            return Ok(false);
        }
        let comments = t.remove_comments_where(|c| c.post == id);
        info!("Deleted post {} with {} comments", id, comments);
        Ok(true)
    }

    /// 满足条件的帖子，按时间倒序
    pub fn posts_where<F>(&self, pred: F) -> Result<Vec<Post>>
    where
        F: Fn(&Post) -> bool,
    {
        let t = self.read()?;
        let mut posts: Vec<Post> = t.posts.values().filter(|p| pred(*p)).cloned().collect();
        newest_first(&mut posts, |p| (p.created_at, p.id));
        Ok(posts)
    }

    pub fn post_count(&self) -> Result<usize> {
        Ok(self.read()?.posts.len())
    }

    /// 附带作者和分组信息的帖子，供模板使用
    pub fn post_views(&self, posts: &[Post]) -> Result<Vec<PostView>> {
        let t = self.read()?;
        Ok(posts
            .iter()
            .map(|p| {
                let author = t.users.get(&p.author);
                PostView {
                    id: p.id,
                    text: p.text.clone(),
                    created_at: p.created_at,
                    author: author.map(|u| u.username.clone()).unwrap_or_default(),
                    author_name: author.map(User::display_name).unwrap_or_default(),
                    group: p.group.and_then(|g| t.groups.get(&g)).map(|g| GroupRef {
                        title: g.title.clone(),
                        slug: g.slug.clone(),
                    }),
                    image: p.image.clone(),
                }
            })
            .collect())
    }

    // ── 评论 ──

    pub fn insert_comment(&self, post: PostId, author: UserId, text: String) -> Result<Comment> {
        let created_at = self.clock.now();
        let mut t = self.write()?;
        if !t.posts.contains_key(&post) {
            return Err(BlogError::NotFound(format!("帖子 {}", post)));
        }
        let comment = Comment {
            id: next_id(&mut t.next_comment),
            text,
            created_at,
            author,
            post,
        };
        t.comments.insert(comment.id, comment.clone());
        debug!("Inserted comment {} on post {}", comment.id, post);
        Ok(comment)
    }

    /// 帖子下的评论，按时间倒序
    pub fn comments_for(&self, post: PostId) -> Result<Vec<Comment>> {
        let t = self.read()?;
        let mut comments: Vec<Comment> = t
            .comments
            .values()
            .filter(|c| c.post == post)
            .cloned()
            .collect();
        newest_first(&mut comments, |c| (c.created_at, c.id));
        Ok(comments)
    }

    /// 附带作者用户名的评论，供模板使用
    pub fn comment_views(&self, comments: &[Comment]) -> Result<Vec<CommentView>> {
        let t = self.read()?;
        Ok(comments
            .iter()
            .map(|c| CommentView {
                id: c.id,
                text: c.text.clone(),
                created_at: c.created_at,
                author: t
                    .users
                    .get(&c.author)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    pub fn comment_count(&self) -> Result<usize> {
        Ok(self.read()?.comments.len())
    }

    // ── 关注 ──

    /// 在同一次写锁内检查 (user, author) 唯一约束并插入；已存在时返回 `None`
    pub fn insert_follow_unique(&self, user: UserId, author: UserId) -> Result<Option<Follow>> {
        let mut t = self.write()?;
        if t.find_follow(user, author).is_some() {
            return Ok(None);
        }
        let follow = Follow {
            id: next_id(&mut t.next_follow),
            user,
            author,
        };
        t.follows.insert(follow.id, follow.clone());
        Ok(Some(follow))
    }

    /// 删除关注关系，返回是否确实删除了一行
    pub fn delete_follow(&self, user: UserId, author: UserId) -> Result<bool> {
        let mut t = self.write()?;
        match t.find_follow(user, author) {
            Some(id) => {
                t.follows.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_following(&self, user: UserId, author: UserId) -> Result<bool> {
        Ok(self.read()?.find_follow(user, author).is_some())
    }

    /// `user` 关注的所有作者
    pub fn followed_authors(&self, user: UserId) -> Result<Vec<UserId>> {
        Ok(self
            .read()?
            .follows
            .values()
            .filter(|f| f.user == user)
            .map(|f| f.author)
            .collect())
    }

    pub fn follow_count(&self) -> Result<usize> {
        Ok(self.read()?.follows.len())
    }
}
