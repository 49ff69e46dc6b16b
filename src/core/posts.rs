use tracing::{info, warn};

use crate::core::error::{BlogError, Result};
use crate::core::forms::{self, PostInput};
use crate::core::policy::{self, Actor};
use crate::core::store::{NewPost, Store};
use crate::models::{Comment, GroupId, Post, PostId};

/// 分组别名解析失败时不报错，帖子只是不属于任何分组
fn resolve_group(store: &Store, slug: Option<&str>) -> Result<Option<GroupId>> {
    let Some(slug) = slug else {
        return Ok(None);
    };
    let group = store.group_by_slug(slug)?;
    if group.is_none() {
        warn!("Group '{}' does not exist, post saved without group", slug);
    }
    Ok(group.map(|g| g.id))
}

fn require_post(store: &Store, post_id: PostId) -> Result<Post> {
    store
        .post(post_id)?
        .ok_or_else(|| BlogError::NotFound(format!("帖子 {}", post_id)))
}

/// 创建帖子，作者为当前用户，创建时间取当前时间
pub fn create_post(store: &Store, actor: &Actor, input: PostInput) -> Result<Post> {
    let user = actor.require()?;
    if !policy::can_create_post(actor) {
        return Err(BlogError::Unauthorized);
    }
    let text = forms::required_text("text", &input.text).map_err(BlogError::ValidationFailed)?;
    let group = resolve_group(store, input.group_slug.as_deref())?;

    let post = store.insert_post(NewPost {
        text,
        author: user.id,
        group,
        image: input.image.apply(None),
    })?;
    info!("{} created post {}", user.username, post.id);
    Ok(post)
}

/// 编辑帖子。非作者的请求返回 `PolicyRefused`，调用方应当静默跳回详情页
pub fn edit_post(store: &Store, actor: &Actor, post_id: PostId, input: PostInput) -> Result<Post> {
    let user = actor.require()?;
    let post = require_post(store, post_id)?;
    if !policy::can_edit(actor, &post) {
        info!("{} may not edit post {}, refused", user.username, post_id);
        return Err(BlogError::PolicyRefused { post_id });
    }
    let text = forms::required_text("text", &input.text).map_err(BlogError::ValidationFailed)?;
    let group = resolve_group(store, input.group_slug.as_deref())?;

    let post = store.update_post(post_id, move |p| {
        p.text = text;
        p.group = group;
        p.image = input.image.apply(p.image.take());
    })?;
    info!("{} edited post {}", user.username, post.id);
    Ok(post)
}

/// 给帖子添加评论
pub fn add_comment(store: &Store, actor: &Actor, post_id: PostId, text: &str) -> Result<Comment> {
    let user = actor.require()?;
    if !policy::can_comment(actor) {
        return Err(BlogError::Unauthorized);
    }
    let text = forms::required_text("text", text).map_err(BlogError::ValidationFailed)?;
    require_post(store, post_id)?;

    let comment = store.insert_comment(post_id, user.id, text)?;
    info!("{} commented on post {}", user.username, post_id);
    Ok(comment)
}

/// 帖子详情：帖子本身和按时间倒序的评论
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

pub fn post_detail(store: &Store, post_id: PostId) -> Result<PostDetail> {
    let post = require_post(store, post_id)?;
    let comments = store.comments_for(post_id)?;
    Ok(PostDetail { post, comments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::forms::ImageChange;
    use crate::core::store::NewUser;
    use std::sync::Arc;

    fn setup() -> (Store, Actor, Actor) {
        let store = Store::new(Arc::new(ManualClock::default()));
        let author = store.create_user(NewUser::named("author")).unwrap();
        let other = store.create_user(NewUser::named("other")).unwrap();
        store.create_group("Cats", Some("cats"), "").unwrap();
        (store, Actor::Authenticated(author), Actor::Authenticated(other))
    }

    #[test]
    fn create_sets_author_and_resolves_group() {
        let (store, author, _) = setup();
        let post = create_post(&store, &author, PostInput::new("Test post").in_group("cats")).unwrap();
        assert_eq!(Some(post.author), author.id());
        assert!(post.group.is_some());

        let orphan =
            create_post(&store, &author, PostInput::new("No group").in_group("missing")).unwrap();
        assert_eq!(orphan.group, None);
    }

    #[test]
    fn create_rejects_blank_text_and_anonymous() {
        let (store, author, _) = setup();
        assert!(matches!(
            create_post(&store, &author, PostInput::new("  ")),
            Err(BlogError::ValidationFailed(_))
        ));
        assert!(matches!(
            create_post(&store, &Actor::Anonymous, PostInput::new("hi")),
            Err(BlogError::Unauthorized)
        ));
        assert_eq!(store.post_count().unwrap(), 0);
    }

    #[test]
    fn only_author_edits() {
        let (store, author, other) = setup();
        let post =
            create_post(&store, &author, PostInput::new("old").with_image("posts/a.gif")).unwrap();

        let refused = edit_post(&store, &other, post.id, PostInput::new("hacked"));
        assert!(matches!(refused, Err(BlogError::PolicyRefused { post_id }) if post_id == post.id));
        assert_eq!(store.post(post.id).unwrap().unwrap().text, "old");

        let edited = edit_post(&store, &author, post.id, PostInput::new("new").in_group("cats")).unwrap();
        assert_eq!(edited.text, "new");
        assert_eq!(edited.created_at, post.created_at);
        assert_eq!(edited.image.as_deref(), Some("posts/a.gif"));
        assert!(edited.group.is_some());

        let mut clear = PostInput::new("new");
        clear.image = ImageChange::Clear;
        let cleared = edit_post(&store, &author, post.id, clear).unwrap();
        assert_eq!(cleared.image, None);
        assert_eq!(cleared.group, None);
    }

    #[test]
    fn edit_missing_post_is_not_found() {
        let (store, author, _) = setup();
        assert!(matches!(
            edit_post(&store, &author, 404, PostInput::new("x")),
            Err(BlogError::NotFound(_))
        ));
    }

    #[test]
    fn comments_require_login_and_text() {
        let (store, author, other) = setup();
        let post = create_post(&store, &author, PostInput::new("post")).unwrap();

        assert!(matches!(
            add_comment(&store, &Actor::Anonymous, post.id, "hi"),
            Err(BlogError::Unauthorized)
        ));
        assert!(matches!(
            add_comment(&store, &other, post.id, ""),
            Err(BlogError::ValidationFailed(_))
        ));
        assert!(matches!(
            add_comment(&store, &other, 999, "hi"),
            Err(BlogError::NotFound(_))
        ));
        let comment = add_comment(&store, &other, post.id, "nice").unwrap();
        assert_eq!(Some(comment.author), other.id());

        let detail = post_detail(&store, post.id).unwrap();
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(store.comment_count().unwrap(), 1);
    }
}
