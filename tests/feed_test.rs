// 信息流、关注关系和级联删除的集成测试

use std::sync::Arc;
use std::thread;

use chrono::Duration;

use yatube::core::forms::PostInput;
use yatube::core::{BlogError, ManualClock, NewUser};
use yatube::{Actor, Blog, Config, FeedScope, PageRequest};

fn blog_with_clock() -> (Blog, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let blog = Blog::with_clock(Config::default(), clock.clone()).unwrap();
    (blog, clock)
}

fn user(blog: &Blog, username: &str) -> Actor {
    blog.create_user(NewUser::named(username)).unwrap();
    blog.actor_for(Some(username)).unwrap()
}

fn texts(blog: &Blog, scope: FeedScope) -> Vec<String> {
    blog.compose_feed(&scope, PageRequest::first())
        .unwrap()
        .items
        .into_iter()
        .map(|p| p.text)
        .collect()
}

#[test]
fn post_in_group_shows_up_only_where_expected() {
    let (blog, _) = blog_with_clock();
    let author = user(&blog, "auth");
    blog.create_group("Test group", Some("test-slug"), "").unwrap();
    blog.create_group("Other group", Some("other-slug"), "").unwrap();
    blog.create_post(&author, PostInput::new("Test post").in_group("test-slug"))
        .unwrap();

    let expected = vec!["Test post".to_string()];
    assert_eq!(texts(&blog, FeedScope::Global), expected);
    assert_eq!(texts(&blog, FeedScope::ByGroup("test-slug".into())), expected);
    assert_eq!(texts(&blog, FeedScope::ByAuthor("auth".into())), expected);
    assert!(texts(&blog, FeedScope::ByGroup("other-slug".into())).is_empty());
}

#[test]
fn feeds_are_newest_first_with_ties_by_insertion() {
    let (blog, clock) = blog_with_clock();
    let author = user(&blog, "auth");
    blog.create_post(&author, PostInput::new("first")).unwrap();
    blog.create_post(&author, PostInput::new("same instant")).unwrap();
    clock.advance(Duration::minutes(1));
    blog.create_post(&author, PostInput::new("latest")).unwrap();

    assert_eq!(
        texts(&blog, FeedScope::Global),
        vec!["latest", "same instant", "first"]
    );
}

#[test]
fn seventeen_posts_split_into_ten_and_seven() {
    let (blog, clock) = blog_with_clock();
    let author = user(&blog, "auth");
    for i in 0..17 {
        clock.advance(Duration::seconds(1));
        blog.create_post(&author, PostInput::new(&format!("post {}", i)))
            .unwrap();
    }

    let first = blog.compose_feed(&FeedScope::Global, PageRequest::first()).unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.num_pages, 2);
    assert_eq!(first.items[0].text, "post 16");

    let second = blog
        .compose_feed(&FeedScope::Global, PageRequest::parse(Some("2")))
        .unwrap();
    assert_eq!(second.items.len(), 7);
    assert!(!second.has_next);

    let clamped = blog
        .compose_feed(&FeedScope::Global, PageRequest::parse(Some("99")))
        .unwrap();
    assert_eq!(clamped.number, 2);
    let garbage = blog
        .compose_feed(&FeedScope::Global, PageRequest::parse(Some("abc")))
        .unwrap();
    assert_eq!(garbage.number, 1);
}

#[test]
fn unknown_scopes_are_not_found() {
    let (blog, _) = blog_with_clock();
    assert!(matches!(
        blog.compose_feed(&FeedScope::ByGroup("nope".into()), PageRequest::first()),
        Err(BlogError::NotFound(_))
    ));
    assert!(matches!(
        blog.compose_feed(&FeedScope::ByAuthor("ghost".into()), PageRequest::first()),
        Err(BlogError::NotFound(_))
    ));
    assert!(matches!(
        blog.compose_feed(&FeedScope::Following(Actor::Anonymous), PageRequest::first()),
        Err(BlogError::Unauthorized)
    ));
}

#[test]
fn following_feed_shows_only_followed_authors() {
    let (blog, _) = blog_with_clock();
    let author = user(&blog, "author");
    let follower = user(&blog, "follower");
    let stranger = user(&blog, "stranger");

    blog.follow(&follower, "author").unwrap();
    blog.create_post(&author, PostInput::new("Fresh news")).unwrap();

    assert_eq!(
        texts(&blog, FeedScope::Following(follower.clone())),
        vec!["Fresh news"]
    );
    assert!(texts(&blog, FeedScope::Following(stranger)).is_empty());

    blog.unfollow(&follower, "author").unwrap();
    assert!(texts(&blog, FeedScope::Following(follower)).is_empty());
}

#[test]
fn follow_rules() {
    let (blog, _) = blog_with_clock();
    let author = user(&blog, "author");
    let follower = user(&blog, "follower");

    let first = blog.follow(&follower, "author").unwrap();
    assert!(first.following && first.changed);
    let again = blog.follow(&follower, "author").unwrap();
    assert!(again.following && !again.changed);
    assert_eq!(blog.store().follow_count().unwrap(), 1);

    let own = blog.follow(&author, "author").unwrap();
    assert!(!own.following && !own.changed);
    assert_eq!(blog.store().follow_count().unwrap(), 1);

    assert!(matches!(
        blog.follow(&Actor::Anonymous, "author"),
        Err(BlogError::Unauthorized)
    ));
    assert!(matches!(
        blog.follow(&follower, "ghost"),
        Err(BlogError::NotFound(_))
    ));

    let gone = blog.unfollow(&follower, "author").unwrap();
    assert!(!gone.following && gone.changed);
    let noop = blog.unfollow(&follower, "author").unwrap();
    assert!(!noop.changed);
}

#[test]
fn concurrent_follows_create_one_row() {
    let (blog, _) = blog_with_clock();
    user(&blog, "author");
    let follower = user(&blog, "follower");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let blog = blog.clone();
            let follower = follower.clone();
            thread::spawn(move || blog.follow(&follower, "author").unwrap().changed)
        })
        .collect();
    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|changed| *changed)
        .count();

    assert_eq!(created, 1);
    assert_eq!(blog.store().follow_count().unwrap(), 1);
}

#[test]
fn deleting_group_keeps_posts_without_group() {
    let (blog, _) = blog_with_clock();
    let author = user(&blog, "auth");
    blog.create_group("Test group", Some("test-slug"), "").unwrap();
    let post = blog
        .create_post(&author, PostInput::new("Test post").in_group("test-slug"))
        .unwrap();

    assert!(blog.delete_group("test-slug").unwrap());
    assert_eq!(blog.post_detail(post.id).unwrap().post.group, None);
    assert_eq!(texts(&blog, FeedScope::Global), vec!["Test post"]);
}

#[test]
fn deleting_user_cascades() {
    let (blog, _) = blog_with_clock();
    let author = user(&blog, "auth");
    let reader = user(&blog, "reader");
    let post = blog.create_post(&author, PostInput::new("Test post")).unwrap();
    let own = blog.create_post(&reader, PostInput::new("Reader post")).unwrap();
    blog.add_comment(&reader, post.id, "reader comment").unwrap();
    blog.add_comment(&author, own.id, "author comment").unwrap();
    blog.follow(&reader, "auth").unwrap();

    assert!(blog.delete_user("auth").unwrap());

    assert_eq!(texts(&blog, FeedScope::Global), vec!["Reader post"]);
    assert_eq!(blog.store().comment_count().unwrap(), 0);
    assert_eq!(blog.store().follow_count().unwrap(), 0);
    assert!(blog.store().user_by_username("auth").unwrap().is_none());
}

#[test]
fn cached_index_survives_deletion_until_flush() {
    let (blog, clock) = blog_with_clock();
    let key = "index_page:anonymous:1";
    blog.cache().set(key, "<p>old</p>".to_string(), blog.cache_ttl());

    clock.advance(Duration::seconds(5));
    assert_eq!(blog.cache().get(key).as_deref(), Some("<p>old</p>"));

    assert_eq!(blog.flush_cache("index_page"), 1);
    assert_eq!(blog.cache().get(key), None);

    blog.cache().set(key, "<p>new</p>".to_string(), blog.cache_ttl());
    clock.advance(Duration::seconds(20));
    assert_eq!(blog.cache().get(key), None);
}
