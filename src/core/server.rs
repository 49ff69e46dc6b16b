use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::FormRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::core::blog::Blog;
use crate::core::error::{BlogError, FieldErrors};
use crate::core::feed::FeedScope;
use crate::core::forms::{CommentForm, PostForm};
use crate::core::paginator::PageRequest;
use crate::core::policy::{self, Actor};
use crate::models::{Post, PostId};
use crate::theme::renderer::ThemeRenderer;
use crate::utils::login_redirect_url;

/// 请求处理共享的状态
pub struct AppState {
    pub blog: Blog,
    renderer: ThemeRenderer,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref())
    }
}

/// 302 跳转
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn detail_url(post_id: PostId) -> String {
    format!("/posts/{}", post_id)
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}", username)
}

/// 请求体无法按表单解析时当作空表单；登录检查总在读取表单之前
fn form_or_default<T: Default>(form: std::result::Result<Form<T>, FormRejection>) -> T {
    match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!("Unreadable form body, treated as empty: {}", rejection);
            T::default()
        }
    }
}

fn parse_post_id(raw: &str) -> crate::core::error::Result<PostId> {
    raw.parse()
        .map_err(|_| BlogError::NotFound(format!("帖子 {}", raw)))
}

impl AppState {
    pub fn new(blog: Blog) -> crate::core::error::Result<Self> {
        let renderer = ThemeRenderer::new(&blog.config)?;
        Ok(Self { blog, renderer })
    }

    /// 从外部认证写入的请求头里取当前用户
    fn actor(&self, headers: &HeaderMap) -> crate::core::error::Result<Actor> {
        let username = headers
            .get(self.blog.config.auth_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        self.blog.actor_for(username)
    }

    /// 解析当前用户、执行处理逻辑，并把错误转换成响应
    fn handle<F>(&self, headers: &HeaderMap, uri: &Uri, f: F) -> Response
    where
        F: FnOnce(&Actor) -> crate::core::error::Result<Response>,
    {
        let actor = match self.actor(headers) {
            Ok(actor) => actor,
            Err(e) => return self.fail(e, uri, &Actor::Anonymous),
        };
        match f(&actor) {
            Ok(response) => response,
            Err(e) => self.fail(e, uri, &actor),
        }
    }

    fn render(&self, template: &str, context: &TeraContext) -> crate::core::error::Result<Response> {
        Ok(Html(self.renderer.render(template, context)?).into_response())
    }

    fn render_status(&self, status: StatusCode, template: &str, context: &TeraContext) -> Response {
        match self.renderer.render(template, context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!("Failed to render error page {}: {}", template, e);
                (status, status.canonical_reason().unwrap_or("Error")).into_response()
            }
        }
    }

    fn fail(&self, err: BlogError, uri: &Uri, actor: &Actor) -> Response {
        match err {
            BlogError::NotFound(what) => {
                debug!("Not found: {}", what);
                let mut context = self.renderer.context(actor);
                context.insert("path", uri.path());
                self.render_status(StatusCode::NOT_FOUND, "core/404.html", &context)
            }
            BlogError::Unauthorized => {
                let next = uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or_else(|| uri.path());
                found(&login_redirect_url(&self.blog.config.login_url, next))
            }
            BlogError::PolicyRefused { post_id } => found(&detail_url(post_id)),
            // 表单处理函数自己重新渲染校验错误，走到这里的都是意外情况
            err @ (BlogError::ValidationFailed(_) | BlogError::Conflict(_) | BlogError::Storage(_)) => {
                error!("Request to {} failed: {}", uri, err);
                let context = self.renderer.context(actor);
                self.render_status(StatusCode::INTERNAL_SERVER_ERROR, "core/500.html", &context)
            }
        }
    }

    fn feed_context(
        &self,
        actor: &Actor,
        scope: &FeedScope,
        request: PageRequest,
    ) -> crate::core::error::Result<TeraContext> {
        let page = self.blog.compose_feed(scope, request)?;
        let mut context = self.renderer.context(actor);
        context.insert("page", &self.blog.post_views(page)?);
        Ok(context)
    }

    /// 帖子表单页面（创建和编辑共用）
    fn post_form(
        &self,
        actor: &Actor,
        form: &PostForm,
        errors: &FieldErrors,
        editing: Option<&Post>,
    ) -> crate::core::error::Result<Response> {
        let mut context = self.renderer.context(actor);
        context.insert("form", form);
        context.insert("errors", errors);
        context.insert("fields", &PostForm::FIELDS);
        context.insert("groups", &self.blog.groups()?);
        context.insert("is_new", &editing.is_none());
        context.insert("post_id", &editing.map(|p| p.id));
        context.insert("current_image", &editing.and_then(|p| p.image.clone()));
        self.render("posts/create_post.html", &context)
    }

    fn editable_post(&self, actor: &Actor, raw_id: &str) -> crate::core::error::Result<Post> {
        actor.require()?;
        let post_id = parse_post_id(raw_id)?;
        let post = self.blog.post_detail(post_id)?.post;
        if !policy::can_edit(actor, &post) {
            return Err(BlogError::PolicyRefused { post_id });
        }
        Ok(post)
    }
}

// ── 处理函数 ──

async fn index(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let cache_key = format!(
            "{}:{}:{}",
            state.blog.config.cache.key_prefix,
            actor.user().map_or("anonymous", |u| u.username.as_str()),
            query.page.as_deref().unwrap_or("1")
        );
        if let Some(html) = state.blog.cache().get(&cache_key) {
            return Ok(Html(html).into_response());
        }

        let context = state.feed_context(actor, &FeedScope::Global, query.request())?;
        let html = state.renderer.render("posts/index.html", &context)?;
        state
            .blog
            .cache()
            .set(&cache_key, html.clone(), state.blog.cache_ttl());
        Ok(Html(html).into_response())
    })
}

async fn group_posts(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let group = state.blog.group_by_slug(&slug)?;
        let mut context = state.feed_context(actor, &FeedScope::ByGroup(slug.clone()), query.request())?;
        context.insert("group", &group);
        state.render("posts/group_list.html", &context)
    })
}

async fn profile(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let profile = state.blog.profile(actor, &username, query.request())?;
        let mut context = state.renderer.context(actor);
        context.insert("author", &profile.author);
        context.insert("author_name", &profile.author.display_name());
        context.insert("following", &profile.following);
        context.insert("is_self", &(actor.id() == Some(profile.author.id)));
        context.insert("page", &state.blog.post_views(profile.page)?);
        state.render("posts/profile.html", &context)
    })
}

async fn post_detail(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let detail = state.blog.post_detail(parse_post_id(&raw_id)?)?;
        let store = state.blog.store();
        let author_posts = store.posts_where(|p| p.author == detail.post.author)?.len();
        let view = store
            .post_views(std::slice::from_ref(&detail.post))?
            .pop()
            .ok_or_else(|| BlogError::Storage("post view missing".to_string()))?;

        let mut context = state.renderer.context(actor);
        context.insert("post", &view);
        context.insert("author_posts", &author_posts);
        context.insert("comments", &store.comment_views(&detail.comments)?);
        context.insert("can_edit", &policy::can_edit(actor, &detail.post));
        context.insert("can_comment", &policy::can_comment(actor));
        context.insert("comment_fields", &CommentForm::FIELDS);
        state.render("posts/post_detail.html", &context)
    })
}

async fn create_form(State(state): State<SharedState>, headers: HeaderMap, uri: Uri) -> Response {
    state.handle(&headers, &uri, |actor| {
        actor.require()?;
        state.post_form(actor, &PostForm::default(), &FieldErrors::new(), None)
    })
}

async fn create_submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    form: std::result::Result<Form<PostForm>, FormRejection>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let user = actor.require()?;
        let form = form_or_default(form);
        let errors = match form.validate() {
            Ok(input) => match state.blog.create_post(actor, input) {
                Ok(_) => return Ok(found(&profile_url(&user.username))),
                Err(BlogError::ValidationFailed(errors)) => errors,
                Err(e) => return Err(e),
            },
            Err(errors) => errors,
        };
        state.post_form(actor, &form, &errors, None)
    })
}

async fn edit_form(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(raw_id): Path<String>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let post = state.editable_post(actor, &raw_id)?;
        let group_slug = match post.group {
            Some(id) => state.blog.store().group(id)?.map(|g| g.slug),
            None => None,
        };
        let form = PostForm::prefilled(&post.text, group_slug.as_deref(), post.image.as_deref());
        state.post_form(actor, &form, &FieldErrors::new(), Some(&post))
    })
}

async fn edit_submit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(raw_id): Path<String>,
    form: std::result::Result<Form<PostForm>, FormRejection>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let post = state.editable_post(actor, &raw_id)?;
        let form = form_or_default(form);
        let errors = match form.validate() {
            Ok(input) => match state.blog.edit_post(actor, post.id, input) {
                Ok(_) => return Ok(found(&detail_url(post.id))),
                Err(BlogError::ValidationFailed(errors)) => errors,
                Err(e) => return Err(e),
            },
            Err(errors) => errors,
        };
        state.post_form(actor, &form, &errors, Some(&post))
    })
}

async fn add_comment(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(raw_id): Path<String>,
    form: std::result::Result<Form<CommentForm>, FormRejection>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        actor.require()?;
        let post_id = parse_post_id(&raw_id)?;
        let form = form_or_default(form);
        match state.blog.add_comment(actor, post_id, &form.text) {
            Ok(_) => {}
            Err(BlogError::ValidationFailed(errors)) => {
                debug!("Comment on post {} ignored: {:?}", post_id, errors);
            }
            Err(e) => return Err(e),
        }
        Ok(found(&detail_url(post_id)))
    })
}

async fn follow_index(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        let context = state.feed_context(actor, &FeedScope::Following(actor.clone()), query.request())?;
        state.render("posts/follow.html", &context)
    })
}

async fn profile_follow(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(username): Path<String>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        state.blog.follow(actor, &username)?;
        Ok(found(&profile_url(&username)))
    })
}

async fn profile_unfollow(
    State(state): State<SharedState>,
    headers: HeaderMap,
    uri: Uri,
    Path(username): Path<String>,
) -> Response {
    state.handle(&headers, &uri, |actor| {
        state.blog.unfollow(actor, &username)?;
        Ok(found(&profile_url(&username)))
    })
}

async fn about_author(State(state): State<SharedState>, headers: HeaderMap, uri: Uri) -> Response {
    state.handle(&headers, &uri, |actor| {
        state.render("about/author.html", &state.renderer.context(actor))
    })
}

async fn about_tech(State(state): State<SharedState>, headers: HeaderMap, uri: Uri) -> Response {
    state.handle(&headers, &uri, |actor| {
        state.render("about/tech.html", &state.renderer.context(actor))
    })
}

async fn not_found(State(state): State<SharedState>, headers: HeaderMap, uri: Uri) -> Response {
    state.handle(&headers, &uri, |_| {
        Err(BlogError::NotFound(uri.path().to_string()))
    })
}

/// HTTP 服务器
pub struct Server {
    state: SharedState,
    /// 图片附件目录
    media_dir: PathBuf,
}

impl Server {
    /// 创建新的服务器；`site_dir` 为站点目录，附件目录相对于它
    pub fn new(blog: Blog, site_dir: PathBuf) -> Result<Self> {
        let media_dir = site_dir.join(&blog.config.media_dir);
        let state = AppState::new(blog).context("Failed to initialize templates")?;
        Ok(Self {
            state: Arc::new(state),
            media_dir,
        })
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// 创建路由
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/group/:slug", get(group_posts))
            .route("/profile/:username", get(profile))
            .route("/posts/:post_id", get(post_detail))
            .route("/create", get(create_form).post(create_submit))
            .route("/posts/:post_id/edit", get(edit_form).post(edit_submit))
            .route("/posts/:post_id/comment", axum::routing::post(add_comment))
            .route("/follow/:username", get(profile_follow))
            .route("/unfollow/:username", get(profile_unfollow))
            .route("/follow-feed", get(follow_index))
            .route("/about/author", get(about_author))
            .route("/about/tech", get(about_tech))
            .nest_service("/media", ServeDir::new(&self.media_dir))
            .fallback(not_found)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// 启动服务器，收到 Ctrl+C 后退出
    pub async fn start(self) -> Result<()> {
        let config = &self.state.blog.config;
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Server started at http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down");
            })
            .await?;
        Ok(())
    }
}
