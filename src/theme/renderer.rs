use std::collections::HashMap;

use chrono::DateTime;
use serde::Serialize;
use tera::{Context as TeraContext, Tera};
use tracing::{debug, error};

use crate::core::error::Result;
use crate::core::policy::Actor;
use crate::models::Config;

/// 内嵌的模板：(模板名, 内容)
const TEMPLATES: [(&str, &str); 12] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("macros.html", include_str!("../../templates/macros.html")),
    ("posts/index.html", include_str!("../../templates/posts/index.html")),
    ("posts/group_list.html", include_str!("../../templates/posts/group_list.html")),
    ("posts/profile.html", include_str!("../../templates/posts/profile.html")),
    ("posts/post_detail.html", include_str!("../../templates/posts/post_detail.html")),
    ("posts/create_post.html", include_str!("../../templates/posts/create_post.html")),
    ("posts/follow.html", include_str!("../../templates/posts/follow.html")),
    ("core/404.html", include_str!("../../templates/core/404.html")),
    ("core/500.html", include_str!("../../templates/core/500.html")),
    ("about/author.html", include_str!("../../templates/about/author.html")),
    ("about/tech.html", include_str!("../../templates/about/tech.html")),
];

/// 模板中可用的站点信息
#[derive(Debug, Clone, Serialize)]
struct SiteLocals {
    title: String,
    description: Option<String>,
    login_url: String,
}

#[derive(Clone)]
pub struct ThemeRenderer {
    /// 模板引擎
    tera: Tera,
    site: SiteLocals,
}

impl ThemeRenderer {
    /// 创建渲染器并加载内嵌模板
    pub fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        Self::register_filters(&mut tera);
        debug!("Loaded {} templates", TEMPLATES.len());

        Ok(ThemeRenderer {
            tera,
            site: SiteLocals {
                title: config.title.clone(),
                description: config.description.clone(),
                login_url: config.login_url.clone(),
            },
        })
    }

    /// 注册模板过滤器
    fn register_filters(tera: &mut Tera) {
        tera.register_filter("date_format", Self::date_format_filter);
        tera.register_filter("markdown", Self::markdown_filter);
    }

    /// 每个页面共用的上下文：站点信息和当前用户
    pub fn context(&self, actor: &Actor) -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("site", &self.site);
        context.insert("current_user", &actor.user().map(|u| u.username.clone()));
        context
    }

    /// 渲染模板
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        match self.tera.render(template, context) {
            Ok(html) => Ok(html),
            Err(e) => {
                error!("Failed to render template {}: {:?}", template, e);
                Err(e.into())
            }
        }
    }

    /// 检查模板是否存在
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    fn date_format_filter(value: &tera::Value, args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        if let Some(date) = value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            let format = args
                .get("format")
                .and_then(|f| f.as_str())
                .unwrap_or("%d %b %Y %H:%M");
            Ok(tera::Value::String(date.format(format).to_string()))
        } else {
            Ok(value.clone())
        }
    }

    fn markdown_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        match value.as_str() {
            Some(text) => Ok(tera::Value::String(crate::utils::markdown::render(text))),
            None => Ok(value.clone()),
        }
    }
}
