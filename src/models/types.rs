use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type UserId = u64;
pub type GroupId = u64;
pub type PostId = u64;
pub type CommentId = u64;
pub type FollowId = u64;

/// 文本在 `Display` 中保留的最大字符数
pub const DISPLAY_TEXT_LEN: usize = 15;

/// 用户（身份认证由外部负责，这里只保存资料）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// 登录名，全局唯一
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    /// 页面上显示的名字，没有姓名时退回登录名
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// 分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// 分组标题
    pub title: String,
    /// 分组别名（用于URL），全局唯一
    pub slug: String,
    /// 分组描述
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// 帖子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// 正文，不能为空
    pub text: String,
    /// 创建时间，创建后不可修改
    pub created_at: DateTime<Utc>,
    /// 作者
    pub author: UserId,
    /// 所属分组，分组被删除时置空
    pub group: Option<GroupId>,
    /// 图片附件的引用路径
    pub image: Option<String>,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::utils::truncate_chars(&self.text, DISPLAY_TEXT_LEN))
    }
}

/// 评论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: UserId,
    pub post: PostId,
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::utils::truncate_chars(&self.text, DISPLAY_TEXT_LEN))
    }
}

/// 关注关系：`user` 关注了 `author`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: FollowId,
    /// 关注者
    pub user: UserId,
    /// 被关注的作者
    pub author: UserId,
}

impl fmt::Display for Follow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.author)
    }
}

/// 分组在页面上的简要信息
#[derive(Debug, Clone, Serialize)]
pub struct GroupRef {
    pub title: String,
    pub slug: String,
}

/// 用于模板渲染的帖子，带上作者和分组信息
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: PostId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub author_name: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

/// 用于模板渲染的评论
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: CommentId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}
