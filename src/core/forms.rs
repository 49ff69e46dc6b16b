//! 表单输入校验。校验结果要么是清洗后的值，要么是按字段分组的错误。

use serde::{Deserialize, Serialize};

use crate::core::error::FieldErrors;

const REQUIRED: &str = "This field is required.";

/// 表单字段的展示信息
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldMeta {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
}

/// 图片字段的变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Set(String),
    Clear,
}

impl ImageChange {
    /// 在已有图片上应用变化
    pub fn apply(self, current: Option<String>) -> Option<String> {
        match self {
            ImageChange::Keep => current,
            ImageChange::Set(image) => Some(image),
            ImageChange::Clear => None,
        }
    }
}

/// 帖子表单（创建和编辑共用）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    /// 分组别名，空串表示不选分组
    pub group: String,
    /// 图片引用，空串表示不修改
    pub image: String,
    /// 勾选后清除已有图片
    pub clear_image: Option<String>,
}

/// 校验通过的帖子输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInput {
    pub text: String,
    pub group_slug: Option<String>,
    pub image: ImageChange,
}

impl PostInput {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            group_slug: None,
            image: ImageChange::Keep,
        }
    }

    pub fn in_group(mut self, slug: &str) -> Self {
        self.group_slug = Some(slug.to_string());
        self
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = ImageChange::Set(image.to_string());
        self
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn require_text(errors: &mut FieldErrors, field: &str, value: &str) -> Option<String> {
    let text = non_blank(value);
    if text.is_none() {
        errors
            .entry(field.to_string())
            .or_default()
            .push(REQUIRED.to_string());
    }
    text
}

/// 单个必填文本字段的校验，返回去掉首尾空白的文本
pub fn required_text(field: &str, value: &str) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();
    require_text(&mut errors, field, value).ok_or(errors)
}

impl PostForm {
    pub const FIELDS: [FieldMeta; 3] = [
        FieldMeta {
            name: "text",
            label: "Text",
            help_text: "Write the text of the post, required",
        },
        FieldMeta {
            name: "group",
            label: "Group",
            help_text: "Group of the post, may be left empty",
        },
        FieldMeta {
            name: "image",
            label: "Image",
            help_text: "You can attach an image",
        },
    ];

    /// 用已有帖子预填编辑表单
    pub fn prefilled(text: &str, group_slug: Option<&str>, image: Option<&str>) -> Self {
        Self {
            text: text.to_string(),
            group: group_slug.unwrap_or_default().to_string(),
            image: image.unwrap_or_default().to_string(),
            clear_image: None,
        }
    }

    pub fn validate(&self) -> Result<PostInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let text = require_text(&mut errors, "text", &self.text);
        let image = if self.clear_image.is_some() {
            ImageChange::Clear
        } else {
            non_blank(&self.image).map_or(ImageChange::Keep, ImageChange::Set)
        };
        match text {
            Some(text) if errors.is_empty() => Ok(PostInput {
                text,
                group_slug: non_blank(&self.group),
                image,
            }),
            _ => Err(errors),
        }
    }
}

/// 评论表单
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub const FIELDS: [FieldMeta; 1] = [FieldMeta {
        name: "text",
        label: "Comment",
        help_text: "Write the text of the comment, required",
    }];

    pub fn validate(&self) -> Result<String, FieldErrors> {
        required_text("text", &self.text)
    }
}
