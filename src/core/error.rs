use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::PostId;

/// 表单字段 -> 错误信息列表
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 核心操作的错误类型
#[derive(Error, Debug)]
pub enum BlogError {
    /// 分组别名、用户名或帖子 ID 无法解析
    #[error("未找到: {0}")]
    NotFound(String),

    /// 匿名用户访问需要登录的操作
    #[error("需要登录")]
    Unauthorized,

    /// 已登录但无权操作，调用方应跳回资源详情页
    #[error("无权修改帖子 {post_id}")]
    PolicyRefused { post_id: PostId },

    /// 输入校验失败，没有修改任何数据
    #[error("输入校验失败: {}", format_field_errors(.0))]
    ValidationFailed(FieldErrors),

    /// 唯一约束冲突（用户名、分组别名）
    #[error("已存在: {0}")]
    Conflict(String),

    /// 存储或渲染层的意外错误
    #[error("存储错误: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, BlogError>;

fn format_field_errors(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<tera::Error> for BlogError {
    fn from(e: tera::Error) -> Self {
        BlogError::Storage(format!("模板渲染失败: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_fields() {
        let mut errors = FieldErrors::new();
        errors.insert("text".to_string(), vec!["required".to_string()]);
        let err = BlogError::ValidationFailed(errors);
        assert_eq!(err.to_string(), "输入校验失败: text: required");
    }
}
