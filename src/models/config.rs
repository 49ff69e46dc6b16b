use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use anyhow::{bail, Context, Result};

/// 缓存有效期的上限（秒），再大就超出时间类型的表示范围
pub const MAX_CACHE_TTL_SECONDS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 站点标题
    pub title: String,
    /// 站点描述
    pub description: Option<String>,
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 携带已认证用户名的请求头，由前置的认证服务写入
    pub auth_header: String,
    /// 未登录时跳转的登录地址
    pub login_url: String,
    /// 图片附件目录（相对站点目录）
    pub media_dir: String,
    /// 页面缓存
    pub cache: CacheConfig,
    /// 启动时创建的用户和分组
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存有效期（秒）
    pub ttl_seconds: u64,
    /// 首页缓存键前缀
    pub key_prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub users: Vec<SeedUser>,
    pub groups: Vec<SeedGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedGroup {
    pub title: String,
    /// 为空时由标题生成
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Yatube".to_string(),
            description: None,
            host: "127.0.0.1".to_string(),
            port: 8000,
            auth_header: "x-remote-user".to_string(),
            login_url: "/auth/login/".to_string(),
            media_dir: "media".to_string(),
            cache: CacheConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 20,
            key_prefix: "index_page".to_string(),
        }
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// 检查取值范围
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_seconds > MAX_CACHE_TTL_SECONDS {
            bail!(
                "cache.ttl_seconds must not exceed {}, got {}",
                MAX_CACHE_TTL_SECONDS,
                self.cache.ttl_seconds
            );
        }
        Ok(())
    }

    /// 加载配置，文件不存在时使用默认值
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
title: Test blog
cache:
  ttl_seconds: 5
seed:
  users:
    - username: robot
  groups:
    - title: Cats
      description: about cats
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "Test blog");
        assert_eq!(config.port, 8000);
        assert_eq!(config.cache.ttl_seconds, 5);
        assert_eq!(config.cache.key_prefix, "index_page");
        assert_eq!(config.seed.users[0].username, "robot");
        assert_eq!(config.seed.groups[0].slug, None);
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        let config: Config = serde_yaml::from_str("cache:\n  ttl_seconds: 100000000000000000\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ttl_seconds"));

        let mut config = Config::default();
        config.cache.ttl_seconds = MAX_CACHE_TTL_SECONDS;
        assert!(config.validate().is_ok());
    }
}
