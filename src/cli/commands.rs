use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use yatube::core::{Blog, Server};
use yatube::models::Config;

/// 配置文件名
const CONFIG_FILE: &str = "_config.yml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 指定站点目录
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 在站点目录中写入默认配置
    Init(InitArgs),

    /// 启动服务
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// 站点标题
    #[arg(short, long)]
    pub title: Option<String>,

    /// 覆盖已有的配置文件
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// 监听端口，默认取配置文件中的值
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 监听地址，默认取配置文件中的值
    #[arg(long)]
    pub host: Option<String>,
}

// 默认配置模板
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# 站点信息
title: {title}
description: 'Posts, groups and the authors you follow'

# 服务
host: 127.0.0.1
port: 8000

# 认证由前置服务完成，它把用户名写入这个请求头
auth_header: x-remote-user
login_url: /auth/login/

# 图片附件目录
media_dir: media

# 首页缓存
cache:
  ttl_seconds: 20
  key_prefix: index_page

# 启动时创建的用户和分组
seed:
  users:
    - username: admin
  groups:
    - title: General
      slug: general
      description: 'Everything else'
"#;

fn init_site(site_path: &Path, args: InitArgs) -> Result<()> {
    let config_path = site_path.join(CONFIG_FILE);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists, use --force to overwrite it",
            config_path.display()
        );
    }

    let title = args.title.unwrap_or_else(|| "Yatube".to_string());
    let content = DEFAULT_CONFIG_TEMPLATE.replace("{title}", &title);
    // 写入前确认模板能被解析，附件目录取模板里的 media_dir
    let config: Config =
        serde_yaml::from_str(&content).context("Default config template is invalid")?;

    let media_path = site_path.join(&config.media_dir);
    fs::create_dir_all(&media_path)
        .with_context(|| format!("Failed to create {}", media_path.display()))?;
    fs::write(&config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    info!("Initialized new site at: {}", site_path.display());
    Ok(())
}

async fn serve(site_path: &Path, args: ServeArgs) -> Result<()> {
    let mut config = Config::load_or_default(&site_path.join(CONFIG_FILE))?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    let blog = Blog::new(config).context("Failed to seed initial data")?;
    let server = Server::new(blog, site_path.to_path_buf())?;
    server.start().await
}

/// 执行命令
pub async fn execute(cli: Cli) -> Result<()> {
    let site_path = cli.path.clone();

    match cli.command {
        Commands::Init(args) => init_site(&site_path, args)?,
        Commands::Serve(args) => serve(&site_path, args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_parses() {
        let content = DEFAULT_CONFIG_TEMPLATE.replace("{title}", "Test");
        let config: Config = serde_yaml::from_str(&content).unwrap();
        assert_eq!(config.title, "Test");
        assert_eq!(config.cache.ttl_seconds, 20);
        assert_eq!(config.seed.groups[0].slug.as_deref(), Some("general"));
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("yatube-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn init_creates_configured_media_dir() {
        let site = scratch_dir("init");
        let args = InitArgs {
            title: Some("Scratch".to_string()),
            force: false,
        };
        init_site(&site, args).unwrap();

        let config = Config::from_file(&site.join(CONFIG_FILE)).unwrap();
        assert_eq!(config.title, "Scratch");
        assert!(site.join(&config.media_dir).is_dir());

        let again = InitArgs {
            title: None,
            force: false,
        };
        assert!(init_site(&site, again).is_err());
        fs::remove_dir_all(&site).unwrap();
    }
}
