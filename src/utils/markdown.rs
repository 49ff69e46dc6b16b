use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

/// 链接和图片允许的协议；没有协议的相对地址也允许
const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// 将帖子正文按 Markdown 渲染为 HTML。
/// 原始 HTML 会被转义，协议不在白名单内的链接和图片地址被替换为空。
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        Event::Start(tag) => Event::Start(sanitize_tag(tag)),
        Event::End(tag) => Event::End(sanitize_tag(tag)),
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn sanitize_tag(tag: Tag<'_>) -> Tag<'_> {
    match tag {
        Tag::Link(kind, dest, title) => Tag::Link(kind, sanitize_url(dest), title),
        Tag::Image(kind, dest, title) => Tag::Image(kind, sanitize_url(dest), title),
        other => other,
    }
}

fn sanitize_url(dest: CowStr<'_>) -> CowStr<'_> {
    if is_safe_url(&dest) {
        dest
    } else {
        CowStr::Borrowed("")
    }
}

/// 浏览器解析协议前会丢掉空白和控制字符，判断时同样忽略它们
fn is_safe_url(url: &str) -> bool {
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    let scheme_end = cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(idx) if cleaned[idx..].starts_with(':') => {
            let scheme = cleaned[..idx].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}
