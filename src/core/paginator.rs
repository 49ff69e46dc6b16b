use serde::Serialize;

/// 每页帖子数，固定值
pub const POSTS_PER_PAGE: usize = 10;

/// 请求的页码（从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    Number(i64),
    /// 缺失或无法解析的页码
    Default,
}

impl PageRequest {
    /// 解析查询参数 `?page=`
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            Some(n) => PageRequest::Number(n),
            None => PageRequest::Default,
        }
    }

    pub fn first() -> Self {
        PageRequest::Number(1)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::Default
    }
}

/// 一页结果
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 当前页码
    pub number: usize,
    /// 总页数
    pub num_pages: usize,
    /// 总条目数
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn next_page_number(&self) -> Option<usize> {
        self.has_next.then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<usize> {
        self.has_previous.then(|| self.number - 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 转换条目类型，分页信息不变
    pub fn map<U, F: FnOnce(Vec<T>) -> Vec<U>>(self, f: F) -> Page<U> {
        Page {
            items: f(self.items),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// 分页器
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    /// 总页数；空列表也有一页
    pub fn num_pages(&self) -> usize {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// 把请求解析成有效页码：无法解析时取第一页，越界时取最后一页
    pub fn resolve(&self, request: PageRequest) -> usize {
        let last = self.num_pages();
        match request {
            PageRequest::Default => 1,
            PageRequest::Number(n) if n < 1 => last,
            PageRequest::Number(n) => usize::try_from(n).map_or(last, |n| n.min(last)),
        }
    }

    /// 取出对应页的条目
    pub fn page<T>(&self, items: Vec<T>, request: PageRequest) -> Page<T> {
        let number = self.resolve(request);
        let num_pages = self.num_pages();
        let start = (number - 1) * self.per_page;
        let items: Vec<T> = items.into_iter().skip(start).take(self.per_page).collect();
        Page {
            items,
            number,
            num_pages,
            count: self.count,
            has_next: number < num_pages,
            has_previous: number > 1,
        }
    }
}

/// 按固定页大小分页
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    Paginator::new(items.len(), POSTS_PER_PAGE).page(items, request)
}
