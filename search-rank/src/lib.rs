use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use wasm_bindgen::prelude::*;
use web_sys::console;

use utils_common::models::{ArticleMetadata, IndexMetadata};

use crate::models::{RankIndex, RankRequest, RankResponse, RankResultItem, RankedResult, SearchFilters};

pub mod builder;
pub mod debounce;
pub mod models;

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// 结果列表的最大长度
pub const RESULT_CAP: usize = 20;

// 各匹配字段的权重
const TITLE_EXACT: f64 = 200.0;
const TITLE_CONTAINS: f64 = 100.0;
const TITLE_TOKEN: f64 = 50.0;
const CATEGORY_CONTAINS: f64 = 80.0;
const TAG_CONTAINS: f64 = 60.0;
const TAG_TOKEN: f64 = 30.0;
const EXCERPT_CONTAINS: f64 = 40.0;
const EXCERPT_TOKEN: f64 = 20.0;
const BODY_CONTAINS: f64 = 20.0;
const BODY_TOKEN_OCCURRENCE: f64 = 5.0;
const BODY_TOKEN_CAP: f64 = 25.0;

// 热度与时间加成
const VIEW_BOOST: f64 = 2.0;
const LIKE_BOOST: f64 = 3.0;
const RECENCY_WEEK: f64 = 40.0;
const RECENCY_MONTH: f64 = 20.0;
const FEATURED_BOOST: f64 = 30.0;

/// 全局索引存储
static INDEX: OnceCell<Mutex<Option<RankIndex>>> = OnceCell::new();

/// 对候选文章按查询相关性排序
///
/// 纯函数：时间基准由now参数显式传入，相同输入必然产生相同输出。
/// 流程：先对全部候选打分并丢弃无文本匹配的文章，再依次应用分类筛选、
/// 时间范围筛选和排序，最后截断到RESULT_CAP条。
pub fn rank(
    query: &str,
    articles: &[ArticleMetadata],
    filters: &SearchFilters,
    now: DateTime<Utc>,
) -> Vec<RankedResult> {
    // 空查询直接返回空结果，不进行打分
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let terms = split_query_to_terms(&query);

    // 对全部候选打分，丢弃没有文本匹配的文章
    let mut results: Vec<RankedResult> = articles
        .iter()
        .filter_map(|article| {
            let score = score_article(article, &query, &terms, now);
            if score > 0.0 {
                Some(RankedResult {
                    article: article.clone(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    // 分类筛选在打分之后应用
    match filters.category.as_str() {
        "all" | "" => {}
        category => results.retain(|r| r.article.category == category),
    }

    // 时间范围筛选
    if let Some(days) = time_range_days(&filters.time_range) {
        results.retain(|r| now.signed_duration_since(r.article.date) <= Duration::days(days));
    }

    // 排序；未知的排序方式回退到相关性排序
    match filters.sort_by.as_str() {
        "date" => results.sort_by(|a, b| b.article.date.cmp(&a.article.date)),
        "views" => results.sort_by(|a, b| b.article.view_count.cmp(&a.article.view_count)),
        "likes" => results.sort_by(|a, b| b.article.like_count.cmp(&a.article.like_count)),
        _ => results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }

    results.truncate(RESULT_CAP);
    results
}

/// 分割查询为词条，长度不超过2个字符的词条视为噪声丢弃
fn split_query_to_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|term| term.chars().count() > 2)
        .map(|term| term.to_string())
        .collect()
}

/// 计算单篇文章的相关性得分
///
/// 没有任何文本匹配时返回0，热度和时间加成不参与，
/// 保证纯靠热度无法让不相关的文章进入结果。
fn score_article(
    article: &ArticleMetadata,
    query: &str,
    terms: &[String],
    now: DateTime<Utc>,
) -> f64 {
    let mut text_score = 0.0;

    // 标题匹配：完全相等、包含完整查询、包含单个词条
    let title = article.title.to_lowercase();
    if title == query {
        text_score += TITLE_EXACT;
    } else if title.contains(query) {
        text_score += TITLE_CONTAINS;
    }
    for term in terms {
        if title.contains(term.as_str()) {
            text_score += TITLE_TOKEN;
        }
    }

    // 分类匹配
    if article.category.to_lowercase().contains(query) {
        text_score += CATEGORY_CONTAINS;
    }

    // 标签匹配
    for tag in &article.tags {
        let tag = tag.to_lowercase();
        if tag.contains(query) {
            text_score += TAG_CONTAINS;
        }
        for term in terms {
            if tag.contains(term.as_str()) {
                text_score += TAG_TOKEN;
            }
        }
    }

    // 摘要匹配
    let excerpt = article.excerpt.to_lowercase();
    if excerpt.contains(query) {
        text_score += EXCERPT_CONTAINS;
    }
    for term in terms {
        if excerpt.contains(term.as_str()) {
            text_score += EXCERPT_TOKEN;
        }
    }

    // 正文匹配：每个词条按出现次数计分，单词条封顶，防止长文靠重复刷分
    let content = article.content.to_lowercase();
    if content.contains(query) {
        text_score += BODY_CONTAINS;
    }
    for term in terms {
        let occurrences = count_occurrences(&content, term) as f64;
        text_score += (occurrences * BODY_TOKEN_OCCURRENCE).min(BODY_TOKEN_CAP);
    }

    if text_score <= 0.0 {
        return 0.0;
    }

    // 热度加成：自然对数压缩大数值
    let mut score = text_score;
    score += VIEW_BOOST * f64::from(article.view_count + 1).ln();
    score += LIKE_BOOST * f64::from(article.like_count + 1).ln();

    // 时间加成：7天内+40，30天内+20，两者不叠加
    let age = now.signed_duration_since(article.date);
    if age < Duration::days(7) {
        score += RECENCY_WEEK;
    } else if age < Duration::days(30) {
        score += RECENCY_MONTH;
    }

    // 精选加成
    if article.featured {
        score += FEATURED_BOOST;
    }

    score
}

/// 统计needle在haystack中不重叠出现的次数
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        count += 1;
        start += pos + needle.len();
    }
    count
}

/// 解析时间范围为天数，未知的取值视为不限制
fn time_range_days(time_range: &str) -> Option<i64> {
    match time_range {
        "week" => Some(7),
        "month" => Some(30),
        "year" => Some(365),
        _ => None,
    }
}

/// 文章排序器 - 基于全局索引处理排序请求
pub struct ArticleRanker;

impl ArticleRanker {
    /// 加载索引数据到全局存储，重复加载会替换旧索引
    pub fn load_index(data: &[u8]) -> Result<(), String> {
        let index = RankIndex::from_compressed(data).map_err(|e| format!("解析索引失败: {}", e))?;

        let cell = INDEX.get_or_init(|| Mutex::new(None));
        let mut guard = cell.lock().map_err(|_| "获取索引锁失败")?;
        *guard = Some(index);
        Ok(())
    }

    /// 在全局索引上执行操作
    fn with_index<R>(f: impl FnOnce(&RankIndex) -> R) -> Result<R, String> {
        let index_mutex = INDEX.get().ok_or("索引未初始化")?;
        let index_guard = index_mutex.lock().map_err(|_| "获取索引锁失败")?;
        let index = index_guard.as_ref().ok_or("索引为空")?;
        Ok(f(index))
    }

    /// 获取所有分类
    pub fn categories() -> Result<Vec<String>, String> {
        Self::with_index(|index| index.category_index.keys().cloned().collect())
    }

    /// 获取所有标签
    pub fn tags() -> Result<Vec<String>, String> {
        Self::with_index(|index| index.tag_index.keys().cloned().collect())
    }

    /// 获取索引元数据
    pub fn index_metadata() -> Result<IndexMetadata, String> {
        Self::with_index(|index| index.metadata.clone())
    }

    /// 处理排序请求
    pub fn rank_articles(request: &RankRequest) -> Result<RankResponse, String> {
        Self::with_index(|index| {
            let now = request.now.unwrap_or_else(Utc::now);
            let ranked = rank(&request.query, &index.articles, &request.filters, now);

            let items: Vec<RankResultItem> = ranked
                .into_iter()
                .map(|result| RankResultItem {
                    id: result.article.id,
                    title: result.article.title,
                    excerpt: result.article.excerpt,
                    url: result.article.url,
                    category: result.article.category,
                    tags: result.article.tags,
                    date: result.article.date,
                    score: result.score,
                })
                .collect();

            RankResponse {
                total: items.len(),
                items,
                time_ms: 0, // 由JS入口填充
                query: request.query.clone(),
            }
        })
    }
}

/// 初始化函数 - 设置错误处理
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// 版本信息
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// 文章排序器JS接口 - 提供给JavaScript使用的排序API
#[wasm_bindgen]
pub struct ArticleRankerJS;

#[wasm_bindgen]
impl ArticleRankerJS {
    /// 初始化排序器并加载索引
    #[wasm_bindgen]
    pub fn init(index_data: &[u8]) -> Result<(), JsValue> {
        console_error_panic_hook::set_once();

        ArticleRanker::load_index(index_data).map_err(|e| {
            console::log_1(&JsValue::from_str(&format!("初始化排序器失败: {}", e)));
            JsValue::from_str(&e)
        })
    }

    /// 执行排序请求，返回JSON格式的结果
    #[wasm_bindgen]
    pub fn rank(request_json: &str) -> Result<String, JsValue> {
        let start_time = web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or(0.0);

        // 解析排序请求
        let request: RankRequest = serde_json::from_str(request_json)
            .map_err(|e| JsValue::from_str(&format!("解析排序请求失败: {}", e)))?;

        // 执行排序
        let mut response =
            ArticleRanker::rank_articles(&request).map_err(|e| JsValue::from_str(&e))?;

        // 计算执行时间
        let end_time = web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or(0.0);
        response.time_ms = (end_time - start_time) as usize;

        // 序列化结果
        serde_json::to_string(&response)
            .map_err(|e| JsValue::from_str(&format!("序列化排序结果失败: {}", e)))
    }

    /// 获取所有分类
    #[wasm_bindgen]
    pub fn categories() -> Result<JsValue, JsValue> {
        let categories = ArticleRanker::categories().map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&categories)
            .map_err(|e| JsValue::from_str(&format!("序列化分类失败: {}", e)))
    }

    /// 获取所有标签
    #[wasm_bindgen]
    pub fn tags() -> Result<JsValue, JsValue> {
        let tags = ArticleRanker::tags().map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&tags)
            .map_err(|e| JsValue::from_str(&format!("序列化标签失败: {}", e)))
    }

    /// 获取索引元数据
    #[wasm_bindgen]
    pub fn metadata() -> Result<JsValue, JsValue> {
        let metadata = ArticleRanker::index_metadata().map_err(|e| JsValue::from_str(&e))?;

        serde_wasm_bindgen::to_value(&metadata)
            .map_err(|e| JsValue::from_str(&format!("序列化元数据失败: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// 测试用的固定时间基准
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn article(id: &str, title: &str) -> ArticleMetadata {
        ArticleMetadata {
            id: id.to_string(),
            title: title.to_string(),
            excerpt: String::new(),
            category: String::new(),
            tags: Vec::new(),
            date: days_ago(100),
            url: format!("/{}", id),
            content: String::new(),
            view_count: 0,
            like_count: 0,
            featured: false,
            page_type: "article".to_string(),
        }
    }

    /// 规格中的三篇示例文章：A标题匹配且最新，B只有标签匹配但点赞很多，C标题匹配但较旧
    fn sample_articles() -> Vec<ArticleMetadata> {
        let mut a = article("a", "React Hooks Guide");
        a.category = "React".to_string();
        a.like_count = 10;
        a.date = days_ago(0);

        let mut b = article("b", "CSS Basics");
        b.category = "CSS".to_string();
        b.tags = vec!["react".to_string()];
        b.like_count = 1000;
        b.date = days_ago(730);

        let mut c = article("c", "Intro to React");
        c.category = "React".to_string();
        c.like_count = 5;
        c.date = days_ago(40);

        vec![a, b, c]
    }

    #[test]
    fn empty_query_returns_nothing() {
        let articles = sample_articles();
        assert!(rank("", &articles, &SearchFilters::default(), now()).is_empty());
        assert!(rank("   \t ", &articles, &SearchFilters::default(), now()).is_empty());
    }

    #[test]
    fn title_match_and_recency_beat_tag_only_popularity() {
        let results = rank("react", &sample_articles(), &SearchFilters::default(), now());

        let ids: Vec<&str> = results.iter().map(|r| r.article.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn exact_title_outscores_partial_tag_match() {
        let mut exact = article("exact", "rust");
        exact.date = days_ago(500);

        let mut tagged = article("tagged", "Weekly Notes");
        tagged.tags = vec!["rust".to_string()];
        tagged.like_count = 500;
        tagged.view_count = 10_000;
        tagged.date = days_ago(500);

        let results = rank(
            "rust",
            &[tagged, exact],
            &SearchFilters::default(),
            now(),
        );
        assert_eq!(results[0].article.id, "exact");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn no_textual_match_is_excluded_despite_boosts() {
        let mut popular = article("popular", "Cooking Pasta");
        popular.view_count = 1_000_000;
        popular.like_count = 50_000;
        popular.featured = true;
        popular.date = days_ago(1);

        let results = rank("rust", &[popular], &SearchFilters::default(), now());
        assert!(results.is_empty());
    }

    #[test]
    fn result_list_is_capped() {
        let articles: Vec<ArticleMetadata> = (0..35)
            .map(|i| article(&format!("a{}", i), &format!("Rust tips #{}", i)))
            .collect();

        let results = rank("rust", &articles, &SearchFilters::default(), now());
        assert_eq!(results.len(), RESULT_CAP);
    }

    #[test]
    fn short_terms_are_noise_but_whole_query_still_matches() {
        // 词条"go"和"is"被丢弃，只有"fun"参与词条匹配
        let fun = article("fun", "Why programming is fun");
        let go = article("go", "A go tutorial");
        let whole = article("whole", "Reasons why go is fun");

        let results = rank("go is fun", &[fun, go, whole], &SearchFilters::default(), now());
        let ids: Vec<&str> = results.iter().map(|r| r.article.id.as_str()).collect();

        // "go"只出现在被丢弃的词条里，没有其他匹配
        assert!(!ids.contains(&"go"));
        assert!(ids.contains(&"fun"));
        // 完整查询"go is fun"作为子串仍然匹配
        assert!(ids.contains(&"whole"));
    }

    #[test]
    fn body_repetition_is_capped_per_term() {
        let mut spam = article("spam", "Notes");
        spam.content = "rust ".repeat(50);

        let mut modest = article("modest", "Notes");
        modest.content = "rust rust rust rust rust and other things".to_string();

        let results = rank("rust", &[spam, modest], &SearchFilters::default(), now());
        assert_eq!(results.len(), 2);
        // 两篇都达到正文词条计分上限，得分相同
        assert!((results[0].score - results[1].score).abs() < f64::EPSILON);
    }

    #[test]
    fn recency_bonus_replaces_instead_of_stacking() {
        let mut fresh = article("fresh", "Rust Guide");
        fresh.date = days_ago(3);

        let mut recent = article("recent", "Rust Guide");
        recent.date = days_ago(10);

        let mut old = article("old", "Rust Guide");
        old.date = days_ago(200);

        let results = rank(
            "rust",
            &[fresh, recent, old],
            &SearchFilters::default(),
            now(),
        );
        let score_of = |id: &str| {
            results
                .iter()
                .find(|r| r.article.id == id)
                .map(|r| r.score)
                .unwrap()
        };

        // 7天内+40，30天内+20，不叠加
        assert!((score_of("fresh") - score_of("old") - 40.0).abs() < f64::EPSILON);
        assert!((score_of("recent") - score_of("old") - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn category_filter_keeps_exact_matches_only() {
        let filters = SearchFilters {
            category: "CSS".to_string(),
            ..SearchFilters::default()
        };

        let results = rank("react", &sample_articles(), &filters, now());
        // B靠标签匹配得分为正，分类筛选后只剩它
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].article.id, "b");
        assert!(results.iter().all(|r| r.article.category == "CSS"));
    }

    #[test]
    fn category_filter_cannot_resurrect_unmatched_articles() {
        // 打分在筛选之前：没有文本匹配的文章即使分类吻合也不出现
        let mut unrelated = article("unrelated", "Flexbox Layout");
        unrelated.category = "CSS".to_string();
        unrelated.view_count = 9999;

        let filters = SearchFilters {
            category: "CSS".to_string(),
            ..SearchFilters::default()
        };
        let results = rank("react", &[unrelated], &filters, now());
        assert!(results.is_empty());
    }

    #[test]
    fn week_time_range_excludes_older_articles() {
        let mut fresh = article("fresh", "Rust Guide");
        fresh.date = days_ago(2);
        let mut stale = article("stale", "Rust Guide");
        stale.date = days_ago(8);

        let filters = SearchFilters {
            time_range: "week".to_string(),
            ..SearchFilters::default()
        };
        let results = rank("rust", &[fresh, stale], &filters, now());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].article.id, "fresh");
    }

    #[test]
    fn date_sort_is_non_increasing() {
        let mut articles = Vec::new();
        for (i, days) in [300, 5, 90, 45, 1].iter().enumerate() {
            let mut a = article(&format!("a{}", i), "Rust Notes");
            a.date = days_ago(*days);
            articles.push(a);
        }

        let filters = SearchFilters {
            sort_by: "date".to_string(),
            ..SearchFilters::default()
        };
        let results = rank("rust", &articles, &filters, now());

        assert_eq!(results.len(), articles.len());
        for pair in results.windows(2) {
            assert!(pair[0].article.date >= pair[1].article.date);
        }
    }

    #[test]
    fn views_sort_is_non_increasing() {
        let mut articles = Vec::new();
        for (i, views) in [10u32, 9000, 0, 400].iter().enumerate() {
            let mut a = article(&format!("a{}", i), "Rust Notes");
            a.view_count = *views;
            articles.push(a);
        }

        let filters = SearchFilters {
            sort_by: "views".to_string(),
            ..SearchFilters::default()
        };
        let results = rank("rust", &articles, &filters, now());

        for pair in results.windows(2) {
            assert!(pair[0].article.view_count >= pair[1].article.view_count);
        }
    }

    #[test]
    fn likes_sort_is_non_increasing() {
        let mut articles = Vec::new();
        for (i, likes) in [7u32, 0, 120].iter().enumerate() {
            let mut a = article(&format!("a{}", i), "Rust Notes");
            a.like_count = *likes;
            articles.push(a);
        }

        let filters = SearchFilters {
            sort_by: "likes".to_string(),
            ..SearchFilters::default()
        };
        let results = rank("rust", &articles, &filters, now());

        for pair in results.windows(2) {
            assert!(pair[0].article.like_count >= pair[1].article.like_count);
        }
    }

    #[test]
    fn malformed_filter_values_fall_back_to_defaults() {
        let articles = sample_articles();
        let bogus = SearchFilters {
            category: "all".to_string(),
            sort_by: "bogus".to_string(),
            time_range: "fortnight".to_string(),
        };

        let with_bogus = rank("react", &articles, &bogus, now());
        let with_defaults = rank("react", &articles, &SearchFilters::default(), now());

        let ids = |rs: &[RankedResult]| {
            rs.iter()
                .map(|r| r.article.id.clone())
                .collect::<Vec<String>>()
        };
        assert_eq!(ids(&with_bogus), ids(&with_defaults));
    }

    #[test]
    fn ranking_is_idempotent_for_fixed_now() {
        let articles = sample_articles();
        let filters = SearchFilters::default();

        let first = rank("react", &articles, &filters, now());
        let second = rank("react", &articles, &filters, now());

        assert_eq!(first.len(), second.len());
        for (x, y) in first.iter().zip(second.iter()) {
            assert_eq!(x.article.id, y.article.id);
            assert!((x.score - y.score).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn request_json_defaults_and_global_index_round_trip() {
        use crate::builder::RankBuilder;
        use utils_common::compression::to_compressed;

        // 构建索引并通过压缩容器加载到全局存储
        let mut builder = RankBuilder::new();
        for article in sample_articles() {
            builder.add_article(article);
        }
        let index = builder.build_rank_index().unwrap();
        let data = to_compressed(&index, [1, 0]).unwrap();
        ArticleRanker::load_index(&data).unwrap();

        // 缺省筛选字段通过serde默认值补齐
        let request: RankRequest = serde_json::from_str(
            &format!(r#"{{"query":"react","now":"{}"}}"#, now().to_rfc3339()),
        )
        .unwrap();
        assert_eq!(request.filters.category, "all");
        assert_eq!(request.filters.sort_by, "relevance");
        assert_eq!(request.filters.time_range, "all");

        let response = ArticleRanker::rank_articles(&request).unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(response.items[0].id, "a");
        assert_eq!(response.query, "react");
    }

    #[test]
    fn count_occurrences_is_non_overlapping() {
        assert_eq!(count_occurrences("aaaa", "aa"), 2);
        assert_eq!(count_occurrences("rust and rust", "rust"), 2);
        assert_eq!(count_occurrences("rust", ""), 0);
        assert_eq!(count_occurrences("", "rust"), 0);
    }
}
