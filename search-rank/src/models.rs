use std::collections::{HashMap, HashSet};
use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utils_common::compression;
use utils_common::models::{ArticleMetadata, IndexMetadata};

/// 排序索引 - 存储所有文章和分类/标签索引
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RankIndex {
    /// 所有文章的元数据列表
    pub articles: Vec<ArticleMetadata>,
    /// 分类索引: 分类名 -> 文章ID列表
    pub category_index: HashMap<String, HashSet<usize>>,
    /// 标签索引: 标签名 -> 文章ID列表
    pub tag_index: HashMap<String, HashSet<usize>>,
    /// 索引元数据
    pub metadata: IndexMetadata,
}

impl RankIndex {
    /// 从压缩的二进制数据恢复索引
    pub fn from_compressed(data: &[u8]) -> Result<Self, io::Error> {
        compression::from_compressed_with_max_version(data, 1)
    }
}

/// 筛选参数 - 客户端传递的筛选与排序条件
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchFilters {
    /// 分类筛选: "all" 或具体分类名
    #[serde(default = "default_category")]
    pub category: String,
    /// 排序方式: "relevance", "date", "views", "likes"
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// 时间范围: "all", "week", "month", "year"
    #[serde(default = "default_time_range")]
    pub time_range: String,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            category: default_category(),
            sort_by: default_sort_by(),
            time_range: default_time_range(),
        }
    }
}

/// 默认分类筛选
fn default_category() -> String {
    "all".to_string()
}

/// 默认排序方式
fn default_sort_by() -> String {
    "relevance".to_string()
}

/// 默认时间范围
fn default_time_range() -> String {
    "all".to_string()
}

/// 排序结果 - 文章及其相关性得分，仅在单次调用内有效
#[derive(Debug, Clone)]
pub struct RankedResult {
    /// 文章元数据
    pub article: ArticleMetadata,
    /// 相关性得分
    pub score: f64,
}

/// 排序请求结构
#[derive(Deserialize, Debug)]
pub struct RankRequest {
    /// 搜索查询
    pub query: String,
    /// 筛选与排序条件
    #[serde(flatten)]
    pub filters: SearchFilters,
    /// 计算时间基准（RFC 3339），缺省为当前时间
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

/// 排序结果条目
#[derive(Serialize, Debug, Clone)]
pub struct RankResultItem {
    /// 文章ID
    pub id: String,
    /// 文章标题
    pub title: String,
    /// 文章摘要
    pub excerpt: String,
    /// 文章URL
    pub url: String,
    /// 文章分类
    pub category: String,
    /// 文章标签列表
    pub tags: Vec<String>,
    /// 发布日期
    pub date: DateTime<Utc>,
    /// 相关性得分
    pub score: f64,
}

/// 排序结果
#[derive(Serialize, Debug)]
pub struct RankResponse {
    /// 结果条目，已按请求的方式排序并截断
    pub items: Vec<RankResultItem>,
    /// 结果总数
    pub total: usize,
    /// 执行耗时(毫秒)
    pub time_ms: usize,
    /// 搜索查询
    pub query: String,
}
