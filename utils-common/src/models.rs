use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 文章元数据 - 存储排序和展示所需的文章基本信息
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ArticleMetadata {
    /// 文章唯一标识符
    pub id: String,
    /// 文章标题
    pub title: String,
    /// 文章摘要
    pub excerpt: String,
    /// 文章分类（单个分类名）
    pub category: String,
    /// 文章标签列表
    pub tags: Vec<String>,
    /// 发布日期
    pub date: DateTime<Utc>,
    /// 文章URL路径
    pub url: String,
    /// 文章正文，用于全文匹配
    #[serde(default)]
    pub content: String,
    /// 浏览次数
    #[serde(default)]
    pub view_count: u32,
    /// 点赞次数
    #[serde(default)]
    pub like_count: u32,
    /// 是否为精选文章
    #[serde(default)]
    pub featured: bool,
    /// 页面类型：article（文章）、page（普通页面）
    #[serde(default = "default_page_type")]
    pub page_type: String,
}

/// 默认页面类型为article
fn default_page_type() -> String {
    "article".to_string()
}

/// 索引元数据 - 存储索引的基本信息
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexMetadata {
    /// 索引包含的文章数量
    pub article_count: usize,
    /// 索引包含的分类数量
    pub category_count: usize,
    /// 索引包含的标签数量
    pub tag_count: usize,
    /// 索引创建时间
    pub created_at: DateTime<Utc>,
    /// 索引版本
    pub version: String,
}
