use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;

use chrono::Utc;
use utils_common::compression::to_compressed;
use utils_common::models::{ArticleMetadata, IndexMetadata};

use crate::models::RankIndex;

/// 排序索引构建器
pub struct RankBuilder {
    articles: Vec<ArticleMetadata>,
}

impl RankBuilder {
    /// 创建新的排序索引构建器
    pub fn new() -> Self {
        Self {
            articles: Vec::new(),
        }
    }

    /// 获取索引构建器中的文章数量
    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    /// 添加文章到索引构建器
    pub fn add_article(&mut self, article: ArticleMetadata) {
        // 只添加非目录页面到索引
        if article.page_type != "directory" {
            self.articles.push(article);
        }
    }

    /// 构建排序索引
    pub fn build_rank_index(&self) -> Result<RankIndex, String> {
        if self.articles.is_empty() {
            return Err("无法构建索引: 没有文章数据".to_string());
        }

        // 创建索引数据结构
        let mut category_index: HashMap<String, HashSet<usize>> = HashMap::new();
        let mut tag_index: HashMap<String, HashSet<usize>> = HashMap::new();

        // 填充索引
        for (i, article) in self.articles.iter().enumerate() {
            // 分类索引
            if !article.category.is_empty() {
                category_index
                    .entry(article.category.clone())
                    .or_insert_with(HashSet::new)
                    .insert(i);
            }

            // 标签索引
            for tag in &article.tags {
                tag_index
                    .entry(tag.clone())
                    .or_insert_with(HashSet::new)
                    .insert(i);
            }
        }

        let metadata = IndexMetadata {
            article_count: self.articles.len(),
            category_count: category_index.len(),
            tag_count: tag_index.len(),
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        Ok(RankIndex {
            articles: self.articles.clone(),
            category_index,
            tag_index,
            metadata,
        })
    }

    /// 保存排序索引到文件
    pub fn save_rank_index(&self, path: &str) -> Result<(), String> {
        let rank_index = self.build_rank_index()?;
        println!(
            "成功构建排序索引，文章: {}，分类: {}，标签: {}",
            rank_index.metadata.article_count,
            rank_index.metadata.category_count,
            rank_index.metadata.tag_count
        );

        // 使用版本号1.0
        let version = [1, 0];
        let compressed_data = to_compressed(&rank_index, version)
            .map_err(|e| format!("压缩排序索引失败: {}", e))?;

        let mut file =
            File::create(path).map_err(|e| format!("无法创建排序索引文件: {}", e))?;
        file.write_all(&compressed_data)
            .map_err(|e| format!("无法写入排序索引文件: {}", e))?;

        println!(
            "排序索引已成功写入文件: {}，大小: {} 字节",
            path,
            compressed_data.len()
        );
        Ok(())
    }
}

impl Default for RankBuilder {
    fn default() -> Self {
        Self::new()
    }
}
