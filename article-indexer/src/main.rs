use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use clap::{Arg, ArgAction, Command};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::Deserialize;
use walkdir::WalkDir;

use search_rank::builder::RankBuilder;
use utils_common::ArticleMetadata;

/// 文章互动数据 - 从博客后端导出的浏览/点赞统计
#[derive(Deserialize, Debug, Default, Clone)]
struct Engagement {
    /// 浏览次数
    #[serde(default)]
    views: u32,
    /// 点赞次数
    #[serde(default)]
    likes: u32,
    /// 是否为精选文章
    #[serde(default)]
    featured: bool,
}

fn main() {
    // 设置命令行参数
    let matches = Command::new("文章索引生成器")
        .version(env!("CARGO_PKG_VERSION"))
        .about("生成文章排序索引用于站内搜索")
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("SOURCE_DIR")
                .help("已渲染站点的源目录路径")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("索引输出目录路径")
                .required(true),
        )
        .arg(
            Arg::new("engagement")
                .short('e')
                .long("engagement")
                .value_name("FILE")
                .help("互动数据JSON文件路径（文章ID -> 浏览/点赞/精选）"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("显示详细信息")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("index_all")
                .short('a')
                .long("all")
                .help("索引所有页面，包括非文章页面")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    // 获取参数值
    let source_dir = matches.get_one::<String>("source").unwrap();
    let output_dir = matches.get_one::<String>("output").unwrap();
    let engagement_path = matches.get_one::<String>("engagement");
    let verbose = matches.get_flag("verbose");
    let index_all = matches.get_flag("index_all");

    // 检查源目录
    let source_path = Path::new(source_dir);
    if !source_path.exists() || !source_path.is_dir() {
        eprintln!("错误: 源目录不存在或不是有效目录 '{}'", source_dir);
        std::process::exit(1);
    }

    // 创建输出目录
    let output_path = Path::new(output_dir);
    if !output_path.exists() {
        if let Err(e) = fs::create_dir_all(output_path) {
            eprintln!("错误: 无法创建输出目录 '{}': {}", output_dir, e);
            std::process::exit(1);
        }
    }

    println!("开始生成索引...");
    println!("源目录: {}", source_dir);
    println!("输出目录: {}", output_dir);

    // 生成索引
    match generate_index(source_dir, output_dir, engagement_path, verbose, index_all) {
        Ok(_) => println!("索引生成成功！"),
        Err(e) => {
            eprintln!("错误: 索引生成失败: {}", e);
            std::process::exit(1);
        }
    }
}

/// 生成索引的主函数
fn generate_index(
    source_dir: &str,
    output_dir: &str,
    engagement_path: Option<&String>,
    verbose: bool,
    index_all: bool,
) -> Result<(), String> {
    let start_time = std::time::Instant::now();

    // 加载互动数据（可选）
    let engagement = match engagement_path {
        Some(path) => {
            let map = load_engagement(path)?;
            println!("已加载互动数据，共 {} 条记录", map.len());
            map
        }
        None => HashMap::new(),
    };

    // 扫描HTML文件
    println!("扫描HTML文件...");
    let (mut articles, skipped_count) = scan_html_files(source_dir, verbose, index_all)?;
    println!(
        "扫描完成。找到 {} 篇有效文章，跳过 {} 个文件。",
        articles.len(),
        skipped_count
    );

    if articles.is_empty() {
        return Err("没有找到有效文章".to_string());
    }

    // 合并互动数据，缺失的条目保持零值
    for article in &mut articles {
        if let Some(stats) = engagement.get(&article.id) {
            article.view_count = stats.views;
            article.like_count = stats.likes;
            article.featured = stats.featured;
        }
    }

    // 构建并保存排序索引
    let mut builder = RankBuilder::new();
    for article in articles {
        builder.add_article(article);
    }

    println!("正在生成和保存索引...");
    let index_path = format!("{}/rank_index.bin", output_dir);
    builder.save_rank_index(&index_path)?;

    let elapsed = start_time.elapsed();
    println!("索引生成完成！耗时: {:.2}秒", elapsed.as_secs_f32());

    Ok(())
}

/// 加载互动数据文件
fn load_engagement(path: &str) -> Result<HashMap<String, Engagement>, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("无法读取互动数据文件 {}: {}", path, e))?;

    serde_json::from_str(&data).map_err(|e| format!("解析互动数据失败: {}", e))
}

/// 扫描HTML文件并提取文章数据
fn scan_html_files(
    dir_path: &str,
    verbose: bool,
    index_all: bool,
) -> Result<(Vec<ArticleMetadata>, usize), String> {
    let dir_path = Path::new(dir_path);
    let mut articles = Vec::new();
    let mut skipped = 0;

    // 递归遍历目录
    for entry in WalkDir::new(dir_path) {
        let entry = entry.map_err(|e| format!("遍历目录时出错: {}", e))?;

        // 只处理HTML文件
        if !entry.file_type().is_file()
            || !entry.path().extension().map_or(false, |ext| ext == "html")
        {
            continue;
        }

        match extract_article_from_html(entry.path(), dir_path, index_all, verbose) {
            Ok(Some(article)) => articles.push(article),
            Ok(None) => skipped += 1,
            Err(err) => {
                skipped += 1;
                if verbose {
                    eprintln!("解析文件时出错 {}: {}", entry.path().display(), err);
                }
            }
        }
    }

    Ok((articles, skipped))
}

/// 从HTML文件中提取文章元数据
fn extract_article_from_html(
    file_path: &Path,
    base_dir: &Path,
    index_all: bool,
    verbose: bool,
) -> Result<Option<ArticleMetadata>, String> {
    // 跳过已知的非内容文件
    let path_str = file_path.to_string_lossy().replace('\\', "/").to_lowercase();
    if path_str.ends_with("/404.html") || path_str.contains("/search/") {
        return Ok(None);
    }

    let html = fs::read_to_string(file_path)
        .map_err(|e| format!("无法读取文件 {}: {}", file_path.display(), e))?;

    // 解析HTML
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| format!("解析HTML时出错: {}", e))?;

    // 提取元数据标签，og:type是页面类型的权威来源
    let meta_tags = extract_meta_tags(&dom.document);
    let page_type = match meta_tags.get("og:type").map(|t| t.as_str()) {
        Some("article") => "article",
        Some("page") => "page",
        Some("directory") => "directory",
        _ => "unknown",
    };

    // 非--all模式下仅处理article类型
    let should_process = if index_all {
        page_type == "article" || page_type == "page"
    } else {
        page_type == "article"
    };
    if !should_process {
        return Ok(None);
    }

    // 提取标题
    let title = extract_title(&dom.document);
    if title.is_empty() {
        return Ok(None);
    }

    // 提取正文内容，内容太少的可能不是有效内容页面
    let content = extract_content(&dom.document);
    if content.trim().len() < 30 {
        return Ok(None);
    }

    if verbose {
        println!("处理: {}", file_path.display());
    }

    // 相对路径作为文章ID
    let relative_path = file_path
        .strip_prefix(base_dir)
        .map_err(|_| "计算相对路径失败".to_string())?;
    let id = article_id_from_path(relative_path);
    let url = format!("/{}", id);

    // 摘要：优先使用og:description，否则取正文开头
    let excerpt = match meta_tags.get("og:description") {
        Some(description) if !description.trim().is_empty() => description.trim().to_string(),
        _ => {
            let mut excerpt = content.chars().take(200).collect::<String>();
            excerpt.push_str("...");
            excerpt
        }
    };

    // 分类：使用article:section标准格式
    let category = meta_tags
        .get("article:section")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    // 标签：优先使用article:tag标准格式
    let tags = {
        let mut tags = Vec::new();
        for (key, value) in meta_tags.iter() {
            if key == "article:tag" || key == "keywords" {
                tags.extend(value.split(',').map(|s| s.trim().to_string()));
            }
        }
        tags.retain(|tag| !tag.is_empty());
        tags.sort();
        tags.dedup();
        tags
    };

    // 日期：使用article:published_time标准格式
    let date = meta_tags
        .get("article:published_time")
        .and_then(|date_str| {
            chrono::DateTime::parse_from_rfc3339(date_str)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
        .unwrap_or_else(Utc::now);

    Ok(Some(ArticleMetadata {
        id,
        title,
        excerpt,
        category,
        tags,
        date,
        url,
        content,
        view_count: 0,
        like_count: 0,
        featured: false,
        page_type: page_type.to_string(),
    }))
}

/// 从相对路径计算文章ID
fn article_id_from_path(relative_path: &Path) -> String {
    relative_path
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches("index")
        .trim_end_matches('/')
        .to_string()
}

/// 从DOM中提取标题：优先<title>标签，其次<h1>
fn extract_title(handle: &Handle) -> String {
    for tag in ["title", "h1"] {
        if let Some(element) = find_element(handle, tag) {
            let mut text = String::new();
            extract_text_from_node(&element, &mut text);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    String::new()
}

/// 从DOM中提取正文内容，按语义化标签顺序查找内容区
fn extract_content(handle: &Handle) -> String {
    let mut content = String::new();

    for tag in ["article", "main", "body"] {
        if let Some(element) = find_element(handle, tag) {
            extract_text_from_node_filtered(&element, &mut content);
            break;
        }
    }

    // 折叠空白
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 深度优先查找第一个指定标签的元素
fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let NodeData::Element { ref name, .. } = handle.data {
        if name.local.as_ref() == tag {
            return Some(handle.clone());
        }
    }

    for child in handle.children.borrow().iter() {
        if let Some(found) = find_element(child, tag) {
            return Some(found);
        }
    }
    None
}

/// 从DOM中提取元数据标签（name/property -> content）
fn extract_meta_tags(handle: &Handle) -> HashMap<String, String> {
    let mut meta_tags = HashMap::new();
    extract_meta_tags_internal(handle, &mut meta_tags);
    meta_tags
}

/// 递归辅助函数，用于提取元数据标签
fn extract_meta_tags_internal(handle: &Handle, meta_tags: &mut HashMap<String, String>) {
    if let NodeData::Element { ref name, ref attrs, .. } = handle.data {
        if name.local.as_ref() == "meta" {
            let attrs = attrs.borrow();

            // name和property两种写法的meta标签都收集
            let key = attrs
                .iter()
                .find(|attr| {
                    let local = attr.name.local.as_ref();
                    local == "name" || local == "property"
                })
                .map(|attr| attr.value.to_string());
            let content = attrs
                .iter()
                .find(|attr| attr.name.local.as_ref() == "content")
                .map(|attr| attr.value.to_string());

            if let (Some(key), Some(content)) = (key, content) {
                meta_tags.insert(key, content);
            }
        }
    }

    for child in handle.children.borrow().iter() {
        extract_meta_tags_internal(child, meta_tags);
    }
}

/// 从节点提取文本
fn extract_text_from_node(handle: &Handle, text: &mut String) {
    if let NodeData::Text { ref contents } = handle.data {
        text.push_str(&contents.borrow());
        text.push(' ');
        return;
    }

    for child in handle.children.borrow().iter() {
        extract_text_from_node(child, text);
    }
}

/// 从节点提取文本，过滤掉非内容标签
fn extract_text_from_node_filtered(handle: &Handle, text: &mut String) {
    match handle.data {
        NodeData::Element { ref name, ref attrs, .. } => {
            let tag_name = name.local.as_ref();

            // 跳过脚本、样式、导航等非正文区域
            let non_content_tags = [
                "script", "style", "head", "meta", "link", "header", "footer", "nav", "aside",
                "noscript", "iframe", "svg", "path", "button", "input", "form", "select",
                "option", "textarea", "template", "dialog", "canvas",
            ];
            if non_content_tags.contains(&tag_name) {
                return;
            }

            // 通过class/id跳过目录、侧栏、评论等区域
            let attrs = attrs.borrow();
            let is_non_content = attrs.iter().any(|attr| {
                let local = attr.name.local.as_ref();
                if local != "class" && local != "id" {
                    return false;
                }
                let value = attr.value.to_lowercase();
                value.contains("nav")
                    || value.contains("menu")
                    || value.contains("sidebar")
                    || value.contains("comment")
                    || value.contains("related")
                    || value.contains("share")
                    || value.contains("toc")
                    || value.contains("sr-only")
            });
            if is_non_content {
                return;
            }

            for child in handle.children.borrow().iter() {
                extract_text_from_node_filtered(child, text);
            }
        }
        NodeData::Text { ref contents } => {
            let content = contents.borrow();
            if !content.trim().is_empty() {
                text.push_str(&content);
                text.push(' ');
            }
        }
        _ => {
            for child in handle.children.borrow().iter() {
                extract_text_from_node_filtered(child, text);
            }
        }
    }
}
