// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{CrawlerSettings, SelectorSettings};
use crate::domain::models::content::chapter_slug;
use crate::domain::models::crawl_result::ContentType;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use url::Url;

static CHAPTER_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chapter|chap|ch|chuong|chương|episode|ep)[\s._/-]*(\d+(?:[.,]\d+)?)")
        .expect("static chapter regex")
});

static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*$").expect("static chapter regex"));

/// 页面解析错误
#[derive(Error, Debug)]
pub enum ExtractError {
    /// 配置中的选择器无法解析
    #[error("Invalid selector `{selector}`: {message}")]
    InvalidSelector { selector: String, message: String },

    /// 页面中找不到标题
    #[error("Title not found on {0}")]
    MissingTitle(String),

    /// 地址无法解析
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// 章节链接
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterLink {
    /// 章节号
    pub number: f64,
    /// 链接文本
    pub title: Option<String>,
    /// 绝对地址
    pub url: String,
}

/// 站点选择器配置
///
/// 选择器在创建时编译一次，之后只读共享
#[derive(Debug, Clone)]
pub struct SiteProfile {
    title: Selector,
    chapter_links: Selector,
    chapter_images: Selector,
    chapter_content: Selector,
    newest_first: bool,
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl SiteProfile {
    /// 从配置编译选择器
    pub fn from_settings(settings: &SelectorSettings) -> Result<Self, ExtractError> {
        Ok(Self {
            title: compile(&settings.title)?,
            chapter_links: compile(&settings.chapter_links)?,
            chapter_images: compile(&settings.chapter_images)?,
            chapter_content: compile(&settings.chapter_content)?,
            newest_first: settings.newest_first,
        })
    }

    /// 提取标题
    pub fn extract_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.title)
            .map(element_text)
            .find(|t| !t.is_empty())
    }

    /// 提取章节链接，按阅读顺序返回
    ///
    /// # 参数
    ///
    /// * `html` - 作品目录页
    /// * `base_url` - 目录页地址，用于解析相对链接
    /// * `start_chapter` - 给定时按 `start_chapter + 序号` 重新编号
    pub fn extract_chapter_links(
        &self,
        html: &str,
        base_url: &str,
        start_chapter: Option<f64>,
    ) -> Result<Vec<ChapterLink>, ExtractError> {
        let base = Url::parse(base_url)?;
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut raw = Vec::new();

        for element in document.select(&self.chapter_links) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            let Ok(mut url) = base.join(href.trim()) else {
                continue;
            };
            url.set_fragment(None);
            let url = url.to_string();
            if !seen.insert(url.clone()) {
                continue;
            }
            let text = element_text(element);
            raw.push((if text.is_empty() { None } else { Some(text) }, url));
        }

        if self.newest_first {
            raw.reverse();
        }

        let numbers = match start_chapter {
            Some(start) => (0..raw.len()).map(|index| start + index as f64).collect(),
            None => {
                let parsed: Vec<Option<f64>> = raw
                    .iter()
                    .map(|(title, url)| {
                        parse_chapter_number(title.as_deref().unwrap_or_default(), url)
                    })
                    .collect();
                assign_numbers(&parsed)
            }
        };

        Ok(raw
            .into_iter()
            .zip(numbers)
            .map(|((title, url), number)| ChapterLink { number, title, url })
            .collect())
    }

    /// 提取章节图片地址（漫画）
    ///
    /// 优先使用懒加载属性 `data-src`、`data-original`，其次 `src`
    pub fn extract_images(&self, html: &str, base_url: &str) -> Result<Vec<String>, ExtractError> {
        let base = Url::parse(base_url)?;
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for element in document.select(&self.chapter_images) {
            let attrs = element.value();
            let src = ["data-src", "data-original", "src"]
                .iter()
                .filter_map(|name| attrs.attr(name))
                .map(str::trim)
                .find(|s| !s.is_empty() && !s.starts_with("data:"));

            if let Some(url) = src.and_then(|s| base.join(s).ok()) {
                let url = url.to_string();
                if seen.insert(url.clone()) {
                    images.push(url);
                }
            }
        }

        Ok(images)
    }

    /// 提取章节正文（小说），段落之间以换行分隔
    pub fn extract_text(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let element = document.select(&self.chapter_content).next()?;
        let text = element
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// 从链接文本或地址路径中解析章节号
///
/// 支持 `Chapter 12.5`、`chapter-12`、`chuong-3` 以及纯数字文本，
/// 地址只匹配路径部分
pub fn parse_chapter_number(text: &str, url: &str) -> Option<f64> {
    let from = |caps: regex::Captures<'_>| caps[1].replace(',', ".").parse::<f64>().ok();

    CHAPTER_NUMBER
        .captures(text)
        .and_then(from)
        .or_else(|| BARE_NUMBER.captures(text).and_then(from))
        .or_else(|| {
            let url = Url::parse(url).ok()?;
            CHAPTER_NUMBER.captures(url.path()).and_then(from)
        })
}

/// 为章节分配互不重复的章节号
///
/// 全部无法解析时按位置编号。否则无法解析或重复的章节取前一章节号之后
/// 最近的 0.1 步长，并避开其他章节解析出的编号
fn assign_numbers(parsed: &[Option<f64>]) -> Vec<f64> {
    if parsed.iter().all(Option::is_none) {
        return (1..=parsed.len()).map(|n| n as f64).collect();
    }

    let reserved: HashSet<String> = parsed.iter().flatten().map(|n| chapter_slug(*n)).collect();
    let mut used = HashSet::new();
    let mut previous = 0.0_f64;

    parsed
        .iter()
        .map(|parsed| {
            let number = match parsed {
                Some(n) if used.insert(chapter_slug(*n)) => *n,
                _ => {
                    let base = (previous * 10.0 + 1e-9).floor();
                    let mut step = 1.0;
                    loop {
                        let candidate = (base + step) / 10.0;
                        let slug = chapter_slug(candidate);
                        if !reserved.contains(&slug) && used.insert(slug) {
                            break candidate;
                        }
                        step += 1.0;
                    }
                }
            };
            previous = number;
            number
        })
        .collect()
}

/// 章节解析器
///
/// 按来源域名选择站点配置，没有覆盖时使用漫画或小说的默认配置
#[derive(Debug, Clone)]
pub struct ChapterExtractor {
    manga: SiteProfile,
    novel: SiteProfile,
    sites: HashMap<String, SiteProfile>,
}

impl ChapterExtractor {
    pub fn from_settings(settings: &CrawlerSettings) -> Result<Self, ExtractError> {
        let mut sites = HashMap::new();
        for site in &settings.sites {
            sites.insert(
                normalize_host(&site.host),
                SiteProfile::from_settings(&site.selectors)?,
            );
        }

        Ok(Self {
            manga: SiteProfile::from_settings(&settings.manga_selectors)?,
            novel: SiteProfile::from_settings(&settings.novel_selectors)?,
            sites,
        })
    }

    /// 选择来源地址对应的站点配置
    pub fn profile_for(&self, source_url: &str, content_type: ContentType) -> &SiteProfile {
        let host = Url::parse(source_url)
            .ok()
            .and_then(|u| u.host_str().map(normalize_host));

        if let Some(profile) = host.and_then(|h| self.sites.get(&h)) {
            return profile;
        }

        match content_type {
            ContentType::Manga => &self.manga,
            ContentType::Novel => &self.novel,
        }
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{Settings, SiteSettings};

    fn manga_profile() -> SiteProfile {
        SiteProfile::from_settings(&Settings::defaults().unwrap().crawler.manga_selectors).unwrap()
    }

    #[test]
    fn test_parse_chapter_number() {
        assert_eq!(parse_chapter_number("Chapter 12", ""), Some(12.0));
        assert_eq!(parse_chapter_number("Chapter 12.5", ""), Some(12.5));
        assert_eq!(parse_chapter_number("", "https://x.com/manga/chapter-7"), Some(7.0));
        assert_eq!(parse_chapter_number("", "https://x.com/truyen/chuong-3/"), Some(3.0));
        assert_eq!(parse_chapter_number("42", ""), Some(42.0));
        assert_eq!(parse_chapter_number("Prologue", "https://x.com/prologue"), None);
    }

    #[test]
    fn test_extract_chapter_links_newest_first() {
        let html = r#"
            <h1>Solo Leveling</h1>
            <ul class="chapters">
                <a href="/m/chapter-3">Chapter 3</a>
                <a href="/m/chapter-2">Chapter 2</a>
                <a href="/m/chapter-1#top">Chapter 1</a>
                <a href="/m/chapter-1">Chapter 1</a>
            </ul>
        "#;

        let profile = manga_profile();
        let links = profile
            .extract_chapter_links(html, "https://example.com/m", None)
            .unwrap();

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].url, "https://example.com/m/chapter-1");
        assert_eq!(links[0].number, 1.0);
        assert_eq!(links[2].number, 3.0);
        assert_eq!(profile.extract_title(html).as_deref(), Some("Solo Leveling"));
    }

    #[test]
    fn test_start_chapter_overrides_numbering() {
        let html = r#"
            <ul class="chapters">
                <a href="/m/b">Second</a>
                <a href="/m/a">First</a>
            </ul>
        "#;

        let links = manga_profile()
            .extract_chapter_links(html, "https://example.com/m", Some(10.0))
            .unwrap();

        assert_eq!(links[0].url, "https://example.com/m/a");
        assert_eq!(links[0].number, 10.0);
        assert_eq!(links[1].number, 11.0);
    }

    #[test]
    fn test_unparseable_numbers_fall_back_to_position() {
        let html = r#"<ul class="chapters"><a href="/m/extra">Extra</a><a href="/m/prologue">Prologue</a></ul>"#;

        let links = manga_profile()
            .extract_chapter_links(html, "https://example.com/m", None)
            .unwrap();

        assert_eq!(links[0].number, 1.0);
        assert_eq!(links[1].number, 2.0);
    }

    #[test]
    fn test_unnumbered_link_does_not_take_a_real_chapter_number() {
        let mut selectors = Settings::defaults().unwrap().crawler.manga_selectors;
        selectors.newest_first = false;
        let profile = SiteProfile::from_settings(&selectors).unwrap();
        let html = r#"
            <ul class="chapters">
                <a href="/m/c1">Chapter 1</a>
                <a href="/m/extra">Extra</a>
                <a href="/m/c2">Chapter 2</a>
            </ul>
        "#;

        let links = profile
            .extract_chapter_links(html, "https://example.com/m", None)
            .unwrap();

        let numbers: Vec<f64> = links.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1.0, 1.1, 2.0]);
    }

    #[test]
    fn test_assign_numbers_keeps_slugs_unique() {
        let numbers = assign_numbers(&[None, Some(1.0), None, Some(1.1), Some(1.0), Some(2.0)]);
        let slugs: HashSet<String> = numbers.iter().map(|n| chapter_slug(*n)).collect();

        assert_eq!(numbers[0], 0.1);
        assert_eq!(numbers[2], 1.2);
        assert_eq!(numbers[3], 1.1);
        assert_eq!(numbers[4], 1.3);
        assert_eq!(slugs.len(), numbers.len());
    }

    #[test]
    fn test_chapter_keywords_need_a_word_boundary() {
        assert_eq!(parse_chapter_number("", "https://example.com/tech-2/"), None);
        assert_eq!(parse_chapter_number("", "https://example.com/step-3"), None);
        assert_eq!(parse_chapter_number("", "https://ch9.example.com/read"), None);
        assert_eq!(parse_chapter_number("", "https://example.com/m/ch-4"), Some(4.0));
    }

    #[test]
    fn test_extract_images_prefers_lazy_attributes() {
        let html = r#"
            <div class="reading-content">
                <img src="data:image/gif;base64,AAAA" data-src="/img/1.jpg">
                <img src="https://cdn.example.com/2.jpg">
                <img src="https://cdn.example.com/2.jpg">
                <img>
            </div>
        "#;

        let images = manga_profile()
            .extract_images(html, "https://example.com/m/chapter-1")
            .unwrap();

        assert_eq!(
            images,
            vec![
                "https://example.com/img/1.jpg".to_string(),
                "https://cdn.example.com/2.jpg".to_string()
            ]
        );
    }

    #[test]
    fn test_extract_text() {
        let settings = Settings::defaults().unwrap();
        let profile = SiteProfile::from_settings(&settings.crawler.novel_selectors).unwrap();
        let html = r#"<div class="chapter-content"><p>First line.</p><p> </p><p>Second line.</p></div>"#;

        assert_eq!(
            profile.extract_text(html).as_deref(),
            Some("First line.\nSecond line.")
        );
        assert!(profile.extract_text("<div></div>").is_none());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let mut selectors = Settings::defaults().unwrap().crawler.manga_selectors;
        selectors.chapter_links = "ul >>> a[".to_string();

        assert!(matches!(
            SiteProfile::from_settings(&selectors),
            Err(ExtractError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_profile_for_host_override() {
        let mut settings = Settings::defaults().unwrap().crawler;
        let mut selectors = settings.manga_selectors.clone();
        selectors.newest_first = false;
        settings.sites.push(SiteSettings {
            host: "www.mangasite.test".to_string(),
            selectors,
        });

        let extractor = ChapterExtractor::from_settings(&settings).unwrap();
        let html = r#"<ul class="chapters"><a href="/c/1">Chapter 1</a><a href="/c/2">Chapter 2</a></ul>"#;

        let overridden = extractor
            .profile_for("https://mangasite.test/m", ContentType::Manga)
            .extract_chapter_links(html, "https://mangasite.test/m", None)
            .unwrap();
        let default = extractor
            .profile_for("https://other.test/m", ContentType::Manga)
            .extract_chapter_links(html, "https://other.test/m", None)
            .unwrap();

        assert_eq!(overridden[0].number, 1.0);
        assert_eq!(default[0].number, 2.0);
    }
}
