// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::crawl_result::ContentType;

/// 漫画/小说实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manga {
    pub id: Uuid,
    pub title: String,
    pub source_url: String,
    pub content_type: ContentType,
    pub created_at: DateTime<Utc>,
}

/// 待保存的章节
///
/// 漫画章节携带图片地址，小说章节携带正文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChapter {
    pub manga_id: Uuid,
    pub number: f64,
    pub title: Option<String>,
    pub source_url: String,
    pub images: Vec<String>,
    pub content: Option<String>,
}

impl NewChapter {
    /// 章节唯一键
    pub fn slug(&self) -> String {
        chapter_slug(self.number)
    }
}

/// 由章节号生成唯一键：`12` → `"12"`，`12.5` → `"12.5"`
pub fn chapter_slug(number: f64) -> String {
    if number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        let formatted = format!("{:.4}", number);
        formatted.trim_end_matches('0').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_slug() {
        assert_eq!(chapter_slug(12.0), "12");
        assert_eq!(chapter_slug(12.5), "12.5");
        assert_eq!(chapter_slug(0.25), "0.25");
    }
}
