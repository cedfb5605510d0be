use fb_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Language of the rendered digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn default_title(&self) -> &'static str {
        match self {
            Self::En => "Morning Brief",
            Self::Zh => "早报",
        }
    }

    /// Weekday names indexed from Sunday.
    pub(crate) fn weekdays(&self) -> [&'static str; 7] {
        match self {
            Self::En => [
                "Sunday",
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
            ],
            Self::Zh => ["周日", "周一", "周二", "周三", "周四", "周五", "周六"],
        }
    }

    pub(crate) fn sentence_terminators(&self) -> &'static [char] {
        match self {
            Self::En => &['.', '?', '!', '\n'],
            Self::Zh => &['。', '？', '！', '\n'],
        }
    }

    pub(crate) fn summary_placeholder(&self) -> &'static str {
        match self {
            Self::En => "view for details",
            Self::Zh => "点击查看详情",
        }
    }

    pub(crate) fn date_line(&self, date: &str) -> String {
        match self {
            Self::En => format!("**Date**: {}", date),
            Self::Zh => format!("**日期**: {}", date),
        }
    }

    pub(crate) fn count_line(&self, count: usize) -> String {
        match self {
            Self::En => format!("**Articles**: {}", count),
            Self::Zh => format!("**文章数**: {} 篇", count),
        }
    }

    pub(crate) fn group_title(&self, author: &str, count: usize) -> String {
        match self {
            Self::En => format!("**{}** ({})", author, count),
            Self::Zh => format!("**{}** ({}篇)", author, count),
        }
    }

    pub(crate) fn no_new_notice(&self) -> &'static str {
        match self {
            Self::En => "No new articles right now, check back later",
            Self::Zh => "暂时没有新文章，请稍后再查看",
        }
    }

    pub(crate) fn still_watching(&self) -> &'static str {
        match self {
            Self::En => "Feeds are still being monitored and new articles will be pushed as they arrive",
            Self::Zh => "将继续监控 RSS 源，有新文章时会及时推送",
        }
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "en-us" | "en_us" | "english" => Ok(Self::En),
            "zh" | "zh-cn" | "zh_cn" | "cn" | "chinese" => Ok(Self::Zh),
            other => Err(Error::Configuration(format!(
                "unsupported digest locale: {} (expected en or zh)",
                other
            ))),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::En => write!(f, "en"),
            Self::Zh => write!(f, "zh"),
        }
    }
}
