use chrono::{DateTime, Datelike, Local};
use fb_core::{Article, OutgoingMessage, Result};

use crate::card::{Card, CardElement};
use crate::locale::Locale;
use crate::summary::{escape_markdown, short_summary};

const DIGEST_TEMPLATE: &str = "turquoise";
const EMPTY_TEMPLATE: &str = "grey";

/// A rendered card together with the articles it announces.
#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub card: Card,
    pub article_ids: Vec<String>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.article_ids.is_empty()
    }

    pub fn to_message(&self) -> Result<OutgoingMessage> {
        Ok(OutgoingMessage::Card(serde_json::to_value(&self.card)?))
    }
}

/// Builds digest cards. Rendering is pure apart from reading the clock in
/// [`DigestRenderer::render`]; use the `_at` variants for a fixed date.
#[derive(Debug, Clone)]
pub struct DigestRenderer {
    locale: Locale,
    title: String,
}

impl Default for DigestRenderer {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl DigestRenderer {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            title: locale.default_title().to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn render(&self, articles: &[Article]) -> Digest {
        self.render_at(articles, Local::now())
    }

    pub fn render_at(&self, articles: &[Article], now: DateTime<Local>) -> Digest {
        if articles.is_empty() {
            return self.no_new_content_at(now);
        }

        let mut card = Card::new(&self.title, DIGEST_TEMPLATE);
        card.push(CardElement::markdown(format!(
            "{}\n{}",
            self.locale.date_line(&self.format_date(now)),
            self.locale.count_line(articles.len())
        )));
        card.push(CardElement::Hr);

        let groups = group_by_author(articles);
        let group_count = groups.len();
        for (g, (author, group)) in groups.into_iter().enumerate() {
            card.push(CardElement::markdown(
                self.locale.group_title(author, group.len()),
            ));
            for (i, article) in group.iter().enumerate() {
                self.push_article(&mut card, article, i + 1);
                if i + 1 < group.len() {
                    card.push(CardElement::Hr);
                }
            }
            if g + 1 < group_count {
                card.push(CardElement::Hr);
            }
        }

        Digest {
            card,
            article_ids: articles.iter().map(|a| a.id.clone()).collect(),
        }
    }

    pub fn no_new_content(&self) -> Digest {
        self.no_new_content_at(Local::now())
    }

    pub fn no_new_content_at(&self, now: DateTime<Local>) -> Digest {
        let mut card = Card::new(&self.title, EMPTY_TEMPLATE);
        card.push(CardElement::markdown(
            self.locale.date_line(&self.format_date(now)),
        ));
        card.push(CardElement::Hr);
        card.push(CardElement::markdown(self.locale.no_new_notice()));
        card.push(CardElement::plain(self.locale.still_watching()));

        Digest {
            card,
            article_ids: Vec::new(),
        }
    }

    fn push_article(&self, card: &mut Card, article: &Article, index: usize) {
        card.push(CardElement::markdown(format!(
            "{}. [{}]({})",
            index,
            escape_markdown(&article.title),
            article.url
        )));
        card.push(CardElement::markdown(short_summary(
            article.summary_source(),
            self.locale,
        )));
        card.push(CardElement::plain(format!(
            "  {}",
            article.published_at.with_timezone(&Local).format("%H:%M")
        )));
    }

    fn format_date(&self, now: DateTime<Local>) -> String {
        let weekday = self.locale.weekdays()[now.weekday().num_days_from_sunday() as usize];
        format!("{} {}", now.format("%Y-%m-%d"), weekday)
    }
}

/// Groups articles by author label, keeping first-seen order of both groups
/// and articles.
fn group_by_author(articles: &[Article]) -> Vec<(&str, Vec<&Article>)> {
    let mut groups: Vec<(&str, Vec<&Article>)> = Vec::new();
    for article in articles {
        match groups.iter_mut().find(|(author, _)| *author == article.author) {
            Some((_, group)) => group.push(article),
            None => groups.push((article.author.as_str(), vec![article])),
        }
    }
    groups
}
