use serde::{Deserialize, Serialize};

/// Date stamped on generated article pages.
const GENERATED_ARTICLE_DATE: &str = "2025-03-15";
const MAX_RELATED: usize = 3;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Feature {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub to: String,
    #[serde(default)]
    pub requires_auth: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Guide {
    pub id: i64,
    pub title: String,
    pub steps: Vec<String>,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Category {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub standalone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<ArticleSummary>>,
}

impl Category {
    fn listed(&self) -> &[ArticleSummary] {
        if self.standalone {
            return &[];
        }
        self.articles.as_deref().unwrap_or_default()
    }
}

/// A full help article page.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Article {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub excerpt: String,
    pub last_updated: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
}

/// Root of guides.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct HelpContent {
    pub features: Vec<Feature>,
    pub guides: Vec<Guide>,
    pub categories: Vec<Category>,
    /// Hand-written article pages.
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize)]
pub struct HomeGuides<'a> {
    pub features: &'a [Feature],
    pub guides: &'a [Guide],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub article: Article,
    pub related_articles: Vec<ArticleSummary>,
}

/// Either a listed article or, for standalone categories, the full page.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchMatch {
    Listed(ArticleSummary),
    Page(Article),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub article: SearchMatch,
    pub category: String,
    pub category_id: String,
}

impl HelpContent {
    pub fn home(&self) -> HomeGuides<'_> {
        HomeGuides {
            features: &self.features,
            guides: &self.guides,
        }
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Articles listed under a category; empty for unknown or standalone ones.
    pub fn category_articles(&self, id: &str) -> &[ArticleSummary] {
        self.category(id).map(Category::listed).unwrap_or_default()
    }

    /// An article page with up to three siblings from its category.
    ///
    /// Listed articles without a hand-written page get a generated one.
    pub fn article(&self, id: &str) -> Option<ArticleView> {
        if let Some(page) = self.articles.iter().find(|a| a.id == id) {
            let related = self
                .category(&page.category_id)
                .map(|c| related(c, id))
                .unwrap_or_default();
            return Some(ArticleView {
                article: page.clone(),
                related_articles: related,
            });
        }

        let (category, listed) = self.categories.iter().find_map(|c| {
            c.listed().iter().find(|a| a.id == id).map(|a| (c, a))
        })?;
        let tag = category
            .title
            .split_whitespace()
            .next()
            .unwrap_or(&category.title)
            .to_string();

        Some(ArticleView {
            article: Article {
                id: listed.id.clone(),
                category_id: category.id.clone(),
                title: listed.title.clone(),
                excerpt: listed.excerpt.clone(),
                last_updated: GENERATED_ARTICLE_DATE.to_string(),
                tags: vec![tag],
                content: format!(
                    "<h2>{}</h2><p>{} More detailed instructions will follow here.</p>",
                    listed.title, listed.excerpt
                ),
            },
            related_articles: related(category, id),
        })
    }

    /// Case-insensitive search over article titles and excerpts.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let matches = |title: &str, excerpt: &str| {
            title.to_lowercase().contains(&needle) || excerpt.to_lowercase().contains(&needle)
        };

        let mut hits = Vec::new();
        for category in &self.categories {
            if category.standalone {
                let page = self.articles.iter().find(|a| a.id == category.id);
                if let Some(page) = page.filter(|p| matches(&p.title, &p.excerpt)) {
                    hits.push(SearchHit {
                        article: SearchMatch::Page(page.clone()),
                        category: category.title.clone(),
                        category_id: category.id.clone(),
                    });
                }
                continue;
            }
            for listed in category.listed() {
                if matches(&listed.title, &listed.excerpt) {
                    hits.push(SearchHit {
                        article: SearchMatch::Listed(listed.clone()),
                        category: category.title.clone(),
                        category_id: category.id.clone(),
                    });
                }
            }
        }
        hits
    }
}

fn related(category: &Category, exclude: &str) -> Vec<ArticleSummary> {
    category
        .listed()
        .iter()
        .filter(|a| a.id != exclude)
        .take(MAX_RELATED)
        .cloned()
        .collect()
}
