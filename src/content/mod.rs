//! Static site content: announcements, guides and the help center, the about
//! page and the landing-page figures.
//!
//! Each file is compiled into the binary. When a content directory is
//! configured, a file of the same name found there replaces the embedded one.

mod about;
mod announcements;
mod help;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

pub use about::{
    About, AboutOverview, Contact, MissionVision, TeamMember, TeamSection, TechStack, Timeline,
};
pub use announcements::{Announcement, AnnouncementPage, Announcements, PageInfo};
pub use help::{
    Article, ArticleSummary, ArticleView, Category, Feature, Guide, HelpContent, HomeGuides,
    SearchHit, SearchMatch,
};

const ANNOUNCEMENTS_FILE: &str = "announcements.toml";
const GUIDES_FILE: &str = "guides.toml";
const ABOUT_FILE: &str = "about.toml";
const STATS_FILE: &str = "stats.toml";

const EMBEDDED_ANNOUNCEMENTS: &str = include_str!("../../content/announcements.toml");
const EMBEDDED_GUIDES: &str = include_str!("../../content/guides.toml");
const EMBEDDED_ABOUT: &str = include_str!("../../content/about.toml");
const EMBEDDED_STATS: &str = include_str!("../../content/stats.toml");

/// Landing-page headline figures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct SiteStats {
    pub total_inspections: i64,
    pub defects_found: i64,
    pub accuracy: f64,
    pub weekly_inspections: i64,
}

/// All static content, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Content {
    pub announcements: Announcements,
    pub help: HelpContent,
    pub about: About,
    pub stats: SiteStats,
}

impl Content {
    /// Load every content file, preferring copies in `dir` when given.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        Ok(Self {
            announcements: load_file(dir, ANNOUNCEMENTS_FILE, EMBEDDED_ANNOUNCEMENTS)?,
            help: load_file(dir, GUIDES_FILE, EMBEDDED_GUIDES)?,
            about: load_file(dir, ABOUT_FILE, EMBEDDED_ABOUT)?,
            stats: load_file(dir, STATS_FILE, EMBEDDED_STATS)?,
        })
    }

    /// Content compiled into the binary.
    ///
    /// # Panics
    /// Panics if an embedded file is invalid (a build-time bug).
    pub fn embedded() -> Self {
        Self::load(None).expect("embedded content files must be valid TOML")
    }
}

fn load_file<T: DeserializeOwned>(dir: Option<&Path>, name: &str, embedded: &str) -> Result<T> {
    if let Some(path) = dir.map(|d| d.join(name)).filter(|p| p.is_file()) {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read content file {:?}", path))?;
        let parsed = toml::from_str(&text)
            .with_context(|| format!("Invalid content file {:?}", path))?;
        info!("Loaded {} from {:?}", name, path);
        return Ok(parsed);
    }
    toml::from_str(embedded).with_context(|| format!("Invalid embedded {}", name))
}
