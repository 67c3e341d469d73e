use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub author: String,
    #[serde(default)]
    pub important: bool,
    pub icon_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Announcements {
    #[serde(rename = "announcements", default)]
    pub items: Vec<Announcement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementPage {
    pub announcements: Vec<Announcement>,
    pub pagination: PageInfo,
}

impl Announcements {
    /// One page of announcements, newest first. `page` and `limit` start at 1.
    pub fn page(&self, page: usize, limit: usize) -> AnnouncementPage {
        let page = page.max(1);
        let limit = limit.max(1);

        let mut sorted: Vec<&Announcement> = self.items.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));

        let total_items = sorted.len();
        let total_pages = total_items.div_ceil(limit);
        let announcements = sorted
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();

        AnnouncementPage {
            announcements,
            pagination: PageInfo {
                current_page: page,
                total_pages,
                total_items,
                has_next_page: page < total_pages,
                has_prev_page: page > 1,
            },
        }
    }

    pub fn find(&self, id: i64) -> Option<&Announcement> {
        self.items.iter().find(|a| a.id == id)
    }
}
