use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub image: String,
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub contact_email: String,
    pub social_links: SocialLinks,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Statement {
    pub title: String,
    pub content: String,
    pub image: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreValue {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissionVision {
    pub mission: Statement,
    pub vision: Statement,
    pub values: Vec<CoreValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TechItem {
    pub name: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TechSection {
    pub title: String,
    pub items: Vec<TechItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TechStack {
    pub sections: Vec<TechSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Milestone {
    pub id: i64,
    pub date: String,
    pub title: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timeline {
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Company {
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub website: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocialAccount {
    pub name: String,
    pub url: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Contact {
    pub company: Company,
    pub social_media: Vec<SocialAccount>,
    pub office_hours: String,
    pub support_email: String,
}

/// Root of about.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct About {
    pub team_members: Vec<TeamMember>,
    pub mission_vision: MissionVision,
    pub tech_stack: TechStack,
    pub timeline: Timeline,
    pub contact: Contact,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSection<'a> {
    pub team_members: &'a [TeamMember],
}

/// Everything on the about page in one response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutOverview<'a> {
    pub team_members: TeamSection<'a>,
    pub mission_vision: &'a MissionVision,
    pub tech_stack: &'a TechStack,
    pub project_timeline: &'a Timeline,
    pub contact_info: &'a Contact,
}

impl About {
    pub fn team(&self) -> TeamSection<'_> {
        TeamSection {
            team_members: &self.team_members,
        }
    }

    pub fn overview(&self) -> AboutOverview<'_> {
        AboutOverview {
            team_members: self.team(),
            mission_vision: &self.mission_vision,
            tech_stack: &self.tech_stack,
            project_timeline: &self.timeline,
            contact_info: &self.contact,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::content::Content;

    #[test]
    fn test_overview_shape() {
        let about = Content::embedded().about;
        let json = serde_json::to_value(about.overview()).unwrap();

        assert_eq!(json["teamMembers"]["teamMembers"].as_array().unwrap().len(), 3);
        assert_eq!(
            json["teamMembers"]["teamMembers"][0]["contactEmail"],
            "charlie930320@gmail.com"
        );
        assert_eq!(json["missionVision"]["values"].as_array().unwrap().len(), 4);
        assert_eq!(json["techStack"]["sections"].as_array().unwrap().len(), 6);
        assert_eq!(json["projectTimeline"]["milestones"].as_array().unwrap().len(), 7);
        assert_eq!(json["contactInfo"]["officeHours"], "Monday to Friday 09:00-18:00");
        assert_eq!(json["contactInfo"]["socialMedia"].as_array().unwrap().len(), 4);
    }
}
