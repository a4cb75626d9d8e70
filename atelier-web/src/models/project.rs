use crate::backend::storage::StorageApi;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Storage path or absolute URL.
    #[serde(default)]
    pub before_image: Option<String>,
    #[serde(default)]
    pub after_image: Option<String>,
    #[serde(default, deserialize_with = "super::null_as_default")]
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

/// Dashboard form submission. Checkboxes arrive as `"on"` or not at all.
#[derive(Debug, Deserialize, Validate)]
pub struct ProjectForm {
    #[validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))]
    pub title: String,
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
    #[validate(length(max = 80, message = "Category is too long"))]
    pub category: Option<String>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
    pub featured: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct NewProject {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
    pub featured: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<ProjectForm> for NewProject {
    fn from(form: ProjectForm) -> Self {
        let featured = matches!(
            form.featured.as_deref().map(str::trim),
            Some("on" | "true" | "1" | "yes")
        );

        Self {
            title: form.title.trim().to_string(),
            description: non_blank(form.description),
            category: non_blank(form.category),
            before_image: non_blank(form.before_image),
            after_image: non_blank(form.after_image),
            featured,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.before_image.is_none()
            && self.after_image.is_none()
            && self.featured.is_none()
    }
}

/// A project as shown on the public portfolio, with resolved image URLs.
#[derive(Debug, Serialize)]
pub struct PortfolioItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub before_image_url: Option<String>,
    pub after_image_url: Option<String>,
    pub featured: bool,
}

impl PortfolioItem {
    pub fn from_project(project: Project, storage: &StorageApi<'_>, bucket: &str) -> Self {
        let resolve = |image: Option<String>| {
            image.map(|path| {
                if path.starts_with("http://") || path.starts_with("https://") {
                    path
                } else {
                    storage.public_url(bucket, &path)
                }
            })
        };

        Self {
            id: project.id,
            title: project.title,
            description: project.description,
            category: project.category,
            before_image_url: resolve(project.before_image),
            after_image_url: resolve(project.after_image),
            featured: project.featured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(featured: Option<&str>) -> ProjectForm {
        ProjectForm {
            title: "  Oak dresser  ".to_string(),
            description: Some("   ".to_string()),
            category: Some("Dressers".to_string()),
            before_image: None,
            after_image: Some("2024/oak-after.jpg".to_string()),
            featured: featured.map(str::to_string),
        }
    }

    #[test]
    fn form_maps_to_clean_record() {
        let project = NewProject::from(form(Some("on")));
        assert_eq!(project.title, "Oak dresser");
        assert!(project.description.is_none());
        assert_eq!(project.category.as_deref(), Some("Dressers"));
        assert!(project.featured);
    }

    #[test]
    fn unchecked_box_is_not_featured() {
        assert!(!NewProject::from(form(None)).featured);
        assert!(!NewProject::from(form(Some("off"))).featured);
    }

    #[test]
    fn null_featured_reads_as_not_featured() {
        let project: Project = serde_json::from_str(
            r#"{"id":"11111111-1111-1111-1111-111111111111","title":"Pine chest","featured":null,"created_at":"2026-10-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert!(!project.featured);

        let missing: Project = serde_json::from_str(
            r#"{"id":"11111111-1111-1111-1111-111111111111","title":"Pine chest","created_at":"2026-10-01T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(missing, project);
    }

    #[test]
    fn empty_title_fails_validation() {
        let mut f = form(None);
        f.title = String::new();
        assert!(f.validate().is_err());
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = ProjectPatch {
            featured: Some(false),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"featured":false}"#);
        assert!(ProjectPatch::default().is_empty());
    }
}
