use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_core::{Aggregate, AggregateRoot, DomainError, RecordStatus};
use commerce_events::Event;

commerce_core::aggregate_id!(CategoryId);

/// Aggregate root: Category (flat or nested via `parent_id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    name: String,
    slug: String,
    parent_id: Option<CategoryId>,
    status: RecordStatus,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            name: String::new(),
            slug: String::new(),
            parent_id: None,
            status: RecordStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn parent_id(&self) -> Option<CategoryId> {
        self.parent_id
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateCategory {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    CreateCategory(CreateCategory),
    DeactivateCategory(DeactivateCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDeactivated {
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
    CategoryDeactivated(CategoryDeactivated),
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "catalog.category.created",
            CategoryEvent::CategoryDeactivated(_) => "catalog.category.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
            CategoryEvent::CategoryDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.name = e.name.clone();
                self.slug = e.slug.clone();
                self.parent_id = e.parent_id;
                self.status = RecordStatus::Active;
                self.created = true;
            }
            CategoryEvent::CategoryDeactivated(_) => {
                self.status = RecordStatus::Inactive;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::CreateCategory(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category already exists"));
                }
                if cmd.name.trim().is_empty() {
                    return Err(DomainError::validation("category name cannot be empty"));
                }
                if !is_valid_slug(&cmd.slug) {
                    return Err(DomainError::validation(
                        "slug must be lowercase letters, digits and single dashes",
                    ));
                }
                if cmd.parent_id == Some(cmd.category_id) {
                    return Err(DomainError::invariant("category cannot be its own parent"));
                }
                Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
                    category_id: cmd.category_id,
                    name: cmd.name.trim().to_string(),
                    slug: cmd.slug.clone(),
                    parent_id: cmd.parent_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::DeactivateCategory(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found("category"));
                }
                if !self.status.is_visible() {
                    return Ok(vec![]);
                }
                Ok(vec![CategoryEvent::CategoryDeactivated(CategoryDeactivated {
                    category_id: cmd.category_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_events::execute;

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("mens-shirts"));
        assert!(!is_valid_slug("Mens"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("-a"));
    }

    #[test]
    fn deactivate_is_idempotent() {
        let id = CategoryId::generate();
        let mut c = Category::empty(id);
        execute(
            &mut c,
            &CategoryCommand::CreateCategory(CreateCategory {
                category_id: id,
                name: "Shirts".into(),
                slug: "shirts".into(),
                parent_id: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let deactivate = CategoryCommand::DeactivateCategory(DeactivateCategory {
            category_id: id,
            occurred_at: Utc::now(),
        });
        assert_eq!(execute(&mut c, &deactivate).unwrap().len(), 1);
        assert!(execute(&mut c, &deactivate).unwrap().is_empty());
        assert_eq!(c.status(), RecordStatus::Inactive);
    }
}
