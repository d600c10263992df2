//! Blog-shaped models shared by the unit tests.

use crate::core::{Model, Relation};
use crate::errors::Result;
use crate::query::EntityQuery;

#[derive(Debug)]
pub struct User;

impl Model for User {
    fn name(&self) -> &'static str {
        "user"
    }

    fn table_name(&self) -> &'static str {
        "users"
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "posts" => Some(Relation::has_many("posts", &Post)),
            "profile" => Some(Relation::has_one("profile", &Profile)),
            "roles" => Some(Relation::belongs_to_many("roles", &Role)),
            "comments" => Some(Relation::through("comments", &Comment)),
            "reports" => Some(Relation::has_many("reports", &User).with_foreign_key("manager_id")),
            _ => None,
        }
    }

    fn updated_at_column(&self) -> Option<&'static str> {
        Some("updated_at")
    }

    fn scope(&self, name: &str, query: &mut EntityQuery) -> Result<()> {
        match name {
            "active" => {
                query.where_("active", "=", true)?;
                Ok(())
            }
            "adults" => {
                query.where_("age", ">=", 18)?;
                Ok(())
            }
            _ => Err(crate::Error::UnknownScope {
                model: self.name(),
                scope: name.to_string(),
            }),
        }
    }
}

#[derive(Debug)]
pub struct Post;

impl Model for Post {
    fn name(&self) -> &'static str {
        "post"
    }

    fn table_name(&self) -> &'static str {
        "posts"
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "author" => Some(Relation::belongs_to("author", &User)),
            "comments" => Some(Relation::has_many("comments", &Comment)),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Comment;

impl Model for Comment {
    fn name(&self) -> &'static str {
        "comment"
    }

    fn table_name(&self) -> &'static str {
        "comments"
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        (name == "post").then(|| Relation::belongs_to("post", &Post))
    }
}

#[derive(Debug)]
pub struct Role;

impl Model for Role {
    fn name(&self) -> &'static str {
        "role"
    }

    fn table_name(&self) -> &'static str {
        "roles"
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        (name == "users").then(|| Relation::belongs_to_many("users", &User))
    }
}

#[derive(Debug)]
pub struct Profile;

impl Model for Profile {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn table_name(&self) -> &'static str {
        "profiles"
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        (name == "user").then(|| Relation::belongs_to("user", &User))
    }
}
