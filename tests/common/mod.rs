use easymodel::{Model, Relation};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;

// Helper function to get database URL from environment or default to SQLite
fn get_test_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string())
}

// Persistent databases keep rows between runs
async fn cleanup_test_tables(db: &DatabaseConnection) {
    for table in ["role_user", "roles", "comments", "posts", "users", "seaql_migrations"] {
        let _ = db
            .execute_unprepared(&format!("DROP TABLE IF EXISTS {table}"))
            .await;
    }
}

// Crate debug/trace events land in the captured output of failing tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let database_url = get_test_database_url();
    let db = Database::connect(&database_url).await?;
    if !database_url.starts_with("sqlite::memory:") {
        cleanup_test_tables(&db).await;
    }
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Two users, three posts, a handful of comments and roles.
#[allow(dead_code)]
pub async fn setup_seeded_db() -> Result<DatabaseConnection, DbErr> {
    let db = setup_test_db().await?;
    for statement in [
        "INSERT INTO users (id, name, email, age, active, logins) VALUES (1, 'Ann', 'ann@example.com', 34, TRUE, 3)",
        "INSERT INTO users (id, name, email, age, active, logins) VALUES (2, 'Bea', 'bea@example.com', 17, FALSE, 0)",
        "INSERT INTO posts (id, user_id, title, views, published) VALUES (1, 1, 'Hello', 10, TRUE)",
        "INSERT INTO posts (id, user_id, title, views, published) VALUES (2, 1, 'Again', 5, FALSE)",
        "INSERT INTO posts (id, user_id, title, views, published) VALUES (3, 2, 'First', 0, TRUE)",
        "INSERT INTO comments (id, post_id, body) VALUES (1, 1, 'nice')",
        "INSERT INTO comments (id, post_id, body) VALUES (2, 1, 'great')",
        "INSERT INTO comments (id, post_id, body) VALUES (3, 3, 'welcome')",
        "INSERT INTO roles (id, name) VALUES (1, 'admin')",
        "INSERT INTO roles (id, name) VALUES (2, 'editor')",
        "INSERT INTO role_user (user_id, role_id) VALUES (1, 1)",
    ] {
        db.execute_unprepared(statement).await?;
    }
    Ok(db)
}

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
            "roles" => Some(Relation::belongs_to_many("roles", &Role)),
            _ => None,
        }
    }

    fn updated_at_column(&self) -> Option<&'static str> {
        Some("updated_at")
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
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateBlogTables)]
    }
}

pub struct CreateBlogTables;

#[async_trait::async_trait]
impl MigrationName for CreateBlogTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_blog_tables"
    }
}

fn id_column() -> ColumnDef {
    ColumnDef::new(Alias::new("id"))
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for CreateBlogTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("users"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("email")).string().null())
                    .col(ColumnDef::new(Alias::new("age")).integer().null())
                    .col(ColumnDef::new(Alias::new("active")).boolean().not_null().default(false))
                    .col(ColumnDef::new(Alias::new("logins")).integer().not_null().default(0))
                    .col(ColumnDef::new(Alias::new("updated_at")).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("posts"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("user_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("title")).string().not_null())
                    .col(ColumnDef::new(Alias::new("views")).integer().not_null().default(0))
                    .col(ColumnDef::new(Alias::new("published")).boolean().not_null().default(false))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("comments"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("post_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("body")).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("roles"))
                    .if_not_exists()
                    .col(id_column())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("role_user"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("user_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("role_id")).integer().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in ["role_user", "roles", "comments", "posts", "users"] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}
