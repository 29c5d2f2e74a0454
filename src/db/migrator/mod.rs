use sea_orm_migration::prelude::*;

mod m20250601_add_users;
mod m20250715_add_password_reset_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_add_users::Migration),
            Box::new(m20250715_add_password_reset_tokens::Migration),
        ]
    }
}
