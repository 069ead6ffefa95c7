use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::database::entities::{companies, users, UserRole};
use crate::services::authorization::Actor;

pub async fn seed_company(db: &DatabaseConnection, name: &str) -> companies::Model {
    companies::ActiveModel {
        name: Set(name.to_string()),
        logo_url: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert company")
}

pub async fn seed_user(
    db: &DatabaseConnection,
    company_id: Option<i32>,
    email: &str,
    role: UserRole,
) -> Actor {
    let mut user = users::ActiveModel::new();
    user.email = Set(email.to_string());
    user.password_hash = Set("not-a-real-hash".to_string());
    user.company_id = Set(company_id);
    user.role = Set(role);
    Actor::new(user.insert(db).await.expect("insert user"))
}

pub async fn seed_member(db: &DatabaseConnection, company_id: i32, email: &str) -> Actor {
    seed_user(db, Some(company_id), email, UserRole::Member).await
}

pub async fn seed_company_with_admin(db: &DatabaseConnection) -> (companies::Model, Actor) {
    let company = seed_company(db, "Acme Sourcing").await;
    let admin = seed_user(db, Some(company.id), "admin@acme.test", UserRole::Admin).await;
    (company, admin)
}
