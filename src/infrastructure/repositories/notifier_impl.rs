// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::notification::AdminNotification;
use crate::domain::repositories::notification_repository::Notifier;
use crate::domain::repositories::scheduled_job_repository::RepositoryError;
use crate::infrastructure::database::entities::{notification as notification_entity, user as user_entity};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::*;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 数据库通知实现
///
/// 为每个管理员插入一条通知记录
pub struct DatabaseNotifier {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl DatabaseNotifier {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for DatabaseNotifier {
    async fn notify_admins(&self, notification: &AdminNotification) -> Result<usize, RepositoryError> {
        let admins = user_entity::Entity::find()
            .filter(user_entity::Column::Admin.eq(true))
            .all(self.db.as_ref())
            .await?;

        if admins.is_empty() {
            debug!("No admin users to notify");
            return Ok(0);
        }

        let now = Utc::now();
        let rows: Vec<notification_entity::ActiveModel> = admins
            .iter()
            .map(|admin| notification_entity::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(admin.id),
                title: Set(notification.title.clone()),
                content: Set(notification.content.clone()),
                notification_type: Set(notification.kind.to_string()),
                reference_id: Set(notification.reference_id.clone()),
                reference_type: Set(notification.reference_type.clone()),
                read: Set(false),
                created_at: Set(now.into()),
            })
            .collect();

        let count = rows.len();
        notification_entity::Entity::insert_many(rows)
            .exec(self.db.as_ref())
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::notification::NotificationKind;
    use migration::{Migrator, MigratorTrait};

    async fn setup_db() -> Arc<DatabaseConnection> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let db = Arc::new(db);
        Migrator::up(db.as_ref(), None).await.unwrap();
        db
    }

    async fn create_user(db: &DatabaseConnection, email: &str, admin: bool) -> Uuid {
        let id = Uuid::new_v4();
        user_entity::ActiveModel {
            id: Set(id),
            email: Set(email.to_string()),
            admin: Set(admin),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await
        .unwrap();
        id
    }

    fn failure() -> AdminNotification {
        AdminNotification {
            title: "Crawl failed".to_string(),
            content: "https://example.com/m: HTTP 503".to_string(),
            kind: NotificationKind::CrawlFailure,
            reference_id: None,
            reference_type: None,
        }
    }

    #[tokio::test]
    async fn test_notifies_every_admin() {
        let db = setup_db().await;
        let a = create_user(&db, "a@example.com", true).await;
        let b = create_user(&db, "b@example.com", true).await;
        create_user(&db, "reader@example.com", false).await;

        let delivered = DatabaseNotifier::new(db.clone())
            .notify_admins(&failure())
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        let rows = notification_entity::Entity::find().all(db.as_ref()).await.unwrap();
        let mut recipients: Vec<Uuid> = rows.iter().map(|n| n.user_id).collect();
        recipients.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(recipients, expected);
        assert!(rows.iter().all(|n| n.notification_type == "crawl_failure" && !n.read));
    }

    #[tokio::test]
    async fn test_no_admins_is_not_an_error() {
        let db = setup_db().await;
        create_user(&db, "reader@example.com", false).await;

        let delivered = DatabaseNotifier::new(db)
            .notify_admins(&failure())
            .await
            .unwrap();

        assert_eq!(delivered, 0);
    }
}
