#[cfg(test)]
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use serde::de::DeserializeOwned;
use serde::Serialize;
#[cfg(test)]
use tokio::sync::Mutex;
use tracing::debug;

use crate::entities::kv_entry;
use crate::error::AppError;
use crate::model::{DailyTask, Goal, Note};
use crate::settings::{ApiSettings, NotificationSettings, StoredApiSettings};

pub const GOALS_KEY: &str = "daily-goals";
pub const NOTES_KEY: &str = "daily-notes";
pub const TASKS_KEY: &str = "daily-tasks";
pub const API_SETTINGS_KEY: &str = "api-settings";
pub const LEGACY_API_SETTINGS_KEY: &str = "apiSettings";
pub const NOTIFICATION_SETTINGS_KEY: &str = "notification-settings";

/// String-keyed blob storage. Values are opaque JSON text.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: String) -> Result<(), AppError>;
    async fn remove(&self, key: &str) -> Result<(), AppError>;
}

pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let entry = kv_entry::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?;
        Ok(entry.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        let active = kv_entry::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(Utc::now()),
        };
        kv_entry::Entity::insert(active)
            .on_conflict(
                OnConflict::column(kv_entry::Column::Key)
                    .update_columns([kv_entry::Column::Value, kv_entry::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        kv_entry::Entity::delete_by_id(key.to_string())
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), AppError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Typed load/save contracts over a [`KeyValueStore`], one pair per entity.
#[derive(Clone)]
pub struct Storage {
    kv: Arc<dyn KeyValueStore>,
}

impl Storage {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    #[cfg(test)]
    pub fn kv(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw).map(Some).map_err(|err| {
            AppError::InvalidInput(format!("stored value under '{key}' is not valid: {err}"))
        })
    }

    async fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        debug!(key, bytes = raw.len(), "saving store entry");
        self.kv.set(key, raw).await
    }

    pub async fn load_goals(&self) -> Result<Vec<Goal>, AppError> {
        let mut goals: Vec<Goal> = self.load_json(GOALS_KEY).await?.unwrap_or_default();
        for goal in &mut goals {
            goal.refresh_roadmap();
        }
        Ok(goals)
    }

    pub async fn save_goals(&self, goals: &[Goal]) -> Result<(), AppError> {
        self.save_json(GOALS_KEY, goals).await
    }

    pub async fn load_notes(&self) -> Result<Vec<Note>, AppError> {
        Ok(self.load_json(NOTES_KEY).await?.unwrap_or_default())
    }

    pub async fn save_notes(&self, notes: &[Note]) -> Result<(), AppError> {
        self.save_json(NOTES_KEY, notes).await
    }

    pub async fn load_tasks(&self) -> Result<Vec<DailyTask>, AppError> {
        Ok(self.load_json(TASKS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_tasks(&self, tasks: &[DailyTask]) -> Result<(), AppError> {
        self.save_json(TASKS_KEY, tasks).await
    }

    pub async fn load_api_settings(&self) -> Result<Option<ApiSettings>, AppError> {
        for key in [API_SETTINGS_KEY, LEGACY_API_SETTINGS_KEY] {
            if let Some(stored) = self.load_json::<StoredApiSettings>(key).await? {
                return Ok(stored.reconcile());
            }
        }
        Ok(None)
    }

    /// Writes both the current and the legacy key.
    pub async fn save_api_settings(&self, settings: &ApiSettings) -> Result<(), AppError> {
        self.save_json(API_SETTINGS_KEY, settings).await?;
        self.save_json(LEGACY_API_SETTINGS_KEY, settings).await
    }

    pub async fn clear_api_settings(&self) -> Result<(), AppError> {
        self.kv.remove(API_SETTINGS_KEY).await?;
        self.kv.remove(LEGACY_API_SETTINGS_KEY).await
    }

    pub async fn load_notification_settings(&self) -> Result<NotificationSettings, AppError> {
        Ok(self
            .load_json(NOTIFICATION_SETTINGS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_notification_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<(), AppError> {
        self.save_json(NOTIFICATION_SETTINGS_KEY, settings).await
    }
}
