//! Story registry
//!
//! Each story is a self-contained lesson with its own tables and routes.
//! The registry is built once at startup from an explicit list, set up
//! against the shared pool, and mounted so that every story's routes live
//! under `/<story name>` next to the shared user-experience routes.

pub mod accumulate;
pub mod hubbles_law;
pub mod minids;
pub mod planet_parade;
pub mod router;
pub mod seasons;
pub mod solar_eclipse_2024;
pub mod storybook;
pub mod tempo_lite;

use std::collections::HashSet;
use std::sync::Arc;

use axum::{async_trait, Router};
use cosmicds_common::db::Class;
use cosmicds_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::AppState;

#[async_trait]
pub trait Story: Send + Sync {
    /// Name used in the URL prefix and in every story-keyed table
    fn name(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// Story-specific routes, mounted under `/<name>`
    fn router(&self) -> Router<AppState>;

    /// Create the story's tables; runs once at startup
    async fn setup(&self, db: &SqlitePool) -> Result<()>;

    /// Runs inside the class-creation transaction when a class is created
    /// for this story
    async fn setup_class(&self, _conn: &mut SqliteConnection, _class: &Class) -> Result<()> {
        Ok(())
    }
}

pub struct StoryRegistry {
    stories: Vec<Arc<dyn Story>>,
}

#[derive(Default)]
pub struct StoryRegistryBuilder {
    stories: Vec<Arc<dyn Story>>,
}

impl StoryRegistryBuilder {
    pub fn register(mut self, story: impl Story + 'static) -> Self {
        self.stories.push(Arc::new(story));
        self
    }

    /// Fails when two stories share a name
    pub fn build(self) -> Result<StoryRegistry> {
        let mut seen = HashSet::new();
        for story in &self.stories {
            if !seen.insert(story.name()) {
                return Err(Error::Config(format!(
                    "Story \"{}\" is registered more than once",
                    story.name()
                )));
            }
        }
        Ok(StoryRegistry {
            stories: self.stories,
        })
    }
}

impl StoryRegistry {
    pub fn builder() -> StoryRegistryBuilder {
        StoryRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Story> {
        self.stories
            .iter()
            .find(|story| story.name() == name)
            .map(|story| story.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stories.iter().map(|story| story.name()).collect()
    }

    /// Register every story in the `stories` table and run its setup.
    /// The first failure aborts.
    pub async fn setup_all(&self, db: &SqlitePool) -> Result<()> {
        for story in &self.stories {
            crate::db::stories::register_story(db, story.name(), story.display_name()).await?;
            story.setup(db).await.map_err(|e| {
                Error::Internal(format!("Setup of story {} failed: {}", story.name(), e))
            })?;
            info!("Story {} ready", story.name());
        }
        Ok(())
    }

    /// Nest each story's routes under `/<name>`
    pub fn mount(&self, router: Router<AppState>) -> Router<AppState> {
        self.stories.iter().fold(router, |router, story| {
            let routes = router::story_router(story.name()).merge(story.router());
            router.nest(&format!("/{}", story.name()), routes)
        })
    }
}

/// Every story this server hosts
pub fn default_registry() -> Result<StoryRegistry> {
    StoryRegistry::builder()
        .register(hubbles_law::HubblesLaw)
        .register(tempo_lite::TempoLite)
        .register(planet_parade::PlanetParade)
        .register(seasons::Seasons)
        .register(solar_eclipse_2024::SolarEclipse2024)
        .register(minids::Minids)
        .register(storybook::Storybook)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Story for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn display_name(&self) -> &'static str {
            self.0
        }

        fn router(&self) -> Router<AppState> {
            Router::new()
        }

        async fn setup(&self, _db: &SqlitePool) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_story_names_rejected() {
        let result = StoryRegistry::builder()
            .register(Named("a"))
            .register(Named("b"))
            .register(Named("a"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_registry_lookup() {
        let registry = default_registry().unwrap();
        assert!(registry.get("hubbles_law").is_some());
        assert!(registry.get("tempo-lite").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names().len(), 7);
    }
}
