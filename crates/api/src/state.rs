use std::sync::Arc;

use testimony_domain::ports::references::{ExecutionFactLookup, WitnessLookup};
use testimony_domain::ports::testimony::TestimonyRepository;
use testimony_domain::references::ReferenceVerifier;
use testimony_domain::testimony::{InMemoryTestimonyRepository, ListConfig, TestimonyService};
use testimony_infra::config::AppConfig;
use testimony_infra::db::DbConfig;
use testimony_infra::references::HttpReferenceClient;
use testimony_infra::repositories::SurrealTestimonyRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub testimonies: TestimonyService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let repository: Arc<dyn TestimonyRepository> = match config.data_backend.as_str() {
            "surreal" => Arc::new(
                SurrealTestimonyRepository::connect(&DbConfig::from_app_config(&config)).await?,
            ),
            "memory" => Arc::new(InMemoryTestimonyRepository::new()),
            other => anyhow::bail!("unsupported data_backend '{other}'"),
        };
        let references = Arc::new(HttpReferenceClient::from_config(&config));
        Ok(Self::with_dependencies(
            config,
            repository,
            references.clone(),
            references,
        ))
    }

    pub fn with_dependencies(
        config: AppConfig,
        repository: Arc<dyn TestimonyRepository>,
        witnesses: Arc<dyn WitnessLookup>,
        execution_facts: Arc<dyn ExecutionFactLookup>,
    ) -> Self {
        let list_config = ListConfig {
            default_size: config.list_default_size,
            max_size: config.list_max_size,
        };
        let testimonies =
            TestimonyService::new(repository, ReferenceVerifier::new(witnesses, execution_facts))
                .with_list_config(list_config);
        Self {
            config,
            testimonies,
        }
    }
}
