use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::Result;
use crate::llm;
use crate::platform::github::GitHubPlatform;
use crate::queue::Dispatcher;
use crate::webhook::handler::{handle_webhook, health_check};
use crate::workflow::{Orchestrator, ReviewLimits};
use crate::workspace::WorkspaceManager;

pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Wire the GitHub client, completion model and workspace manager.
    pub fn new(config: AppConfig) -> Result<Self> {
        let platform = Arc::new(GitHubPlatform::new(&config.github)?);
        let model = llm::from_config(&config.llm)?;
        let workspace = Arc::new(WorkspaceManager::new(&config.workspace));

        let orchestrator = Orchestrator::new(
            platform,
            model,
            workspace,
            &config.workspace.base_branch,
            config.agent.max_iters,
        )
        .with_review_limits(ReviewLimits {
            max_diff_chars: config.reviewer.max_diff_chars,
            max_ci_chars: config.reviewer.max_ci_chars,
        });
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(orchestrator)));

        Ok(Self::with_dispatcher(config, dispatcher))
    }

    pub fn with_dispatcher(config: AppConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
