//! The command handler: admission, generation, download, reply.
//!
//! A command moves through `Idle -> Admitted -> Generating -> Downloading ->
//! Replied`, or straight from `Idle` to `Rejected`. Every error is turned into
//! a chat reply at this boundary; nothing propagates to the host.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::command::{ChatCommand, Delivery, Reply};
use crate::config::Settings;
use crate::context::ServiceContext;
use crate::error::{BotError, Rejection};
use crate::guard::{Admission, AdmissionGuard};
use crate::http::HttpSession;
use crate::ports::{GenerationRequest, ImageFetcher, ImageGenerator};
use crate::store::ImageStore;
use crate::sweeper::RetentionSweeper;

/// Where a command currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Passed the guard.
    Admitted,
    /// Waiting on the provider.
    Generating,
    /// Fetching and saving the result.
    Downloading,
    /// Reply produced.
    Replied,
}

/// One loaded instance of the add-on.
pub struct SeedreamPlugin {
    settings: Settings,
    generator: Arc<dyn ImageGenerator>,
    fetcher: Arc<dyn ImageFetcher>,
    session: Option<Arc<HttpSession>>,
    guard: AdmissionGuard,
    store: ImageStore,
    sweeper: Arc<RetentionSweeper>,
    background: Mutex<JoinSet<()>>,
}

impl SeedreamPlugin {
    /// Assemble the plugin from resolved settings and a service context.
    #[must_use]
    pub fn new(settings: Settings, ctx: ServiceContext) -> Self {
        Self::with_guard(settings, ctx, AdmissionGuard::new())
    }

    /// Like [`new`](Self::new) with a custom admission guard.
    #[must_use]
    pub fn with_guard(settings: Settings, ctx: ServiceContext, guard: AdmissionGuard) -> Self {
        let image_dir = settings.image_dir();
        let sweeper = Arc::new(RetentionSweeper::new(image_dir.clone(), settings.retention));
        Self {
            generator: ctx.generator,
            fetcher: ctx.fetcher,
            session: ctx.session,
            guard,
            store: ImageStore::new(image_dir),
            sweeper,
            background: Mutex::new(JoinSet::new()),
            settings,
        }
    }

    /// The settings this instance runs with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether `user_id` has a job in flight.
    #[must_use]
    pub fn is_processing(&self, user_id: &str) -> bool {
        self.guard.is_processing(user_id)
    }

    /// Serve a command and produce the chat reply.
    pub async fn handle(&self, command: &ChatCommand) -> Reply {
        match self.execute(command).await {
            Ok(delivery) => Reply::Image(delivery),
            Err(BotError::Rejected(rejection)) => {
                Reply::Text(rejection.message(&self.settings.trigger))
            }
            Err(e) => Reply::Text(format!(
                "Image generation failed: {}",
                e.user_message(&self.settings.trigger)
            )),
        }
    }

    /// Serve a command, returning the typed outcome.
    ///
    /// # Errors
    ///
    /// [`BotError::Rejected`] when the command is not admitted, otherwise
    /// whatever generation or download failed with.
    pub async fn execute(&self, command: &ChatCommand) -> Result<Delivery, BotError> {
        let user = command.user_id.as_str();
        if command.is_empty() {
            return Err(BotError::Rejected(Rejection::EmptyInput));
        }

        let ticket = match self.guard.admit(user) {
            Admission::Allowed(ticket) => ticket,
            Admission::Cooldown { remaining } => {
                return Err(BotError::Rejected(Rejection::Cooldown { remaining }));
            }
            Admission::AlreadyProcessing => {
                return Err(BotError::Rejected(Rejection::AlreadyProcessing));
            }
        };
        debug!(user, stage = ?Stage::Admitted, "command admitted");

        let request = GenerationRequest::new(
            self.settings.model.as_str(),
            &command.prompt,
            self.settings.size.to_string(),
            command.images.clone(),
        );
        info!(
            user,
            prompt = %request.prompt,
            size = %request.size,
            references = request.reference_images.len(),
            "generating image"
        );

        let result = self.generate_and_store(user, &request).await;
        drop(ticket);

        match result {
            Ok(path) => {
                self.schedule_sweep();
                debug!(user, stage = ?Stage::Replied, "reply ready");
                Ok(Delivery {
                    reply_to: command.message_id.clone(),
                    path,
                    caption: format!("Prompt: {}", request.prompt),
                })
            }
            Err(e) => {
                if e.is_rate_limited() {
                    warn!(user, error = %e, "provider is throttling requests");
                } else {
                    error!(user, error = %e, "image command failed");
                }
                Err(e)
            }
        }
    }

    async fn generate_and_store(
        &self,
        user: &str,
        request: &GenerationRequest,
    ) -> Result<PathBuf, BotError> {
        debug!(user, stage = ?Stage::Generating, "calling provider");
        let generated = self.generator.generate(request).await?;

        debug!(user, stage = ?Stage::Downloading, url = %generated.url, "fetching result");
        let fetched = self.fetcher.fetch(&generated.url).await?;
        self.store.save(&fetched.data).await
    }

    /// Fire a retention sweep in the background; its outcome is only logged.
    fn schedule_sweep(&self) {
        let sweeper = Arc::clone(&self.sweeper);
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            let outcome = sweeper.sweep().await;
            debug!(?outcome, "background sweep");
        });
    }

    /// Release everything: background tasks, user state, HTTP session and,
    /// when configured, every generated image.
    pub async fn shutdown(&self) {
        let mut tasks = std::mem::take(
            &mut *self.background.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if !tasks.is_empty() {
            debug!(count = tasks.len(), "cancelling background tasks");
        }
        tasks.shutdown().await;

        self.guard.clear();

        if let Some(session) = &self.session {
            if session.close() {
                info!("HTTP session closed");
            }
        }

        if self.settings.purge_on_shutdown {
            let removed = self.store.purge_all().await;
            info!(removed, "generated images removed");
        } else {
            warn!(dir = %self.store.dir().display(), "keeping generated images on shutdown");
        }
    }
}
