//! Console front end
//!
//! Turns user commands into registry calls and reports every outcome as a
//! [`Notice`]. Owns the page/selection state of the single view.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, watch};

use crate::admin::types::{
    BalanceResponse, CredentialInput, CredentialsStatusResponse, ExportFormat,
};
use crate::export::save_export;
use crate::import::{ImportRecord, RecordOrigin, parse_import_source, prepare_batch};
use crate::registry::cache::{CacheEvent, QueryKey, QueryKind};
use crate::registry::mutation::MutationKind;
use crate::registry::selection::SelectionState;
use crate::registry::{CredentialRegistry, PageRequest, RegistryError};

/// User-visible outcome of one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Error(m) => m,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Success(m) => write!(f, "[ok] {}", m),
            Notice::Error(m) => write!(f, "[error] {}", m),
        }
    }
}

const VIEW_HELP: &str = "\
commands:
  n | next            next page
  p | prev            previous page
  g | page N          go to page N
  r | refresh         re-fetch the current page
  s | select ID...    toggle selection of IDs
  a | all             select every credential on the page, or clear
  c | clear           clear the selection
  d | delete          delete the selected credentials
  b | balance ID      query a credential's balance
  B | rebalance ID    query a credential's balance again, bypassing the cache
  q | quit";

/// Line command of the interactive view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    Next,
    Prev,
    Page(u32),
    Refresh,
    Select(Vec<u64>),
    ToggleAll,
    Clear,
    DeleteSelected,
    Balance(u64),
    RefreshBalance(u64),
    Help,
    Quit,
}

impl ViewCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?;
        let args: Vec<&str> = words.collect();

        match (command, args.as_slice()) {
            ("n" | "next", []) => Some(ViewCommand::Next),
            ("p" | "prev", []) => Some(ViewCommand::Prev),
            ("g" | "page", [page]) => page.parse().ok().map(ViewCommand::Page),
            ("r" | "refresh", []) => Some(ViewCommand::Refresh),
            ("s" | "select", ids) if !ids.is_empty() => ids
                .iter()
                .map(|id| id.parse().ok())
                .collect::<Option<Vec<u64>>>()
                .map(ViewCommand::Select),
            ("a" | "all", []) => Some(ViewCommand::ToggleAll),
            ("c" | "clear", []) => Some(ViewCommand::Clear),
            ("d" | "delete", []) => Some(ViewCommand::DeleteSelected),
            ("b" | "balance", [id]) => id.parse().ok().map(ViewCommand::Balance),
            ("B" | "rebalance", [id]) => id.parse().ok().map(ViewCommand::RefreshBalance),
            ("h" | "help" | "?", []) => Some(ViewCommand::Help),
            ("q" | "quit", []) => Some(ViewCommand::Quit),
            _ => None,
        }
    }
}

pub struct Console {
    registry: Arc<CredentialRegistry>,
    selection: SelectionState,
    view: watch::Sender<PageRequest>,
}

impl Console {
    pub fn new(registry: Arc<CredentialRegistry>, page: u32, page_size: u32) -> Self {
        let mut selection = SelectionState::new(page_size);
        selection.set_page(page);
        let (view, _) = watch::channel(PageRequest::new(selection.page(), selection.page_size()));
        Self {
            registry,
            selection,
            view,
        }
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    /// Page the view currently shows, for the auto-refresh task
    pub fn view(&self) -> watch::Receiver<PageRequest> {
        self.view.subscribe()
    }

    fn publish_view(&self) {
        self.view.send_replace(PageRequest::new(
            self.selection.page(),
            self.selection.page_size(),
        ));
    }

    // ============ Listing ============

    /// Current page, from cache when possible
    ///
    /// If the pool shrank under the current page, moves back to the last page
    /// and loads that instead.
    pub async fn load_page(&mut self) -> Result<Arc<CredentialsStatusResponse>, RegistryError> {
        let listing = self
            .registry
            .list_credentials(self.selection.page(), self.selection.page_size())
            .await?;
        self.settle(listing).await
    }

    /// Current page, always fetched
    pub async fn refresh(&mut self) -> Result<Arc<CredentialsStatusResponse>, RegistryError> {
        let listing = self
            .registry
            .refresh_credentials(self.selection.page(), self.selection.page_size())
            .await?;
        self.settle(listing).await
    }

    pub async fn go_to_page(
        &mut self,
        page: u32,
    ) -> Result<Arc<CredentialsStatusResponse>, RegistryError> {
        self.selection.set_page(page);
        self.publish_view();
        self.load_page().await
    }

    async fn settle(
        &mut self,
        listing: Arc<CredentialsStatusResponse>,
    ) -> Result<Arc<CredentialsStatusResponse>, RegistryError> {
        if !self.selection.sync_with(&listing) {
            return Ok(listing);
        }

        tracing::debug!("Page out of range, moving to page {}", self.selection.page());
        self.publish_view();
        let listing = self
            .registry
            .list_credentials(self.selection.page(), self.selection.page_size())
            .await?;
        self.selection.sync_with(&listing);
        Ok(listing)
    }

    /// Interactive view: render the current page whenever it changes and apply
    /// line commands from `input`, until `shutdown` or `quit`
    ///
    /// The page is refreshed every `every`; invalidations trigger an immediate
    /// re-fetch. Unchanged pages are not rendered twice.
    pub async fn watch<R, F>(
        &mut self,
        every: Duration,
        input: R,
        shutdown: F,
        mut render: impl FnMut(String),
    ) where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        let mut events = self.registry.subscribe();
        let refresher = self.registry.spawn_auto_refresh(self.view(), every);
        let mut lines = input.lines();
        let mut input_open = true;
        let mut last_frame: Option<String> = None;
        tokio::pin!(shutdown);

        // A fetch is rendered through its `Updated` event, a cache hit is not
        if self.cached_page().is_some() {
            self.render_page(&mut last_frame, &mut render);
        } else if let Err(e) = self.load_page().await {
            render(load_failure(&e).to_string());
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match ViewCommand::parse(&line) {
                        Some(ViewCommand::Quit) => break,
                        Some(command) => {
                            for notice in self.apply(command).await {
                                render(notice.to_string());
                            }
                            self.render_page(&mut last_frame, &mut render);
                        }
                        None => render(
                            Notice::Error(format!("Unknown command: {} (h for help)", line.trim()))
                                .to_string(),
                        ),
                    },
                    Ok(None) => input_open = false,
                    Err(e) => {
                        tracing::warn!("Failed to read input: {}", e);
                        input_open = false;
                    }
                },
                event = events.recv() => match event {
                    Ok(CacheEvent::Updated(QueryKey::Credentials { page, page_size }))
                        if page == self.selection.page() && page_size == self.selection.page_size() =>
                    {
                        if let Some(listing) = self.cached_page() {
                            if self.selection.sync_with(&listing) {
                                self.publish_view();
                                self.reload_quietly().await;
                            } else {
                                self.render_page(&mut last_frame, &mut render);
                            }
                        }
                    }
                    Ok(CacheEvent::Invalidated(QueryKind::Credentials)) => {
                        self.reload_quietly().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Watcher lagged by {} events, reloading", skipped);
                        self.reload_quietly().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        refresher.abort();
    }

    /// Run one interactive command
    pub async fn apply(&mut self, command: ViewCommand) -> Vec<Notice> {
        let moved = match command {
            ViewCommand::Next => {
                let total_pages = self.cached_page().map(|l| l.total_pages).unwrap_or(1);
                self.selection.next_page(total_pages);
                self.publish_view();
                self.load_page().await
            }
            ViewCommand::Prev => {
                self.selection.prev_page();
                self.publish_view();
                self.load_page().await
            }
            ViewCommand::Page(page) => self.go_to_page(page).await,
            ViewCommand::Refresh => self.refresh().await,
            ViewCommand::Select(ids) => {
                for id in ids {
                    let selected = self.selection.is_selected(id);
                    self.selection.set_selected(id, !selected);
                }
                return Vec::new();
            }
            ViewCommand::ToggleAll => {
                let visible = self.cached_page().map(|l| l.ids()).unwrap_or_default();
                self.selection.toggle_all(&visible);
                return Vec::new();
            }
            ViewCommand::Clear => {
                self.selection.clear();
                return Vec::new();
            }
            ViewCommand::DeleteSelected => return self.batch_delete_selected().await,
            ViewCommand::Balance(id) => return vec![self.balance(id).await],
            ViewCommand::RefreshBalance(id) => return vec![self.refresh_balance(id).await],
            ViewCommand::Help => return vec![Notice::Success(VIEW_HELP.to_string())],
            ViewCommand::Quit => return Vec::new(),
        };

        match moved {
            Ok(_) => Vec::new(),
            Err(e) => vec![load_failure(&e)],
        }
    }

    fn cached_page(&self) -> Option<Arc<CredentialsStatusResponse>> {
        self.registry
            .cache()
            .listing(self.selection.page(), self.selection.page_size())
    }

    fn render_page(&self, last_frame: &mut Option<String>, render: &mut impl FnMut(String)) {
        let Some(listing) = self.cached_page() else {
            return;
        };
        let frame = render_listing(&listing, &self.selection);
        if last_frame.as_deref() != Some(frame.as_str()) {
            *last_frame = Some(frame.clone());
            render(frame);
        }
    }

    async fn reload_quietly(&mut self) {
        if let Err(e) = self.load_page().await {
            tracing::warn!("Failed to reload credentials: {}", e);
        }
    }

    // ============ Single mutations ============

    pub async fn set_disabled(&mut self, id: u64, disabled: bool) -> Notice {
        let action = if disabled { "disabled" } else { "enabled" };
        match self.registry.set_disabled(id, disabled).await {
            Ok(_) => Notice::Success(format!("Credential #{} {}", id, action)),
            Err(e) => Notice::Error(format!("Failed to update credential #{}: {}", id, e)),
        }
    }

    pub async fn set_priority(&mut self, id: u64, priority: u32) -> Notice {
        match self.registry.set_priority(id, priority).await {
            Ok(_) => Notice::Success(format!("Credential #{} priority set to {}", id, priority)),
            Err(e) => Notice::Error(format!("Failed to set priority of #{}: {}", id, e)),
        }
    }

    pub async fn reset_failure_count(&mut self, id: u64) -> Notice {
        match self.registry.reset_failure_count(id).await {
            Ok(_) => Notice::Success(format!("Credential #{} failure count reset", id)),
            Err(e) => Notice::Error(format!("Failed to reset credential #{}: {}", id, e)),
        }
    }

    pub async fn add_credential(&mut self, input: &CredentialInput) -> Notice {
        if input.refresh_token.trim().is_empty() {
            return Notice::Error("Refresh token must not be empty".to_string());
        }
        match self.registry.add_credential(input).await {
            Ok(response) => {
                Notice::Success(format!("Credential #{} added", response.credential_id))
            }
            Err(e) => Notice::Error(format!("Failed to add credential: {}", e)),
        }
    }

    pub async fn delete_credential(&mut self, id: u64) -> Notice {
        match self.registry.delete_credential(id).await {
            Ok(_) => {
                self.membership_changed(MutationKind::DeleteCredential);
                Notice::Success(format!("Credential #{} deleted", id))
            }
            Err(e) => Notice::Error(format!("Failed to delete credential #{}: {}", id, e)),
        }
    }

    fn membership_changed(&mut self, kind: MutationKind) {
        if kind.changes_membership() {
            self.selection.clear();
        }
    }

    // ============ Batch operations ============

    /// Import a `.json` / `.csv` file
    ///
    /// Nothing is sent when the file yields no valid record or a record has an
    /// unusable priority.
    pub async fn import_file(&mut self, path: &Path) -> Vec<Notice> {
        let raw_text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                return vec![Notice::Error(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))];
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let records = parse_import_source(&file_name, &raw_text);
        self.import_records(records).await
    }

    pub async fn import_records(&mut self, records: Vec<ImportRecord>) -> Vec<Notice> {
        if let Some(notice) = self.refuse_if_pending(MutationKind::BatchImport) {
            return vec![notice];
        }
        let origins: Vec<RecordOrigin> = records.iter().map(|r| r.origin).collect();
        let batch = match prepare_batch(records) {
            Ok(batch) => batch,
            Err(e) => return vec![Notice::Error(e.to_string())],
        };

        let result = match self.registry.batch_import(&batch).await {
            Ok(result) => result,
            Err(e) => return vec![Notice::Error(format!("Import failed: {}", e))],
        };

        let mut notices = vec![Notice::Success(format!(
            "Imported {} credential(s)",
            result.imported
        ))];
        if result.failed > 0 {
            let mut message = format!("{} credential(s) failed to import", result.failed);
            for error in &result.errors {
                match origins.get(error.index) {
                    Some(origin) => message.push_str(&format!("\n  {}: {}", origin, error.message)),
                    None => message.push_str(&format!("\n  item {}: {}", error.index, error.message)),
                }
            }
            notices.push(Notice::Error(message));
        }
        notices
    }

    /// Delete the selected credentials
    ///
    /// The selection is kept when nothing is sent.
    pub async fn batch_delete_selected(&mut self) -> Vec<Notice> {
        if self.selection.is_empty() {
            return vec![Notice::Error("No credentials selected".to_string())];
        }
        if let Some(notice) = self.refuse_if_pending(MutationKind::BatchDelete) {
            return vec![notice];
        }
        let ids = self.selection.selected_ids();
        self.batch_delete(&ids).await
    }

    pub async fn batch_delete(&mut self, ids: &[u64]) -> Vec<Notice> {
        let result = match self.registry.batch_delete(ids).await {
            Ok(result) => result,
            Err(e) => return vec![Notice::Error(format!("Batch delete failed: {}", e))],
        };
        self.membership_changed(MutationKind::BatchDelete);

        let mut notices = vec![Notice::Success(format!(
            "Deleted {} credential(s)",
            result.deleted
        ))];
        if result.failed > 0 {
            let mut message = format!("{} credential(s) failed to delete", result.failed);
            for error in &result.errors {
                message.push_str(&format!("\n  #{}: {}", error.id, error.message));
            }
            notices.push(Notice::Error(message));
        }
        notices
    }

    fn refuse_if_pending(&self, kind: MutationKind) -> Option<Notice> {
        self.registry
            .is_pending(kind)
            .then(|| Notice::Error(format!("A {} is already in progress, try again later", kind)))
    }

    // ============ Export / balance ============

    pub async fn export(&mut self, format: ExportFormat, dir: &Path) -> Notice {
        let payload = match self.registry.export_credentials(format).await {
            Ok(payload) => payload,
            Err(e) => return Notice::Error(format!("Export failed: {}", e)),
        };
        match save_export(dir, format, &payload).await {
            Ok(path) => Notice::Success(format!("Exported to {}", path.display())),
            Err(e) => Notice::Error(format!("Export failed: {:#}", e)),
        }
    }

    pub async fn balance(&self, id: u64) -> Notice {
        match self.registry.get_balance(id).await {
            Ok(balance) => Notice::Success(render_balance(&balance)),
            Err(e) => Notice::Error(format!("Failed to query balance of #{}: {}", id, e)),
        }
    }

    /// Drop the cached balance and query it again
    pub async fn refresh_balance(&self, id: u64) -> Notice {
        match self.registry.refresh_balance(id).await {
            Ok(balance) => Notice::Success(render_balance(&balance)),
            Err(e) => Notice::Error(format!("Failed to query balance of #{}: {}", id, e)),
        }
    }
}

/// Notice for a listing that could not be loaded
pub fn load_failure(e: &RegistryError) -> Notice {
    match e {
        RegistryError::Api(api) if api.is_authentication() => Notice::Error(format!(
            "Failed to load credentials: {} (check adminApiKey)",
            e
        )),
        _ => Notice::Error(format!("Failed to load credentials: {}", e)),
    }
}

// ============ Rendering ============

pub fn render_listing(listing: &CredentialsStatusResponse, selection: &SelectionState) -> String {
    let mut out = format!(
        "Credentials: {} total, {} available, current: {}    page {}/{}\n",
        listing.total,
        listing.available,
        listing
            .current()
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "none".to_string()),
        selection.page(),
        listing.total_pages.max(1),
    );

    if listing.credentials.is_empty() {
        out.push_str("  (no credentials)\n");
        return out;
    }

    out.push_str("      ID  PRIO  STATUS    FAILS  AUTH    EXPIRES\n");
    for c in &listing.credentials {
        let marker = match (c.is_current, selection.is_selected(c.id)) {
            (true, true) => "*x",
            (true, false) => "* ",
            (false, true) => " x",
            (false, false) => "  ",
        };
        let status = if c.disabled { "disabled" } else { "enabled" };
        let auth = c.auth_method.as_deref().unwrap_or("-");
        let expires = c
            .expires_at
            .as_deref()
            .map(format_expiry)
            .unwrap_or_else(|| "-".to_string());
        let arn = if c.has_profile_arn { "  arn" } else { "" };
        out.push_str(&format!(
            "{} {:>5}  {:>4}  {:<8}  {:>5}  {:<6}  {}{}\n",
            marker, c.id, c.priority, status, c.failure_count, auth, expires, arn
        ));
    }
    out
}

fn format_expiry(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn render_balance(balance: &BalanceResponse) -> String {
    let mut out = format!(
        "Credential #{} ({})\n  usage: {:.2} / {:.2} ({:.1}%)\n  remaining: {:.2}",
        balance.id,
        balance.subscription_title.as_deref().unwrap_or("unknown plan"),
        balance.current_usage,
        balance.usage_limit,
        balance.usage_percentage,
        balance.remaining,
    );
    if let Some(reset) = balance
        .next_reset_at
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0))
    {
        out.push_str(&format!(
            "\n  next reset: {}",
            reset.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    out
}
