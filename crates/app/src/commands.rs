//! Command execution.

use agent_host::{Background, CanvasFactory, LocalSurfaceHost, NotificationCanvas, SurfaceId};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use providers::TranslationClient;
use services::editor::{self, FormatOutcome};
use services::{transfer, HistoryStore, JsonFileStore, SettingsStore};
use shared::messages::{RuntimeRequest, RuntimeResponse};
use shared::outcome::FailureReason;
use shared::settings::{Credential, ExtensionSettings};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, ConfigCommands, EditorCommands, HistoryCommands};
use crate::history_view::HistoryView;
use crate::paths::AppPaths;
use crate::terminal_canvas::TerminalCanvas;

pub const API_KEY_ENV: &str = "QIANFAN_API_KEY";

/// Everything a command needs, wired over the on-disk stores.
struct Runtime {
    background: Arc<Background>,
    host: Arc<LocalSurfaceHost>,
    settings: Arc<SettingsStore>,
}

impl Runtime {
    fn open(paths: &AppPaths, color: bool) -> Self {
        let settings_area = Arc::new(JsonFileStore::new(paths.settings_file()));
        let settings = Arc::new(
            SettingsStore::new(settings_area).with_fallback_api_key(std::env::var(API_KEY_ENV).ok()),
        );
        let history = Arc::new(HistoryStore::new(Arc::new(JsonFileStore::new(paths.history_file()))));

        let factory: CanvasFactory =
            Arc::new(move |_: SurfaceId| Arc::new(TerminalCanvas::new(color)) as Arc<dyn NotificationCanvas>);
        let (host, mut page_requests) = LocalSurfaceHost::new(factory);
        let host = Arc::new(host);

        let background = Arc::new(Background::new(
            TranslationClient::with_default_transport(),
            settings.clone(),
            history,
            host.clone(),
        ));

        let router = background.clone();
        tokio::spawn(async move {
            while let Some((surface, request)) = page_requests.recv().await {
                router.handle_page_request(surface, request).await;
            }
        });

        Self {
            background,
            host,
            settings,
        }
    }

    async fn request(&self, request: RuntimeRequest) -> Result<RuntimeResponse> {
        match self.background.handle_request(request).await {
            RuntimeResponse::Status {
                success: false,
                error,
            } => bail!(error.unwrap_or_else(|| "request failed".to_string())),
            other => Ok(other),
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::resolve(cli.home)?;
    debug!(root = %paths.root().display(), "using data directory");
    let runtime = Runtime::open(&paths, !cli.no_color);

    match cli.command {
        Commands::Lookup { text, no_receiver } => lookup(&runtime, &text.join(" "), no_receiver).await,
        Commands::History { action } => history(&runtime, action, !cli.no_color).await,
        Commands::Editor { action } => edit(&runtime, action).await,
        Commands::Config { action } => config(&paths, &runtime, action).await,
        Commands::TestConnection { api_key, endpoint } => test_connection(&runtime, api_key, endpoint).await,
    }
}

async fn lookup(runtime: &Runtime, selection: &str, no_receiver: bool) -> Result<()> {
    let page = runtime.host.open_surface(!no_receiver).await;
    let report = runtime.background.on_context_action(page, selection).await;
    runtime.host.close_surface(page).await;

    let Some(report) = report else {
        bail!("nothing selected");
    };
    if !report.delivered {
        bail!("the result could not be shown");
    }
    if matches!(report.outcome.failure_reason(), Some(FailureReason::NoCredential)) {
        eprintln!("提示: 运行 `bainian config set --api-key <KEY>` 或设置 {}", API_KEY_ENV);
    }
    Ok(())
}

async fn current_history(runtime: &Runtime) -> Result<Vec<shared::history::HistoryEntry>> {
    match runtime.request(RuntimeRequest::GetHistory).await? {
        RuntimeResponse::History { history } => Ok(history),
        other => bail!("unexpected response: {:?}", other),
    }
}

async fn history(runtime: &Runtime, action: HistoryCommands, color: bool) -> Result<()> {
    match action {
        HistoryCommands::List { sort, advanced, json } => {
            let entries = current_history(runtime).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            let settings = runtime.settings.load().await?;
            let view = HistoryView {
                sort,
                advanced: advanced || settings.show_advanced_history,
                color,
            };
            print!("{}", view.render(&entries, Utc::now()));
        }
        HistoryCommands::Clear { yes } => {
            if !yes {
                bail!("this deletes every entry; pass --yes to confirm");
            }
            runtime.request(RuntimeRequest::ClearHistory).await?;
            println!("历史记录已清空");
        }
        HistoryCommands::Export { dir } => {
            let entries = current_history(runtime).await?;
            let path = transfer::write_export(&dir, &entries, Utc::now().date_naive()).await?;
            println!("已导出 {} 条记录到 {}", entries.len(), path.display());
        }
        HistoryCommands::Import { file } => {
            let report = transfer::import_file(runtime.background.history(), &file).await?;
            println!(
                "导入成功！新增 {} 条记录，{} 条重复记录被跳过。",
                report.imported_count, report.duplicate_count
            );
        }
    }
    Ok(())
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn edit(runtime: &Runtime, action: EditorCommands) -> Result<()> {
    match action {
        EditorCommands::Load => {
            let entries = current_history(runtime).await?;
            println!("{}", editor::render_history(&entries)?);
        }
        EditorCommands::Format { file, write } => match editor::format_json(&read_text(&file).await?)? {
            FormatOutcome::Empty => println!("编辑器为空，无需格式化"),
            FormatOutcome::Formatted(text) if write => {
                tokio::fs::write(&file, text)
                    .await
                    .with_context(|| format!("failed to write {}", file.display()))?;
                println!("已格式化 {}", file.display());
            }
            FormatOutcome::Formatted(text) => println!("{}", text),
        },
        EditorCommands::Search { query, file } => {
            let text = match file {
                Some(file) => read_text(&file).await?,
                None => editor::render_history(&current_history(runtime).await?)?,
            };
            let outcome = editor::search_json(&text, &query)?;
            println!("{}", outcome.text);
            if let Some(count) = outcome.matches {
                eprintln!("找到 {} 个匹配项", count);
            }
        }
        EditorCommands::Save { file } => {
            let history = editor::parse_history_array(&read_text(&file).await?)?;
            let count = history.len();
            runtime.request(RuntimeRequest::UpdateHistory { history }).await?;
            println!("已保存 {} 条记录", count);
        }
    }
    Ok(())
}

async fn config(paths: &AppPaths, runtime: &Runtime, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let settings = runtime.settings.load().await?;
            let key = settings
                .api_key
                .as_deref()
                .and_then(Credential::new)
                .map(|c| c.masked())
                .unwrap_or_else(|| "(未设置)".to_string());
            println!("data dir:              {}", paths.root().display());
            println!("apiKey:                {}", key);
            println!("apiEndpoint:           {}", settings.api_endpoint);
            println!("customPrompt:          {}", settings.custom_prompt);
            println!("showAdvancedHistory:   {}", settings.show_advanced_history);
        }
        ConfigCommands::Set {
            api_key,
            endpoint,
            prompt,
            advanced_history,
        } => {
            // Only stored values; the environment key is never persisted.
            let stored = SettingsStore::new(Arc::new(JsonFileStore::new(paths.settings_file())));
            let current = stored.load().await?;
            let updated = ExtensionSettings {
                api_key: api_key.or(current.api_key),
                api_endpoint: endpoint.unwrap_or(current.api_endpoint),
                custom_prompt: prompt.unwrap_or(current.custom_prompt),
                show_advanced_history: advanced_history.unwrap_or(current.show_advanced_history),
            };
            stored.save(&updated).await?;
            info!(path = %paths.settings_file().display(), "settings written");
            println!("设置已保存");
        }
    }
    Ok(())
}

async fn test_connection(runtime: &Runtime, api_key: Option<String>, endpoint: Option<String>) -> Result<()> {
    let settings = runtime.settings.load().await?;
    let request = RuntimeRequest::TestApiConnection {
        api_key: api_key.or(settings.api_key).unwrap_or_default(),
        api_endpoint: Some(endpoint.unwrap_or(settings.api_endpoint)),
    };
    let RuntimeResponse::Connection(report) = runtime.request(request).await? else {
        bail!("unexpected response to connection test");
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.ok {
        bail!(report.error.unwrap_or_else(|| "connection test failed".to_string()));
    }
    println!("API连接测试成功！");
    Ok(())
}
