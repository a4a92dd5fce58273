use std::io;
use std::path::PathBuf;

use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::warn;

use taskboard::app::App;
use taskboard::cli::{self, Cli, Command};
use taskboard::config::{self, Config};
use taskboard::notification::Notifier;
use taskboard::storage::{FileStorage, MemoryStorage, Storage};
use taskboard::task_store::TaskStore;
use taskboard::{logging, ui};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let command = args.command.unwrap_or(Command::Board);
    let interactive = matches!(command, Command::Board);

    let (mut config, config_error) = match config::load_config(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    let data_dir = config.data_dir();

    // Before anything that logs. The board keeps stderr off its screen when it can.
    match &data_dir {
        Some(dir) if interactive => logging::init_file(dir),
        _ => logging::init_stderr(),
    }
    if let Some(err) = config_error {
        warn!(error = %err, "using default configuration");
    }

    let mut store = TaskStore::open(open_storage(data_dir), config.storage_key.clone());

    if interactive {
        run_board(&mut store, &config)
    } else {
        let confirm_delete = config.board.confirm_delete;
        let mut confirm = |question: &str| {
            if confirm_delete {
                cli::prompt_yes_no(question)
            } else {
                Ok(true)
            }
        };
        cli::execute(command, &mut store, &mut io::stdout().lock(), &mut confirm)
    }
}

fn open_storage(data_dir: Option<PathBuf>) -> Box<dyn Storage> {
    match data_dir {
        Some(dir) => Box::new(FileStorage::new(dir)),
        None => {
            warn!("no data directory available, tasks will not be saved");
            Box::new(MemoryStorage::new())
        }
    }
}

fn run_board(store: &mut TaskStore, config: &Config) -> anyhow::Result<()> {
    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let notifier = Notifier::new(config.notification_timeout());
    let mut app = App::new(store, notifier).with_confirm_delete(config.board.confirm_delete);
    let result = ui::run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.map_err(Into::into)
}
