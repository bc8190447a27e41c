use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use std::process::ExitCode;
use std::sync::Arc;

use pocketnotes::access_gate::{open_secret_store, SecretStore};
use pocketnotes::{
    AccessGate, Config, Database, EditTarget, Note, NoteEditor, NoteId, NotesCache,
    PromptMode, SaveOutcome, Visibility,
};

#[derive(Parser)]
#[command(name = "pocketnotes", about = "Personal notes with a password-gated private tab", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes, newest first.
    List {
        /// Show the private tab instead of the public one.
        #[arg(long)]
        private: bool,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
        /// Only notes whose title or content contains this text.
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print one note.
    Show {
        id: NoteId,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Create a note. Empty notes are discarded.
    New {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        private: bool,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
    },
    /// Change a note's title or content.
    Edit {
        id: NoteId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
    },
    /// Move a note between the public and private tabs.
    Privacy {
        id: NoteId,
        #[command(flatten)]
        target: PrivacyTarget,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
    },
    /// Delete a note.
    Delete {
        id: NoteId,
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
    },
    /// Manage the private tab password.
    #[command(subcommand)]
    Password(PasswordCommand),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PrivacyTarget {
    #[arg(long)]
    private: bool,
    #[arg(long)]
    public: bool,
}

impl PrivacyTarget {
    fn is_private(&self) -> bool {
        self.private && !self.public
    }
}

#[derive(Subcommand)]
enum PasswordCommand {
    /// Whether a password has been created.
    Status,
    /// Create the password.
    Set { new: String },
    /// Check a password.
    Verify { password: String },
    /// Replace the password.
    Reset { current: String, new: String },
}

type Gate = AccessGate<Box<dyn SecretStore>>;

struct App {
    cache: NotesCache,
    gate: Gate,
}

impl App {
    fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_url)
            .with_context(|| format!("Failed to open note database at {}", config.database_url))?;
        let cache = NotesCache::load(Arc::new(db))?;
        let gate = AccessGate::new(open_secret_store(config)?);
        Ok(Self { cache, gate })
    }

    /// Pass the gate, or explain how to.
    fn unlock(&self, password: Option<&str>) -> Result<()> {
        if self.gate.prompt_mode()? == PromptMode::Create {
            bail!("No password has been created yet; run `pocketnotes password set <NEW>` first");
        }
        let Some(password) = password else {
            bail!("Private notes are locked; pass --password");
        };
        self.gate.verify(password)?;
        Ok(())
    }

    /// Fetch a note, unlocking first when it is private.
    fn note_for(&self, id: NoteId, password: Option<&str>) -> Result<Note> {
        let Some(note) = self.cache.get(id) else {
            bail!("Note {} not found", id);
        };
        if note.is_private {
            self.unlock(password)?;
        }
        Ok(note)
    }

    fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::List {
                private,
                password,
                search,
                json,
            } => {
                let visibility = Visibility::from_private_flag(private);
                if private {
                    self.unlock(password.as_deref())?;
                }
                let notes = match search {
                    Some(query) => self.cache.search(&query, Some(visibility)),
                    None => self.cache.notes_in(visibility),
                };
                if json {
                    println!("{}", serde_json::to_string_pretty(&notes)?);
                } else if notes.is_empty() {
                    println!("No {} notes", visibility.as_str());
                } else {
                    for note in &notes {
                        println!("{:>5}  {:<13}{}", note.id, note.display_date(), note.display_title());
                    }
                }
            }
            Commands::Show { id, password, json } => {
                let note = self.note_for(id, password.as_deref())?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&note)?);
                } else {
                    println!("{}\n{}\n\n{}", note.display_title(), note.display_date(), note.content);
                }
            }
            Commands::New {
                title,
                content,
                private,
                password,
            } => {
                let visibility = Visibility::from_private_flag(private);
                if private {
                    self.unlock(password.as_deref())?;
                }
                let editor = NoteEditor::open(&self.cache, EditTarget::New, visibility)?;
                editor.set_title(title.unwrap_or_default());
                editor.set_content(content.unwrap_or_default());
                report(editor.save()?);
            }
            Commands::Edit {
                id,
                title,
                content,
                password,
            } => {
                let note = self.note_for(id, password.as_deref())?;
                let editor = NoteEditor::open(&self.cache, EditTarget::Existing(id), note.visibility())?;
                if let Some(title) = title {
                    editor.set_title(title);
                }
                if let Some(content) = content {
                    editor.set_content(content);
                }
                report(editor.save()?);
            }
            Commands::Privacy {
                id,
                target,
                password,
            } => {
                // Either direction touches the private tab
                self.unlock(password.as_deref())?;
                let note = self.cache.set_private(id, target.is_private())?;
                println!("Note {} is now {}", note.id, note.visibility().as_str());
            }
            Commands::Delete { id, password } => {
                if self.cache.get(id).is_some_and(|n| n.is_private) {
                    self.unlock(password.as_deref())?;
                }
                self.cache.delete(id)?;
                println!("Deleted note {}", id);
            }
            Commands::Password(command) => self.run_password(command)?,
        }
        Ok(())
    }

    fn run_password(&self, command: PasswordCommand) -> Result<()> {
        match command {
            PasswordCommand::Status => match self.gate.prompt_mode()? {
                PromptMode::Create => println!("No password set"),
                PromptMode::Enter => println!("Password set"),
            },
            PasswordCommand::Set { new } => {
                self.gate.set_or_reset(None, &new)?;
                println!("Password created");
            }
            PasswordCommand::Verify { password } => {
                self.gate.verify(&password)?;
                println!("Password accepted");
            }
            PasswordCommand::Reset { current, new } => {
                self.gate.set_or_reset(Some(&current), &new)?;
                println!("Password changed");
            }
        }
        Ok(())
    }
}

fn report(outcome: SaveOutcome) {
    match outcome {
        SaveOutcome::Discarded => println!("Empty note discarded"),
        SaveOutcome::AlreadySaving => println!("A save is already in progress"),
        SaveOutcome::Created(note) => println!("Created note {}", note.id),
        SaveOutcome::Updated(note) => println!("Updated note {}", note.id),
    }
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("pocketnotes v{}", env!("CARGO_PKG_VERSION"));

    let result = Config::from_env()
        .map_err(anyhow::Error::from)
        .and_then(|config| App::open(&config))
        .and_then(|app| app.run(cli.command));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
